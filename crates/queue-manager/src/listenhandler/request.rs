//! Request bodies accepted by the listen routes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AgentStatus, Execute, ReferenceType, RoutingMethod};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct V1DataQueuesPost {
    pub customer_id: Uuid,
    pub name: String,
    pub detail: String,
    pub routing_method: RoutingMethod,
    pub tag_ids: Vec<Uuid>,
    pub wait_flow_id: Uuid,
    pub wait_timeout: i64,
    pub service_timeout: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct V1DataQueuesIDPut {
    pub name: String,
    pub detail: String,
    pub routing_method: RoutingMethod,
    pub tag_ids: Vec<Uuid>,
    pub wait_flow_id: Uuid,
    pub wait_timeout: i64,
    pub service_timeout: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct V1DataQueuesIDTagIDsPut {
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct V1DataQueuesIDRoutingMethodPut {
    pub routing_method: RoutingMethod,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct V1DataQueuesIDAgentsGet {
    pub status: AgentStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct V1DataQueuesIDExecutePut {
    pub execute: Execute,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct V1DataQueuecallsIDExecutePost {
    pub agent_id: Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct V1DataQueuecallsIDHealthCheckPost {
    pub retry_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct V1DataServicesTypeQueuecallPost {
    pub queue_id: Uuid,
    pub activeflow_id: Uuid,
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
}
