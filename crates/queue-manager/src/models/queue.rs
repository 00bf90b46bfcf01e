use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{QueueError, Result};

pub const EVENT_TYPE_QUEUE_CREATED: &str = "queue_created";
pub const EVENT_TYPE_QUEUE_UPDATED: &str = "queue_updated";
pub const EVENT_TYPE_QUEUE_DELETED: &str = "queue_deleted";

/// Agent selection algorithm.
///
/// `None` only exists so rows written without a method can still be read;
/// create and update reject it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMethod {
    #[default]
    #[serde(rename = "")]
    None,
    Random,
}

impl RoutingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMethod::None => "",
            RoutingMethod::Random => "random",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "" => Ok(RoutingMethod::None),
            "random" => Ok(RoutingMethod::Random),
            other => Err(QueueError::invalid_argument(format!(
                "unknown routing method: {}",
                other
            ))),
        }
    }

    /// Fails with `InvalidArgument` unless the method can be used for dispatch.
    pub fn ensure_supported(&self) -> Result<()> {
        match self {
            RoutingMethod::Random => Ok(()),
            other => Err(QueueError::invalid_argument(format!(
                "unsupported routing method: {:?}",
                other
            ))),
        }
    }
}

/// Dispatch loop switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Execute {
    Run,
    #[default]
    Stop,
}

impl Execute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Execute::Run => "run",
            Execute::Stop => "stop",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "run" => Ok(Execute::Run),
            "stop" => Ok(Execute::Stop),
            other => Err(QueueError::invalid_argument(format!(
                "unknown execute value: {}",
                other
            ))),
        }
    }
}

/// A named routing pool of agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Queue {
    pub id: Uuid,
    pub customer_id: Uuid,

    pub name: String,
    pub detail: String,

    pub routing_method: RoutingMethod,
    pub tag_ids: Vec<Uuid>,

    pub execute: Execute,

    pub wait_flow_id: Uuid,
    /// Milliseconds. Zero or less disables the timeout.
    pub wait_timeout: i64,
    /// Milliseconds. Zero or less disables the timeout.
    pub service_timeout: i64,

    pub wait_queuecall_ids: Vec<Uuid>,
    pub service_queuecall_ids: Vec<Uuid>,

    pub total_incoming_count: i64,
    pub total_serviced_count: i64,
    pub total_abandoned_count: i64,

    pub tm_create: DateTime<Utc>,
    pub tm_update: DateTime<Utc>,
    pub tm_delete: DateTime<Utc>,
}

impl Queue {
    pub fn is_deleted(&self) -> bool {
        !crate::util::is_default_timestamp(&self.tm_delete)
    }
}
