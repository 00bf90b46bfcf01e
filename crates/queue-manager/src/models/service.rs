use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Queuecall,
}

/// What a service start hands back to the flow engine.
///
/// The flow engine pushes `push_actions` onto the caller's activeflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub push_actions: Vec<Action>,
}
