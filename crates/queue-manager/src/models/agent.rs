use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Address;

/// Agent status as reported by the agent registry.
///
/// `None` is only used as a query value and means "any status".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    #[serde(rename = "")]
    None,
    Available,
    Away,
    Busy,
    Offline,
    Ringing,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::None => "",
            AgentStatus::Available => "available",
            AgentStatus::Away => "away",
            AgentStatus::Busy => "busy",
            AgentStatus::Offline => "offline",
            AgentStatus::Ringing => "ringing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub customer_id: Uuid,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
    #[serde(default)]
    pub addresses: Vec<Address>,
}
