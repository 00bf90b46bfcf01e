use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfbridgeType {
    #[default]
    Connect,
    Conference,
}

/// Conference bridge owned by the telephony control plane.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Confbridge {
    pub id: Uuid,
    pub customer_id: Uuid,
    #[serde(rename = "type", default)]
    pub confbridge_type: ConfbridgeType,
    #[serde(default)]
    pub reference_type: String,
    #[serde(default)]
    pub reference_id: Uuid,
}
