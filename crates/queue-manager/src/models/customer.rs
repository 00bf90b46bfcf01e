use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Customer record as carried by customer registry events.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub detail: String,
}
