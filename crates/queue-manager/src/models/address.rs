use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    #[default]
    #[serde(rename = "")]
    None,
    Agent,
    Conference,
    Endpoint,
    Extension,
    Line,
    Sip,
    Tel,
}

/// A dialable party.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "type", default)]
    pub address_type: AddressType,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub target_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub detail: String,
}

impl Address {
    pub fn new(address_type: AddressType, target: impl Into<String>) -> Self {
        Self {
            address_type,
            target: target.into(),
            ..Default::default()
        }
    }
}
