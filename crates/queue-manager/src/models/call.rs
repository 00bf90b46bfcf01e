use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    #[default]
    #[serde(rename = "")]
    None,
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    #[default]
    Dialing,
    Ringing,
    Progressing,
    Terminating,
    Canceling,
    Hangup,
}

/// Call record owned by the telephony control plane.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Call {
    pub id: Uuid,
    pub customer_id: Uuid,
    #[serde(default)]
    pub flow_id: Uuid,
    #[serde(default)]
    pub activeflow_id: Uuid,
    #[serde(default)]
    pub confbridge_id: Uuid,
    #[serde(default)]
    pub source: Address,
    #[serde(default)]
    pub destination: Address,
    #[serde(default)]
    pub status: CallStatus,
    #[serde(default)]
    pub direction: CallDirection,
}

impl Call {
    /// Whether the call is on its way out or already gone.
    pub fn is_ended(&self) -> bool {
        matches!(
            self.status,
            CallStatus::Hangup | CallStatus::Terminating | CallStatus::Canceling
        )
    }

    /// The customer-side party of the call.
    ///
    /// For an inbound call that is the caller; for an outbound call it is
    /// the callee.
    pub fn customer_address(&self) -> Address {
        match self.direction {
            CallDirection::Outgoing => self.destination.clone(),
            _ => self.source.clone(),
        }
    }
}
