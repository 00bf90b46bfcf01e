use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{QueueError, Result};

use super::Address;
use super::RoutingMethod;

pub const EVENT_TYPE_QUEUECALL_CREATED: &str = "queuecall_created";
pub const EVENT_TYPE_QUEUECALL_WAITING: &str = "queuecall_waiting";
pub const EVENT_TYPE_QUEUECALL_CONNECTING: &str = "queuecall_connecting";
pub const EVENT_TYPE_QUEUECALL_KICKING: &str = "queuecall_kicking";
pub const EVENT_TYPE_QUEUECALL_SERVICED: &str = "queuecall_serviced";
pub const EVENT_TYPE_QUEUECALL_DONE: &str = "queuecall_done";
pub const EVENT_TYPE_QUEUECALL_ABANDONED: &str = "queuecall_abandoned";
pub const EVENT_TYPE_QUEUECALL_DELETED: &str = "queuecall_deleted";

/// What a queuecall stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    #[default]
    Call,
    #[serde(other)]
    Unknown,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Call => "call",
            ReferenceType::Unknown => "unknown",
        }
    }
}

/// Queuecall status.
///
/// ```text
/// initiating -> waiting -> connecting -> service -> done
///                  |           |
///                  +-----------+-> kicking -> abandoned
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuecallStatus {
    #[default]
    Initiating,
    Waiting,
    Connecting,
    Kicking,
    Service,
    Done,
    Abandoned,
}

impl QueuecallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueuecallStatus::Initiating => "initiating",
            QueuecallStatus::Waiting => "waiting",
            QueuecallStatus::Connecting => "connecting",
            QueuecallStatus::Kicking => "kicking",
            QueuecallStatus::Service => "service",
            QueuecallStatus::Done => "done",
            QueuecallStatus::Abandoned => "abandoned",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "initiating" => Ok(QueuecallStatus::Initiating),
            "waiting" => Ok(QueuecallStatus::Waiting),
            "connecting" => Ok(QueuecallStatus::Connecting),
            "kicking" => Ok(QueuecallStatus::Kicking),
            "service" => Ok(QueuecallStatus::Service),
            "done" => Ok(QueuecallStatus::Done),
            "abandoned" => Ok(QueuecallStatus::Abandoned),
            other => Err(QueueError::invalid_argument(format!(
                "unknown queuecall status: {}",
                other
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueuecallStatus::Done | QueuecallStatus::Abandoned)
    }

    /// Statuses a transition into `self` may start from.
    ///
    /// The store uses this as the guard of its conditional update, so an
    /// edge missing here can never be taken.
    pub fn allowed_from(&self) -> &'static [QueuecallStatus] {
        use QueuecallStatus::*;
        match self {
            Initiating => &[],
            Waiting => &[Initiating],
            Connecting => &[Waiting],
            Kicking => &[Initiating, Waiting, Connecting],
            Service => &[Connecting],
            Done => &[Service],
            Abandoned => &[Initiating, Waiting, Connecting, Kicking],
        }
    }
}

/// One call's journey through a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Queuecall {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub queue_id: Uuid,

    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
    pub reference_activeflow_id: Uuid,

    pub forward_action_id: Uuid,
    pub exit_action_id: Uuid,
    pub confbridge_id: Uuid,

    pub source: Address,
    pub routing_method: RoutingMethod,
    pub tag_ids: Vec<Uuid>,

    pub status: QueuecallStatus,
    pub service_agent_id: Uuid,

    /// Milliseconds. Zero or less disables the timeout.
    pub timeout_wait: i64,
    /// Milliseconds. Zero or less disables the timeout.
    pub timeout_service: i64,

    pub duration_waiting: i64,
    pub duration_service: i64,

    pub tm_create: DateTime<Utc>,
    pub tm_service: DateTime<Utc>,
    pub tm_update: DateTime<Utc>,
    pub tm_end: DateTime<Utc>,
    pub tm_delete: DateTime<Utc>,
}

impl Queuecall {
    pub fn is_deleted(&self) -> bool {
        !crate::util::is_default_timestamp(&self.tm_delete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reachable_edges() {
        use QueuecallStatus::*;
        assert!(Waiting.allowed_from().contains(&Initiating));
        assert!(Connecting.allowed_from().contains(&Waiting));
        assert!(Service.allowed_from().contains(&Connecting));
        assert!(Done.allowed_from().contains(&Service));
        assert!(Abandoned.allowed_from().contains(&Waiting));

        assert!(!Service.allowed_from().contains(&Waiting));
        assert!(!Done.allowed_from().contains(&Waiting));
        assert!(!Abandoned.allowed_from().contains(&Service));
        assert!(!Abandoned.allowed_from().contains(&Done));
        assert!(!Done.allowed_from().contains(&Abandoned));
    }

    #[test]
    fn test_unknown_reference_type_deserializes() {
        let t: ReferenceType = serde_json::from_str("\"sms\"").unwrap();
        assert_eq!(t, ReferenceType::Unknown);
        let t: ReferenceType = serde_json::from_str("\"call\"").unwrap();
        assert_eq!(t, ReferenceType::Call);
    }
}
