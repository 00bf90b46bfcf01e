//! Flow engine records the queue core builds or forwards to.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// No action. A forward to this id is ignored by the flow engine.
pub const ACTION_ID_EMPTY: Uuid = Uuid::nil();
/// Position before the first action of a flow.
pub const ACTION_ID_START: Uuid = Uuid::from_u128(1);
/// Position after the last action of a flow.
pub const ACTION_ID_FINISH: Uuid = Uuid::from_u128(2);
/// The action following the current stack; used to leave pushed actions.
pub const ACTION_ID_NEXT: Uuid = Uuid::from_u128(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Answer,
    ConfbridgeJoin,
    Empty,
    FetchFlow,
    Hangup,
    QueueJoin,
    Talk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    #[serde(default)]
    pub next_id: Uuid,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub option: serde_json::Value,
}

impl Action {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            id: Uuid::new_v4(),
            next_id: ACTION_ID_EMPTY,
            action_type,
            option: serde_json::Value::Null,
        }
    }

    /// Fetch and run another flow in place.
    pub fn fetch_flow(flow_id: Uuid) -> Self {
        let mut action = Self::new(ActionType::FetchFlow);
        action.option = serde_json::json!({ "flow_id": flow_id });
        action
    }

    /// Join the call into a conference bridge.
    pub fn confbridge_join(confbridge_id: Uuid) -> Self {
        let mut action = Self::new(ActionType::ConfbridgeJoin);
        action.option = serde_json::json!({ "confbridge_id": confbridge_id });
        action
    }

    /// Do nothing and continue with `next_id`.
    pub fn empty(next_id: Uuid) -> Self {
        let mut action = Self::new(ActionType::Empty);
        action.next_id = next_id;
        action
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    #[default]
    Flow,
    Queue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: Uuid,
    pub customer_id: Uuid,
    #[serde(rename = "type", default)]
    pub flow_type: FlowType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub persist: bool,
    #[serde(default)]
    pub actions: Vec<Action>,
}
