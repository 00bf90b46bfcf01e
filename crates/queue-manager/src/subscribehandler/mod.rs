//! # Subscribe Handler
//!
//! Turns events from the call engine and the customer registry into
//! handler calls. Delivery is at-least-once and unordered; the handlers
//! tolerate duplicates, so failures here are logged and dropped.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use crate::bus::{Event, EventHandler};
use crate::error::Result;
use crate::models::{Call, Customer};
use crate::queuecallhandler::QueuecallHandler;
use crate::queuehandler::QueueHandler;

pub const PUBLISHER_CALL_MANAGER: &str = "call-manager";
pub const PUBLISHER_CUSTOMER_MANAGER: &str = "customer-manager";

pub const EVENT_TYPE_CALL_HANGUP: &str = "call_hangup";
pub const EVENT_TYPE_CONFBRIDGE_JOINED: &str = "confbridge_joined";
pub const EVENT_TYPE_CONFBRIDGE_LEAVED: &str = "confbridge_leaved";
pub const EVENT_TYPE_CUSTOMER_DELETED: &str = "customer_deleted";

/// Payload of confbridge join and leave events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfbridgeJoinedLeaved {
    /// Confbridge id
    pub id: Uuid,
    #[serde(default, alias = "leaved_call_id")]
    pub joined_call_id: Uuid,
}

pub struct SubscribeHandler {
    queue_handler: Arc<dyn QueueHandler>,
    queuecall_handler: Arc<dyn QueuecallHandler>,
}

impl SubscribeHandler {
    pub fn new(
        queue_handler: Arc<dyn QueueHandler>,
        queuecall_handler: Arc<dyn QueuecallHandler>,
    ) -> Self {
        Self {
            queue_handler,
            queuecall_handler,
        }
    }

    async fn dispatch(&self, event: &Event) -> Result<()> {
        match (event.publisher.as_str(), event.event_type.as_str()) {
            (PUBLISHER_CALL_MANAGER, EVENT_TYPE_CALL_HANGUP) => {
                let call: Call = event.parse_data()?;
                self.queuecall_handler.event_cm_call_hangup(call).await
            }
            (PUBLISHER_CALL_MANAGER, EVENT_TYPE_CONFBRIDGE_JOINED) => {
                let data: ConfbridgeJoinedLeaved = event.parse_data()?;
                self.queuecall_handler
                    .event_cm_confbridge_joined(data.joined_call_id, data.id)
                    .await
            }
            (PUBLISHER_CALL_MANAGER, EVENT_TYPE_CONFBRIDGE_LEAVED) => {
                let data: ConfbridgeJoinedLeaved = event.parse_data()?;
                self.queuecall_handler
                    .event_cm_confbridge_leaved(data.joined_call_id, data.id)
                    .await
            }
            (PUBLISHER_CUSTOMER_MANAGER, EVENT_TYPE_CUSTOMER_DELETED) => {
                let customer: Customer = event.parse_data()?;
                // queuecalls first so no queue is deleted under a live call
                if let Err(e) = self
                    .queuecall_handler
                    .event_cu_customer_deleted(customer.clone())
                    .await
                {
                    error!(
                        "Could not clean up queuecalls of the customer. customer_id: {}, err: {}",
                        customer.id, e
                    );
                }
                self.queue_handler.event_cu_customer_deleted(customer).await
            }
            _ => {
                debug!(
                    "Ignoring event. publisher: {}, type: {}",
                    event.publisher, event.event_type
                );
                Ok(())
            }
        }
    }
}

#[async_trait]
impl EventHandler for SubscribeHandler {
    async fn process_event(&self, event: Event) {
        debug!("Received event. publisher: {}, type: {}", event.publisher, event.event_type);

        if let Err(e) = self.dispatch(&event).await {
            error!(
                "Could not handle the event. publisher: {}, type: {}, err: {}",
                event.publisher, event.event_type, e
            );
        }
    }
}
