use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use super::{Event, Transport};

/// Publishes this service's events.
///
/// Publishing is fire-and-forget: a failed publish is logged and never
/// fails the operation that produced the event.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotifyHandler: Send + Sync {
    async fn publish_event(&self, event_type: &str, data: serde_json::Value);
}

pub struct BusNotifyHandler {
    transport: Arc<dyn Transport>,
    publisher: String,
    exchange: String,
}

impl BusNotifyHandler {
    pub fn new(
        transport: Arc<dyn Transport>,
        publisher: impl Into<String>,
        exchange: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            publisher: publisher.into(),
            exchange: exchange.into(),
        }
    }
}

#[async_trait]
impl NotifyHandler for BusNotifyHandler {
    async fn publish_event(&self, event_type: &str, data: serde_json::Value) {
        let event = match Event::new(self.publisher.clone(), event_type, &data) {
            Ok(event) => event,
            Err(e) => {
                error!("Could not build event {}: {}", event_type, e);
                return;
            }
        };

        debug!("Publishing event. type: {}", event_type);
        if let Err(e) = self.transport.publish(&self.exchange, event).await {
            error!("Could not publish event {}: {}", event_type, e);
        }
    }
}
