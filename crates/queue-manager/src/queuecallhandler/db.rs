//! Queuecall records: creation with its timers and flow variables, deletion
//! of ended queuecalls, and the read-then-publish helper every transition
//! uses.

use std::time::Duration;

use tracing::{error, info};
use uuid::Uuid;

use super::QueuecallHandlerImpl;
use crate::error::{QueueError, Result, ResultExt};
use crate::models::queuecall::{EVENT_TYPE_QUEUECALL_CREATED, EVENT_TYPE_QUEUECALL_DELETED};
use crate::models::{Address, Queue, Queuecall, QueuecallStatus, ReferenceType};
use crate::util::default_timestamp;

/// Identifiers gathered before a queuecall row can be written.
#[derive(Debug, Clone)]
pub(super) struct NewQueuecall {
    pub id: Uuid,
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
    pub reference_activeflow_id: Uuid,
    pub forward_action_id: Uuid,
    pub exit_action_id: Uuid,
    pub confbridge_id: Uuid,
    pub source: Address,
}

impl QueuecallHandlerImpl {
    /// Write a new `initiating` queuecall from the queue's current settings
    /// and arm its timers.
    pub(super) async fn create(&self, queue: &Queue, new: NewQueuecall) -> Result<Queuecall> {
        let now = self.clock.now();
        let qc = Queuecall {
            id: new.id,
            customer_id: queue.customer_id,
            queue_id: queue.id,
            reference_type: new.reference_type,
            reference_id: new.reference_id,
            reference_activeflow_id: new.reference_activeflow_id,
            forward_action_id: new.forward_action_id,
            exit_action_id: new.exit_action_id,
            confbridge_id: new.confbridge_id,
            source: new.source,
            routing_method: queue.routing_method,
            tag_ids: queue.tag_ids.clone(),
            status: QueuecallStatus::Initiating,
            service_agent_id: Uuid::nil(),
            timeout_wait: queue.wait_timeout,
            timeout_service: queue.service_timeout,
            duration_waiting: 0,
            duration_service: 0,
            tm_create: now,
            tm_service: default_timestamp(),
            tm_update: now,
            tm_end: default_timestamp(),
            tm_delete: default_timestamp(),
        };

        self.db.queuecall_create(&qc).await.context("create queuecall")?;
        let res = self.db.queuecall_get(qc.id).await.context("create queuecall")?;
        info!(
            "Created queuecall. queuecall_id: {}, queue_id: {}, reference_id: {}",
            res.id, res.queue_id, res.reference_id
        );
        self.publish(EVENT_TYPE_QUEUECALL_CREATED, &res).await;

        self.set_variables(queue, &res).await;

        if res.timeout_wait > 0 {
            let delay = Duration::from_millis(res.timeout_wait as u64);
            if let Err(e) = self.req.queue_v1_queuecall_timeout_wait(res.id, delay).await {
                error!("Could not schedule the wait timeout. queuecall_id: {}, err: {}", res.id, e);
            }
        }

        if let Err(e) = self
            .req
            .queue_v1_queuecall_health_check(res.id, self.config.health_check_delay(), 0)
            .await
        {
            error!("Could not schedule the health check. queuecall_id: {}, err: {}", res.id, e);
        }

        Ok(res)
    }

    pub(super) async fn delete_queuecall(&self, id: Uuid) -> Result<Queuecall> {
        let qc = self.db.queuecall_get(id).await?;
        if !qc.status.is_terminal() {
            return Err(QueueError::invalid_state(format!(
                "queuecall {} is {}, only ended queuecalls can be deleted",
                id,
                qc.status.as_str()
            )));
        }

        self.db.queuecall_delete(id).await.context("delete queuecall")?;
        let res = self.db.queuecall_get(id).await?;
        info!("Deleted queuecall. queuecall_id: {}", id);

        self.publish(EVENT_TYPE_QUEUECALL_DELETED, &res).await;
        Ok(res)
    }

    pub(super) async fn get_and_publish(&self, id: Uuid, event_type: &str) -> Result<Queuecall> {
        let res = self.db.queuecall_get(id).await?;
        self.publish(event_type, &res).await;
        Ok(res)
    }

    pub(super) async fn publish(&self, event_type: &str, qc: &Queuecall) {
        match serde_json::to_value(qc) {
            Ok(data) => self.notify.publish_event(event_type, data).await,
            Err(e) => error!("Could not encode queuecall {} for {}: {}", qc.id, event_type, e),
        }
    }
}
