//! # Status Transitions
//!
//! ```text
//!   initiating ──► waiting ──► connecting ──► service ──► done
//!        │            │            │
//!        └────────────┴─► kicking ─┴──────────────────► abandoned
//! ```
//!
//! Every transition is a guarded store update followed by an event and the
//! matching change to the owning queue's membership sets.

use std::time::Duration;

use tracing::{debug, error, info};
use uuid::Uuid;

use super::QueuecallHandlerImpl;
use crate::error::{Result, ResultExt};
use crate::models::queuecall::{
    EVENT_TYPE_QUEUECALL_ABANDONED, EVENT_TYPE_QUEUECALL_CONNECTING, EVENT_TYPE_QUEUECALL_DONE,
    EVENT_TYPE_QUEUECALL_KICKING, EVENT_TYPE_QUEUECALL_SERVICED, EVENT_TYPE_QUEUECALL_WAITING,
};
use crate::models::Queuecall;
use crate::util::duration_ms;

impl QueuecallHandlerImpl {
    pub(super) async fn set_status_waiting(&self, id: Uuid) -> Result<Queuecall> {
        self.db
            .queuecall_set_status_waiting(id)
            .await
            .context("update queuecall status waiting")?;
        let res = self.get_and_publish(id, EVENT_TYPE_QUEUECALL_WAITING).await?;
        info!("Queuecall is waiting. queuecall_id: {}, queue_id: {}", id, res.queue_id);

        // The loop reads waiting queuecalls from the store; the wait set only
        // has to catch up.
        let queue_handler = self.queue_handler.clone();
        let queue_id = res.queue_id;
        tokio::spawn(async move {
            if let Err(e) = queue_handler.add_wait_queuecall_id(queue_id, id).await {
                error!(
                    "Could not add the queuecall to the wait set. queue_id: {}, queuecall_id: {}, err: {}",
                    queue_id, id, e
                );
            }
        });

        Ok(res)
    }

    pub(super) async fn set_status_connecting(&self, id: Uuid, agent_id: Uuid) -> Result<Queuecall> {
        self.db
            .queuecall_set_status_connecting(id, agent_id)
            .await
            .context("update queuecall status connecting")?;
        let res = self.get_and_publish(id, EVENT_TYPE_QUEUECALL_CONNECTING).await?;

        if let Err(e) = self
            .queue_handler
            .remove_wait_queuecall_id(res.queue_id, id)
            .await
        {
            error!(
                "Could not remove the queuecall from the wait set. queue_id: {}, queuecall_id: {}, err: {}",
                res.queue_id, id, e
            );
        }

        Ok(res)
    }

    pub(super) async fn set_status_kicking(&self, id: Uuid) -> Result<Queuecall> {
        self.db
            .queuecall_set_status_kicking(id)
            .await
            .context("update queuecall status kicking")?;
        self.get_and_publish(id, EVENT_TYPE_QUEUECALL_KICKING).await
    }

    pub(super) async fn set_status_service(&self, qc: &Queuecall) -> Result<Queuecall> {
        let now = self.clock.now();
        let duration_waiting = duration_ms(&qc.tm_create, &now);

        self.db
            .queuecall_set_status_service(qc.id, duration_waiting, now)
            .await
            .context("update queuecall status service")?;
        let res = self.get_and_publish(qc.id, EVENT_TYPE_QUEUECALL_SERVICED).await?;
        info!(
            "Queuecall is in service. queuecall_id: {}, agent_id: {}, duration_waiting: {}",
            res.id, res.service_agent_id, duration_waiting
        );

        if let Err(e) = self
            .queue_handler
            .add_service_queuecall_id(res.queue_id, res.id)
            .await
        {
            error!(
                "Could not move the queuecall to the service set. queue_id: {}, queuecall_id: {}, err: {}",
                res.queue_id, res.id, e
            );
        }

        if res.timeout_service > 0 {
            let delay = Duration::from_millis(res.timeout_service as u64);
            if let Err(e) = self.req.queue_v1_queuecall_timeout_service(res.id, delay).await {
                error!("Could not schedule the service timeout. queuecall_id: {}, err: {}", res.id, e);
            }
        }

        Ok(res)
    }

    /// Waiting time is counted from creation.
    pub(super) async fn set_status_abandoned(&self, qc: &Queuecall) -> Result<Queuecall> {
        let now = self.clock.now();
        let duration_waiting = duration_ms(&qc.tm_create, &now);

        self.db
            .queuecall_set_status_abandoned(qc.id, duration_waiting, now)
            .await
            .context("update queuecall status abandoned")?;
        let res = self.get_and_publish(qc.id, EVENT_TYPE_QUEUECALL_ABANDONED).await?;
        info!("Queuecall abandoned. queuecall_id: {}, duration_waiting: {}", res.id, duration_waiting);

        if let Err(e) = self
            .queue_handler
            .add_abandoned_queuecall_id(res.queue_id, res.id)
            .await
        {
            error!(
                "Could not count the abandoned queuecall. queue_id: {}, queuecall_id: {}, err: {}",
                res.queue_id, res.id, e
            );
        }

        self.release(&res).await;
        Ok(res)
    }

    /// Service time is counted from entering service.
    pub(super) async fn set_status_done(&self, qc: &Queuecall) -> Result<Queuecall> {
        let now = self.clock.now();
        let duration_service = duration_ms(&qc.tm_service, &now);

        self.db
            .queuecall_set_status_done(qc.id, duration_service, now)
            .await
            .context("update queuecall status done")?;
        let res = self.get_and_publish(qc.id, EVENT_TYPE_QUEUECALL_DONE).await?;
        info!("Queuecall done. queuecall_id: {}, duration_service: {}", res.id, duration_service);

        if let Err(e) = self
            .queue_handler
            .remove_queuecall_id(res.queue_id, res.id)
            .await
        {
            error!(
                "Could not remove the queuecall from the queue. queue_id: {}, queuecall_id: {}, err: {}",
                res.queue_id, res.id, e
            );
        }

        self.release(&res).await;
        Ok(res)
    }

    /// Tear down what the queuecall held on other services.
    async fn release(&self, qc: &Queuecall) {
        if let Err(e) = self.req.call_v1_confbridge_delete(qc.confbridge_id).await {
            debug!(
                "Could not delete the confbridge. queuecall_id: {}, confbridge_id: {}, err: {}",
                qc.id, qc.confbridge_id, e
            );
        }
        self.delete_variables(qc).await;
    }
}
