//! Periodic check that the caller's call and activeflow are still alive.
//!
//! Each check re-arms itself as a delayed request. After too many failed
//! checks in a row the queuecall is force kicked.

use tracing::{debug, error, info};
use uuid::Uuid;

use super::QueuecallHandlerImpl;
use crate::error::Result;
use crate::models::ReferenceType;

impl QueuecallHandlerImpl {
    /// Heartbeat for a queued call. Runs until the queuecall ends; after
    /// too many failed checks in a row the queuecall is removed.
    pub(super) async fn check_health(&self, id: Uuid, retry_count: u32) -> Result<()> {
        let qc = self.db.queuecall_get(id).await?;
        if qc.status.is_terminal() || qc.reference_type != ReferenceType::Call {
            debug!("Health check finished. queuecall_id: {}, status: {}", id, qc.status.as_str());
            return Ok(());
        }

        if retry_count > self.config.health_check_max_retry {
            info!(
                "Queuecall failed its health checks, kicking it out. queuecall_id: {}, retry_count: {}",
                id, retry_count
            );
            self.kick_force(id).await?;
            return Ok(());
        }

        let next_retry = match self.req.call_v1_call_get(qc.reference_id).await {
            Ok(call) if !call.is_ended() => 0,
            Ok(call) => {
                debug!(
                    "Referenced call has ended. queuecall_id: {}, call_id: {}, status: {:?}",
                    id, call.id, call.status
                );
                retry_count + 1
            }
            Err(e) => {
                debug!("Could not get the referenced call. queuecall_id: {}, err: {}", id, e);
                retry_count + 1
            }
        };

        if let Err(e) = self
            .req
            .queue_v1_queuecall_health_check(id, self.config.health_check_delay(), next_retry)
            .await
        {
            error!("Could not schedule the next health check. queuecall_id: {}, err: {}", id, e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockall::predicate::eq;

    use super::*;
    use crate::error::QueueError;
    use crate::models::{Call, CallStatus, QueuecallStatus};
    use crate::queuecallhandler::test_support::Mocks;
    use crate::queuecallhandler::QueuecallHandler;
    use crate::testutil;

    const DELAY: Duration = Duration::from_millis(5000);

    #[tokio::test]
    async fn test_healthy_call_resets_retry() {
        let qc = testutil::queuecall(Uuid::new_v4(), QueuecallStatus::Waiting);
        let (id, call_id) = (qc.id, qc.reference_id);

        let mut mocks = Mocks::new();
        mocks.db.expect_queuecall_get().returning(move |_| Ok(qc.clone()));
        mocks
            .req
            .expect_call_v1_call_get()
            .with(eq(call_id))
            .returning(|id| {
                Ok(Call {
                    id,
                    status: CallStatus::Progressing,
                    ..Default::default()
                })
            });
        mocks
            .req
            .expect_queue_v1_queuecall_health_check()
            .with(eq(id), eq(DELAY), eq(0))
            .times(1)
            .returning(|_, _, _| Ok(()));

        mocks.build().health_check(id, 2).await.unwrap();
    }

    #[tokio::test]
    async fn test_hungup_call_increments_retry() {
        let qc = testutil::queuecall(Uuid::new_v4(), QueuecallStatus::Waiting);
        let id = qc.id;

        let mut mocks = Mocks::new();
        mocks.db.expect_queuecall_get().returning(move |_| Ok(qc.clone()));
        mocks.req.expect_call_v1_call_get().returning(|id| {
            Ok(Call {
                id,
                status: CallStatus::Hangup,
                ..Default::default()
            })
        });
        mocks
            .req
            .expect_queue_v1_queuecall_health_check()
            .with(eq(id), eq(DELAY), eq(2))
            .times(1)
            .returning(|_, _, _| Ok(()));

        mocks.build().health_check(id, 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_call_lookup_failure_increments_retry() {
        let qc = testutil::queuecall(Uuid::new_v4(), QueuecallStatus::Connecting);
        let id = qc.id;

        let mut mocks = Mocks::new();
        mocks.db.expect_queuecall_get().returning(move |_| Ok(qc.clone()));
        mocks
            .req
            .expect_call_v1_call_get()
            .returning(|id| Err(QueueError::not_found(format!("call {}", id))));
        mocks
            .req
            .expect_queue_v1_queuecall_health_check()
            .with(eq(id), eq(DELAY), eq(1))
            .times(1)
            .returning(|_, _, _| Ok(()));

        mocks.build().health_check(id, 0).await.unwrap();
    }

    #[tokio::test]
    async fn test_exceeded_retry_force_kicks() {
        let qc = testutil::queuecall(Uuid::new_v4(), QueuecallStatus::Waiting);
        let id = qc.id;

        let mut mocks = Mocks::new();
        let res = qc.clone();
        mocks.db.expect_queuecall_get().returning(move |_| Ok(res.clone()));
        mocks.req.expect_call_v1_call_get().never();
        mocks.req.expect_queue_v1_queuecall_health_check().never();

        // kick_force
        mocks
            .db
            .expect_queuecall_set_status_kicking()
            .times(1)
            .returning(|_| Ok(()));
        mocks
            .req
            .expect_flow_v1_activeflow_update_forward_action_id()
            .with(eq(qc.reference_activeflow_id), eq(qc.exit_action_id), eq(true))
            .times(1)
            .returning(|_, _, _| Ok(()));
        mocks.clock.expect_now().return_const(chrono::Utc::now());
        mocks
            .db
            .expect_queuecall_set_status_abandoned()
            .times(1)
            .returning(|_, _, _| Ok(()));
        mocks.notify.expect_publish_event().times(2).return_const(());
        mocks
            .queue
            .expect_add_abandoned_queuecall_id()
            .times(1)
            .returning(|queue_id, _| Ok(testutil::queue(queue_id)));
        mocks
            .req
            .expect_call_v1_confbridge_delete()
            .returning(|_| Ok(()));
        mocks.allow_variable_deletes();

        mocks.build().health_check(id, 3).await.unwrap();
    }

    #[tokio::test]
    async fn test_ended_queuecall_stops_checking() {
        let mut mocks = Mocks::new();
        mocks
            .db
            .expect_queuecall_get()
            .returning(|id| Ok(testutil::queuecall(id, QueuecallStatus::Done)));
        mocks.req.expect_call_v1_call_get().never();
        mocks.req.expect_queue_v1_queuecall_health_check().never();

        mocks.build().health_check(Uuid::new_v4(), 0).await.unwrap();
    }
}
