//! Membership of queuecalls in a queue's wait and service sets.

use tracing::debug;
use uuid::Uuid;

use super::QueueHandlerImpl;
use crate::error::{Result, ResultExt};
use crate::models::queue::EVENT_TYPE_QUEUE_UPDATED;
use crate::models::{Execute, Queue};

impl QueueHandlerImpl {
    /// A queuecall joined the wait set; wake the loop when it is switched off.
    pub(super) async fn add_wait(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue> {
        self.db
            .queue_add_wait_queuecall_id(id, queuecall_id)
            .await
            .context("add wait queuecall id")?;
        debug!("Added wait queuecall. queue_id: {}, queuecall_id: {}", id, queuecall_id);

        let queue = self.db.queue_get(id).await?;
        if queue.execute == Execute::Run {
            self.publish(EVENT_TYPE_QUEUE_UPDATED, &queue).await;
            return Ok(queue);
        }

        self.update_queue_execute(id, Execute::Run).await
    }

    pub(super) async fn remove_wait(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue> {
        self.db
            .queue_remove_wait_queuecall_id(id, queuecall_id)
            .await
            .context("remove wait queuecall id")?;
        self.get_and_publish_updated(id).await
    }

    pub(super) async fn add_service(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue> {
        self.db
            .queue_add_service_queuecall_id(id, queuecall_id)
            .await
            .context("add service queuecall id")?;
        self.get_and_publish_updated(id).await
    }

    pub(super) async fn remove_service(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue> {
        self.db
            .queue_remove_service_queuecall_id(id, queuecall_id)
            .await
            .context("remove service queuecall id")?;
        self.get_and_publish_updated(id).await
    }

    pub(super) async fn remove_all(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue> {
        self.db
            .queue_remove_queuecall_id(id, queuecall_id)
            .await
            .context("remove queuecall id")?;
        self.get_and_publish_updated(id).await
    }

    pub(super) async fn add_abandoned(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue> {
        self.db
            .queue_add_abandoned_queuecall_id(id, queuecall_id)
            .await
            .context("add abandoned queuecall id")?;
        self.get_and_publish_updated(id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use mockall::predicate::eq;

    use super::*;
    use crate::bus::notifyhandler::MockNotifyHandler;
    use crate::bus::requesthandler::MockRequestHandler;
    use crate::config::ExecutionConfig;
    use crate::database::MockDatabase;
    use crate::error::QueueError;
    use crate::queuehandler::QueueHandler;
    use crate::testutil;

    fn handler(db: MockDatabase, req: MockRequestHandler, notify: MockNotifyHandler) -> QueueHandlerImpl {
        QueueHandlerImpl::new(Arc::new(db), Arc::new(req), Arc::new(notify), ExecutionConfig::default())
    }

    #[tokio::test]
    async fn test_add_wait_on_running_queue_does_not_restart_loop() {
        let id = Uuid::new_v4();
        let queuecall_id = Uuid::new_v4();

        let mut db = MockDatabase::new();
        let mut req = MockRequestHandler::new();
        let mut notify = MockNotifyHandler::new();
        db.expect_queue_add_wait_queuecall_id()
            .with(eq(id), eq(queuecall_id))
            .times(1)
            .returning(|_, _| Ok(()));
        db.expect_queue_get().times(1).returning(move |id| {
            let mut q = testutil::queue(id);
            q.wait_queuecall_ids = vec![queuecall_id];
            Ok(q)
        });
        db.expect_queue_set_execute().never();
        req.expect_queue_v1_queue_execute_run().never();
        notify.expect_publish_event().times(1).return_const(());

        let h = handler(db, req, notify);
        let res = h.add_wait_queuecall_id(id, queuecall_id).await.unwrap();
        assert_eq!(res.wait_queuecall_ids, vec![queuecall_id]);
    }

    #[tokio::test]
    async fn test_add_wait_on_stopped_queue_starts_loop() {
        let id = Uuid::new_v4();
        let queuecall_id = Uuid::new_v4();

        let mut db = MockDatabase::new();
        let mut req = MockRequestHandler::new();
        let mut notify = MockNotifyHandler::new();
        let mut seq = mockall::Sequence::new();
        db.expect_queue_add_wait_queuecall_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        db.expect_queue_get().times(2).in_sequence(&mut seq).returning(|id| {
            let mut q = testutil::queue(id);
            q.execute = Execute::Stop;
            Ok(q)
        });
        db.expect_queue_set_execute()
            .with(eq(id), eq(Execute::Run))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        db.expect_queue_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id| Ok(testutil::queue(id)));
        notify.expect_publish_event().times(1).return_const(());
        req.expect_queue_v1_queue_execute_run()
            .with(eq(id), eq(Duration::from_millis(100)))
            .times(1)
            .returning(|_, _| Ok(()));

        let h = handler(db, req, notify);
        let res = h.add_wait_queuecall_id(id, queuecall_id).await.unwrap();
        assert_eq!(res.execute, Execute::Run);
    }

    #[tokio::test]
    async fn test_add_abandoned_propagates_not_found() {
        let mut db = MockDatabase::new();
        db.expect_queue_add_abandoned_queuecall_id()
            .times(1)
            .returning(|id, _| Err(QueueError::not_found(format!("queue {}", id))));
        db.expect_queue_get().never();

        let h = handler(db, MockRequestHandler::new(), MockNotifyHandler::new());
        let res = h.add_abandoned_queuecall_id(Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(res, Err(QueueError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_queuecall_id_publishes_updated() {
        let id = Uuid::new_v4();
        let queuecall_id = Uuid::new_v4();

        let mut db = MockDatabase::new();
        let mut notify = MockNotifyHandler::new();
        db.expect_queue_remove_queuecall_id()
            .with(eq(id), eq(queuecall_id))
            .times(1)
            .returning(|_, _| Ok(()));
        db.expect_queue_get().times(1).returning(|id| Ok(testutil::queue(id)));
        notify
            .expect_publish_event()
            .withf(|t, _| t == EVENT_TYPE_QUEUE_UPDATED)
            .times(1)
            .return_const(());

        let h = handler(db, MockRequestHandler::new(), notify);
        h.remove_queuecall_id(id, queuecall_id).await.unwrap();
    }
}
