//! Wait and service timeouts, delivered as delayed self-requests.

use tracing::debug;
use uuid::Uuid;

use super::QueuecallHandlerImpl;
use crate::error::Result;
use crate::models::QueuecallStatus;

impl QueuecallHandlerImpl {
    pub(super) async fn handle_timeout_wait(&self, id: Uuid) -> Result<()> {
        self.kick_on_timeout(id, QueuecallStatus::Waiting).await
    }

    pub(super) async fn handle_timeout_service(&self, id: Uuid) -> Result<()> {
        self.kick_on_timeout(id, QueuecallStatus::Service).await
    }

    /// A timer that fires after the queuecall moved on does nothing.
    async fn kick_on_timeout(&self, id: Uuid, expected: QueuecallStatus) -> Result<()> {
        let qc = self.db.queuecall_get(id).await?;
        if qc.status != expected {
            debug!(
                "Timeout expired for a queuecall in another status. queuecall_id: {}, status: {}, expected: {}",
                id,
                qc.status.as_str(),
                expected.as_str()
            );
            return Ok(());
        }

        self.kick_queuecall(id).await?;
        Ok(())
    }
}
