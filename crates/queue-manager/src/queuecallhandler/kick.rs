//! # Kick
//!
//! Sending a caller out of the queue. `kick_queuecall` serves explicit
//! requests and fails when the flow engine cannot take the caller back.
//! `kick_force` serves teardown (failed health checks, customer deletion,
//! a failed agent dial) and ends the queuecall even when peers are gone.

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::QueuecallHandlerImpl;
use crate::error::{QueueError, Result, ResultExt};
use crate::models::{Queuecall, QueuecallStatus};

impl QueuecallHandlerImpl {
    /// Send the caller out of the queue through the exit action.
    ///
    /// A call in service only gets the forward; leaving the confbridge
    /// produces the event that moves it to `done`.
    pub(super) async fn kick_queuecall(&self, id: Uuid) -> Result<Queuecall> {
        let qc = self.db.queuecall_get(id).await.context("kick queuecall")?;
        if qc.status.is_terminal() {
            return Err(QueueError::invalid_state(format!(
                "queuecall {} has already ended ({})",
                id,
                qc.status.as_str()
            )));
        }

        self.req
            .flow_v1_activeflow_update_forward_action_id(
                qc.reference_activeflow_id,
                qc.exit_action_id,
                true,
            )
            .await
            .context("kick queuecall")?;
        info!("Kicked queuecall. queuecall_id: {}, status: {}", id, qc.status.as_str());

        if qc.status == QueuecallStatus::Service {
            return Ok(qc);
        }

        self.set_status_abandoned(&qc).await
    }

    /// Unlike [`Self::kick_queuecall`], an ended queuecall is returned as is.
    pub(super) async fn kick_reference(&self, reference_id: Uuid) -> Result<Queuecall> {
        let qc = self
            .db
            .queuecall_get_by_reference_id(reference_id)
            .await
            .context("kick queuecall by reference")?;
        if qc.status.is_terminal() {
            debug!(
                "Queuecall has already ended. queuecall_id: {}, reference_id: {}",
                qc.id, reference_id
            );
            return Ok(qc);
        }

        self.kick_queuecall(qc.id).await
    }

    /// Teardown that has to finish even when the flow engine or the call
    /// are gone. Failures before the final transition are only logged.
    pub(super) async fn kick_force(&self, id: Uuid) -> Result<Queuecall> {
        let qc = self.db.queuecall_get(id).await.context("force kick queuecall")?;
        if qc.status.is_terminal() {
            return Ok(qc);
        }

        if qc.status == QueuecallStatus::Service {
            self.forward_to_exit(&qc).await;
            return self.set_status_done(&qc).await;
        }

        if qc.status != QueuecallStatus::Kicking {
            if let Err(e) = self.set_status_kicking(id).await {
                warn!("Could not mark the queuecall as kicking. queuecall_id: {}, err: {}", id, e);
            }
        }
        self.forward_to_exit(&qc).await;

        self.set_status_abandoned(&qc).await
    }

    async fn forward_to_exit(&self, qc: &Queuecall) {
        let Err(e) = self
            .req
            .flow_v1_activeflow_update_forward_action_id(
                qc.reference_activeflow_id,
                qc.exit_action_id,
                true,
            )
            .await
        else {
            return;
        };
        warn!(
            "Could not forward the caller out of the queue. queuecall_id: {}, err: {}",
            qc.id, e
        );

        if let Err(e) = self
            .req
            .flow_v1_activeflow_service_stop(qc.reference_activeflow_id, qc.id)
            .await
        {
            error!(
                "Could not stop the queuecall service on the activeflow. queuecall_id: {}, err: {}",
                qc.id, e
            );
        }
    }
}
