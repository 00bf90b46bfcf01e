//! # Peer Events
//!
//! Reactions to other services' events. A queuecall is matched by its
//! reference (the caller's call) and the confbridge it owns:
//!
//! - `confbridge_joined` by the caller moves a connecting queuecall into service
//! - `confbridge_leaved` ends it: `done` from service, `abandoned` otherwise
//! - `call_hangup` ends it the same way
//! - `customer_deleted` force kicks every live queuecall of the customer
//!
//! Events for unknown references are dropped.

use tracing::{debug, error, info};
use uuid::Uuid;

use super::QueuecallHandlerImpl;
use crate::database::QueuecallFilter;
use crate::error::Result;
use crate::models::{Call, Customer, Queuecall, QueuecallStatus};

const KICK_PAGE_SIZE: u64 = 100;

impl QueuecallHandlerImpl {
    /// `None` when the reference has no queuecall.
    async fn queuecall_for_reference(&self, reference_id: Uuid) -> Result<Option<Queuecall>> {
        match self.db.queuecall_get_by_reference_id(reference_id).await {
            Ok(qc) => Ok(Some(qc)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub(super) async fn handle_call_hangup(&self, call: Call) -> Result<()> {
        let Some(qc) = self.queuecall_for_reference(call.id).await? else {
            return Ok(());
        };
        if qc.status.is_terminal() {
            debug!("Queuecall has already ended. queuecall_id: {}, call_id: {}", qc.id, call.id);
            return Ok(());
        }

        info!("Queued call hung up. queuecall_id: {}, status: {}", qc.id, qc.status.as_str());
        if qc.status == QueuecallStatus::Service {
            self.set_status_done(&qc).await?;
        } else {
            self.set_status_abandoned(&qc).await?;
        }
        Ok(())
    }

    /// Only the caller's own join into its queuecall's confbridge counts;
    /// the agent leg joins the same confbridge under another call id.
    pub(super) async fn handle_confbridge_joined(&self, reference_id: Uuid, confbridge_id: Uuid) -> Result<()> {
        let Some(qc) = self.queuecall_for_reference(reference_id).await? else {
            return Ok(());
        };
        if qc.confbridge_id != confbridge_id || qc.reference_id != reference_id {
            debug!(
                "Join into another confbridge. queuecall_id: {}, confbridge_id: {}",
                qc.id, confbridge_id
            );
            return Ok(());
        }
        if qc.status != QueuecallStatus::Connecting {
            debug!("Queuecall is not connecting. queuecall_id: {}, status: {}", qc.id, qc.status.as_str());
            return Ok(());
        }

        self.set_status_service(&qc).await?;
        Ok(())
    }

    pub(super) async fn handle_confbridge_leaved(&self, reference_id: Uuid, confbridge_id: Uuid) -> Result<()> {
        let Some(qc) = self.queuecall_for_reference(reference_id).await? else {
            return Ok(());
        };
        if qc.confbridge_id != confbridge_id || qc.status.is_terminal() {
            debug!(
                "Ignoring confbridge leave. queuecall_id: {}, confbridge_id: {}, status: {}",
                qc.id,
                confbridge_id,
                qc.status.as_str()
            );
            return Ok(());
        }

        match qc.status {
            QueuecallStatus::Service => {
                self.set_status_done(&qc).await?;
            }
            QueuecallStatus::Waiting | QueuecallStatus::Connecting | QueuecallStatus::Kicking => {
                self.set_status_abandoned(&qc).await?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Force every live queuecall of a removed customer out.
    pub(super) async fn handle_customer_deleted(&self, customer: Customer) -> Result<()> {
        let filter = QueuecallFilter::new()
            .with_customer_id(customer.id)
            .with_deleted(false);

        let mut token = None;
        loop {
            let queuecalls = self
                .db
                .queuecall_list(KICK_PAGE_SIZE, token, filter.clone())
                .await?;
            let Some(last) = queuecalls.last() else {
                break;
            };
            token = Some(last.tm_create);

            for qc in queuecalls.iter().filter(|qc| !qc.status.is_terminal()) {
                if let Err(e) = self.kick_force(qc.id).await {
                    error!(
                        "Could not kick the queuecall. customer_id: {}, queuecall_id: {}, err: {}",
                        customer.id, qc.id, e
                    );
                }
            }

            if (queuecalls.len() as u64) < KICK_PAGE_SIZE {
                break;
            }
        }
        Ok(())
    }
}
