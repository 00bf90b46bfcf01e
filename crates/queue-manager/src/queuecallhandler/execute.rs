//! Hands a waiting queuecall to an agent.

use tracing::{error, info};
use uuid::Uuid;

use super::QueuecallHandlerImpl;
use crate::error::{QueueError, Result, ResultExt};
use crate::models::{Action, Address, AddressType, FlowType, Queuecall, QueuecallStatus};

impl QueuecallHandlerImpl {
    /// Both legs end up in the queuecall's confbridge: the agent through a
    /// one-action flow on the new call, the caller through the forward.
    ///
    /// The queuecall is claimed before anything is dialed. A dial that
    /// fails after the claim sends the caller out of the queue.
    pub(super) async fn dial_agent(&self, id: Uuid, agent_id: Uuid) -> Result<Queuecall> {
        let qc = self.db.queuecall_get(id).await.context("execute queuecall")?;
        if qc.status != QueuecallStatus::Waiting {
            return Err(QueueError::invalid_state(format!(
                "queuecall {} is {}, not waiting",
                id,
                qc.status.as_str()
            )));
        }

        let res = match self.set_status_connecting(id, agent_id).await {
            Ok(res) => res,
            Err(e) => {
                error!(
                    "Could not claim the queuecall for the agent. queuecall_id: {}, agent_id: {}, err: {}",
                    id, agent_id, e
                );
                return Err(e);
            }
        };

        if let Err(e) = self.connect_agent(&qc, agent_id).await {
            error!(
                "Could not connect the agent, sending the caller out. queuecall_id: {}, agent_id: {}, err: {}",
                id, agent_id, e
            );
            if let Err(kick_err) = self.kick_force(id).await {
                error!("Could not kick the queuecall. queuecall_id: {}, err: {}", id, kick_err);
            }
            return Err(e);
        }

        Ok(res)
    }

    async fn connect_agent(&self, qc: &Queuecall, agent_id: Uuid) -> Result<()> {
        let flow = self
            .req
            .flow_v1_flow_create(
                qc.customer_id,
                FlowType::Queue,
                "queue agent dial".to_string(),
                format!("queuecall {}", qc.id),
                vec![Action::confbridge_join(qc.confbridge_id)],
                false,
            )
            .await
            .context("execute queuecall")?;

        let destination = Address::new(AddressType::Agent, agent_id.to_string());
        let calls = self
            .req
            .call_v1_call_create(qc.customer_id, flow.id, qc.source.clone(), vec![destination])
            .await
            .context("execute queuecall")?;

        self.req
            .flow_v1_activeflow_update_forward_action_id(
                qc.reference_activeflow_id,
                qc.forward_action_id,
                true,
            )
            .await
            .context("forward caller to the confbridge")?;

        info!(
            "Dialed agent for queuecall. queuecall_id: {}, agent_id: {}, calls: {}",
            qc.id,
            agent_id,
            calls.len()
        );
        Ok(())
    }
}
