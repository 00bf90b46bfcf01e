//! Flow variables describing the queue on the caller's activeflow. Set when
//! the queuecall is created, removed when it ends.

use std::collections::HashMap;

use tracing::{debug, error};

use super::QueuecallHandlerImpl;
use crate::models::{Queue, Queuecall};

pub(super) const VARIABLE_QUEUE_ID: &str = "voipbin.queue.id";
pub(super) const VARIABLE_QUEUE_NAME: &str = "voipbin.queue.name";
pub(super) const VARIABLE_QUEUE_DETAIL: &str = "voipbin.queue.detail";
pub(super) const VARIABLE_QUEUECALL_ID: &str = "voipbin.queuecall.id";
pub(super) const VARIABLE_QUEUECALL_TIMEOUT_WAIT: &str = "voipbin.queuecall.timeout_wait";
pub(super) const VARIABLE_QUEUECALL_TIMEOUT_SERVICE: &str = "voipbin.queuecall.timeout_service";

const VARIABLES: [&str; 6] = [
    VARIABLE_QUEUE_ID,
    VARIABLE_QUEUE_NAME,
    VARIABLE_QUEUE_DETAIL,
    VARIABLE_QUEUECALL_ID,
    VARIABLE_QUEUECALL_TIMEOUT_WAIT,
    VARIABLE_QUEUECALL_TIMEOUT_SERVICE,
];

impl QueuecallHandlerImpl {
    /// Expose the queue and queuecall to the caller's flow.
    pub(super) async fn set_variables(&self, queue: &Queue, qc: &Queuecall) {
        let variables = HashMap::from([
            (VARIABLE_QUEUE_ID.to_string(), queue.id.to_string()),
            (VARIABLE_QUEUE_NAME.to_string(), queue.name.clone()),
            (VARIABLE_QUEUE_DETAIL.to_string(), queue.detail.clone()),
            (VARIABLE_QUEUECALL_ID.to_string(), qc.id.to_string()),
            (VARIABLE_QUEUECALL_TIMEOUT_WAIT.to_string(), qc.timeout_wait.to_string()),
            (VARIABLE_QUEUECALL_TIMEOUT_SERVICE.to_string(), qc.timeout_service.to_string()),
        ]);

        if let Err(e) = self
            .req
            .flow_v1_variable_set_variable(qc.reference_activeflow_id, variables)
            .await
        {
            error!(
                "Could not set the flow variables. queuecall_id: {}, activeflow_id: {}, err: {}",
                qc.id, qc.reference_activeflow_id, e
            );
        }
    }

    pub(super) async fn delete_variables(&self, qc: &Queuecall) {
        for key in VARIABLES {
            if let Err(e) = self
                .req
                .flow_v1_variable_delete_variable(qc.reference_activeflow_id, key.to_string())
                .await
            {
                debug!(
                    "Could not delete the flow variable. queuecall_id: {}, key: {}, err: {}",
                    qc.id, key, e
                );
            }
        }
    }
}
