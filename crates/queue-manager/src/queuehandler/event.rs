//! Customer deletion removes every queue the customer owns.

use tracing::{error, info};

use super::QueueHandlerImpl;
use crate::database::QueueFilter;
use crate::error::Result;
use crate::models::Customer;

const DELETE_PAGE_SIZE: u64 = 100;

impl QueueHandlerImpl {
    /// Delete every live queue of a removed customer. One failing queue
    /// does not stop the rest.
    pub(super) async fn handle_customer_deleted(&self, customer: Customer) -> Result<()> {
        info!("Deleting queues of the removed customer. customer_id: {}", customer.id);

        let filter = QueueFilter::new()
            .with_customer_id(customer.id)
            .with_deleted(false);

        let mut token = None;
        loop {
            let queues = self
                .db
                .queue_list(DELETE_PAGE_SIZE, token, filter.clone())
                .await?;
            let Some(last) = queues.last() else {
                break;
            };
            token = Some(last.tm_create);

            for queue in &queues {
                if let Err(e) = self.delete_queue(queue.id).await {
                    error!(
                        "Could not delete the queue. customer_id: {}, queue_id: {}, err: {}",
                        customer.id, queue.id, e
                    );
                }
            }

            if (queues.len() as u64) < DELETE_PAGE_SIZE {
                break;
            }
        }

        Ok(())
    }
}
