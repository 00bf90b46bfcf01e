//! Queue records and their lifecycle: creation, updates, the execute
//! switch and soft delete.

use tracing::{debug, error, info};
use uuid::Uuid;

use super::QueueHandlerImpl;
use crate::error::{Result, ResultExt};
use crate::models::queue::{EVENT_TYPE_QUEUE_CREATED, EVENT_TYPE_QUEUE_DELETED, EVENT_TYPE_QUEUE_UPDATED};
use crate::models::{Execute, Queue, RoutingMethod};
use crate::util::default_timestamp;

impl QueueHandlerImpl {
    pub(super) async fn create_queue(
        &self,
        customer_id: Uuid,
        name: String,
        detail: String,
        routing_method: RoutingMethod,
        tag_ids: Vec<Uuid>,
        wait_flow_id: Uuid,
        wait_timeout: i64,
        service_timeout: i64,
    ) -> Result<Queue> {
        routing_method.ensure_supported()?;

        let id = Uuid::new_v4();
        let tm = chrono::Utc::now();
        let queue = Queue {
            id,
            customer_id,
            name,
            detail,
            routing_method,
            tag_ids,
            execute: Execute::Stop,
            wait_flow_id,
            wait_timeout,
            service_timeout,
            wait_queuecall_ids: Vec::new(),
            service_queuecall_ids: Vec::new(),
            total_incoming_count: 0,
            total_serviced_count: 0,
            total_abandoned_count: 0,
            tm_create: tm,
            tm_update: tm,
            tm_delete: default_timestamp(),
        };

        self.db.queue_create(&queue).await.context("create queue")?;
        let res = self.db.queue_get(id).await.context("create queue")?;
        info!("Created queue. queue_id: {}, customer_id: {}", res.id, res.customer_id);

        self.publish(EVENT_TYPE_QUEUE_CREATED, &res).await;
        Ok(res)
    }

    pub(super) async fn delete_queue(&self, id: Uuid) -> Result<Queue> {
        // The loop must not outlive the row.
        self.db
            .queue_set_execute(id, Execute::Stop)
            .await
            .context("delete queue")?;
        self.db.queue_delete(id).await.context("delete queue")?;

        let res = self.db.queue_get(id).await.context("delete queue")?;
        info!("Deleted queue. queue_id: {}", id);

        self.publish(EVENT_TYPE_QUEUE_DELETED, &res).await;
        Ok(res)
    }

    pub(super) async fn update_queue_basic_info(
        &self,
        id: Uuid,
        name: String,
        detail: String,
        routing_method: RoutingMethod,
        tag_ids: Vec<Uuid>,
        wait_flow_id: Uuid,
        wait_timeout: i64,
        service_timeout: i64,
    ) -> Result<Queue> {
        routing_method.ensure_supported()?;

        self.db
            .queue_set_basic_info(
                id,
                name,
                detail,
                routing_method,
                tag_ids,
                wait_flow_id,
                wait_timeout,
                service_timeout,
            )
            .await
            .context("update queue basic info")?;

        self.get_and_publish_updated(id).await
    }

    pub(super) async fn update_queue_tag_ids(&self, id: Uuid, tag_ids: Vec<Uuid>) -> Result<Queue> {
        self.db
            .queue_set_tag_ids(id, tag_ids)
            .await
            .context("update queue tag ids")?;

        self.get_and_publish_updated(id).await
    }

    pub(super) async fn update_queue_routing_method(
        &self,
        id: Uuid,
        routing_method: RoutingMethod,
    ) -> Result<Queue> {
        routing_method.ensure_supported()?;

        self.db
            .queue_set_routing_method(id, routing_method)
            .await
            .context("update queue routing method")?;

        self.get_and_publish_updated(id).await
    }

    pub(super) async fn update_queue_execute(&self, id: Uuid, execute: Execute) -> Result<Queue> {
        let queue = self.db.queue_get(id).await.context("update queue execute")?;
        if queue.execute == execute {
            debug!("Queue execute unchanged. queue_id: {}, execute: {}", id, execute.as_str());
            return Ok(queue);
        }

        let res = self.set_execute(id, execute).await?;

        if execute == Execute::Run {
            if let Err(e) = self
                .req
                .queue_v1_queue_execute_run(id, self.config.execute_start_delay())
                .await
            {
                error!("Could not start the queue execution. queue_id: {}, err: {}", id, e);
            }
        }

        Ok(res)
    }

    /// Write `execute` unconditionally and announce it.
    pub(super) async fn set_execute(&self, id: Uuid, execute: Execute) -> Result<Queue> {
        self.db
            .queue_set_execute(id, execute)
            .await
            .context("set queue execute")?;
        info!("Queue execute changed. queue_id: {}, execute: {}", id, execute.as_str());

        self.get_and_publish_updated(id).await
    }

    pub(super) async fn get_and_publish_updated(&self, id: Uuid) -> Result<Queue> {
        let res = self.db.queue_get(id).await?;
        self.publish(EVENT_TYPE_QUEUE_UPDATED, &res).await;
        Ok(res)
    }

    pub(super) async fn publish(&self, event_type: &str, queue: &Queue) {
        match serde_json::to_value(queue) {
            Ok(data) => self.notify.publish_event(event_type, data).await,
            Err(e) => error!("Could not encode queue {} for {}: {}", queue.id, event_type, e),
        }
    }
}
