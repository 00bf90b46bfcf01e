//! # Queue Handler
//!
//! Owns a queue's lifecycle and its dispatch loop.
//!
//! The loop ([`QueueHandler::execute`]) is not a task that lives in this
//! process. Each invocation does at most one dispatch and then schedules
//! the next invocation as a delayed request to this service, or stops
//! when the queue is switched off or has nobody waiting:
//!
//! ```text
//!   execute_run ──► load queue ──► oldest waiting ──► available agents ──► dial
//!        ▲              │ stop          │ none              │ none          │
//!        │              ▼               ▼                   │               │
//!        │            (end)       execute=stop, end         │               │
//!        └────────── retry delay ◄──────────────────────────┘  short delay ─┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use uuid::Uuid;

use crate::bus::{NotifyHandler, RequestHandler};
use crate::config::ExecutionConfig;
use crate::database::{Database, QueueFilter};
use crate::error::Result;
use crate::models::{Agent, AgentStatus, Customer, Execute, Queue, RoutingMethod};

mod db;
mod event;
mod execute;
mod queuecall_ids;

pub use execute::ExecuteOutcome;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueHandler: Send + Sync {
    /// Create a queue. Only the `random` routing method is accepted.
    async fn create(
        &self,
        customer_id: Uuid,
        name: String,
        detail: String,
        routing_method: RoutingMethod,
        tag_ids: Vec<Uuid>,
        wait_flow_id: Uuid,
        wait_timeout: i64,
        service_timeout: i64,
    ) -> Result<Queue>;
    async fn get(&self, id: Uuid) -> Result<Queue>;
    async fn list(
        &self,
        size: u64,
        token: Option<DateTime<Utc>>,
        filter: QueueFilter,
    ) -> Result<Vec<Queue>>;
    /// Stop the loop, then soft delete.
    async fn delete(&self, id: Uuid) -> Result<Queue>;

    async fn update_basic_info(
        &self,
        id: Uuid,
        name: String,
        detail: String,
        routing_method: RoutingMethod,
        tag_ids: Vec<Uuid>,
        wait_flow_id: Uuid,
        wait_timeout: i64,
        service_timeout: i64,
    ) -> Result<Queue>;
    async fn update_tag_ids(&self, id: Uuid, tag_ids: Vec<Uuid>) -> Result<Queue>;
    async fn update_routing_method(&self, id: Uuid, routing_method: RoutingMethod) -> Result<Queue>;
    /// Switch the loop. `stop -> run` starts it; setting the current value
    /// is a no-op.
    async fn update_execute(&self, id: Uuid, execute: Execute) -> Result<Queue>;

    /// One step of the dispatch loop.
    async fn execute(&self, id: Uuid) -> ExecuteOutcome;

    /// Agents matching the queue's customer and tags. `AgentStatus::None`
    /// returns agents in any status.
    async fn get_agents(&self, id: Uuid, status: AgentStatus) -> Result<Vec<Agent>>;

    async fn add_wait_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue>;
    async fn remove_wait_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue>;
    async fn add_service_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue>;
    async fn remove_service_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue>;
    /// Remove from both membership sets.
    async fn remove_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue>;
    /// Remove from both membership sets and count the call as abandoned.
    async fn add_abandoned_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue>;

    async fn event_cu_customer_deleted(&self, customer: Customer) -> Result<()>;
}

pub struct QueueHandlerImpl {
    db: Arc<dyn Database>,
    req: Arc<dyn RequestHandler>,
    notify: Arc<dyn NotifyHandler>,
    config: ExecutionConfig,
    /// Queues with an `execute` step in progress in this process
    executing: DashSet<Uuid>,
}

impl QueueHandlerImpl {
    pub fn new(
        db: Arc<dyn Database>,
        req: Arc<dyn RequestHandler>,
        notify: Arc<dyn NotifyHandler>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            db,
            req,
            notify,
            config,
            executing: DashSet::new(),
        }
    }
}

#[async_trait]
impl QueueHandler for QueueHandlerImpl {
    async fn create(
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
        self.create_queue(
            customer_id,
            name,
            detail,
            routing_method,
            tag_ids,
            wait_flow_id,
            wait_timeout,
            service_timeout,
        )
        .await
    }

    async fn get(&self, id: Uuid) -> Result<Queue> {
        self.db.queue_get(id).await
    }

    async fn list(
        &self,
        size: u64,
        token: Option<DateTime<Utc>>,
        filter: QueueFilter,
    ) -> Result<Vec<Queue>> {
        self.db.queue_list(size, token, filter).await
    }

    async fn delete(&self, id: Uuid) -> Result<Queue> {
        self.delete_queue(id).await
    }

    async fn update_basic_info(
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
        self.update_queue_basic_info(
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
    }

    async fn update_tag_ids(&self, id: Uuid, tag_ids: Vec<Uuid>) -> Result<Queue> {
        self.update_queue_tag_ids(id, tag_ids).await
    }

    async fn update_routing_method(&self, id: Uuid, routing_method: RoutingMethod) -> Result<Queue> {
        self.update_queue_routing_method(id, routing_method).await
    }

    async fn update_execute(&self, id: Uuid, execute: Execute) -> Result<Queue> {
        self.update_queue_execute(id, execute).await
    }

    async fn execute(&self, id: Uuid) -> ExecuteOutcome {
        self.execute_step(id).await
    }

    async fn get_agents(&self, id: Uuid, status: AgentStatus) -> Result<Vec<Agent>> {
        let queue = self.db.queue_get(id).await?;
        self.req
            .agent_v1_agent_list(queue.customer_id, queue.tag_ids, status)
            .await
    }

    async fn add_wait_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue> {
        self.add_wait(id, queuecall_id).await
    }

    async fn remove_wait_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue> {
        self.remove_wait(id, queuecall_id).await
    }

    async fn add_service_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue> {
        self.add_service(id, queuecall_id).await
    }

    async fn remove_service_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue> {
        self.remove_service(id, queuecall_id).await
    }

    async fn remove_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue> {
        self.remove_all(id, queuecall_id).await
    }

    async fn add_abandoned_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<Queue> {
        self.add_abandoned(id, queuecall_id).await
    }

    async fn event_cu_customer_deleted(&self, customer: Customer) -> Result<()> {
        self.handle_customer_deleted(customer).await
    }
}
