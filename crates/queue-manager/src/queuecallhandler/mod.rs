//! # Queuecall Handler
//!
//! Owns one call's journey through a queue. All status changes go through
//! the store's conditional transitions, so a duplicate or late trigger
//! (timer, event, retry) either finds nothing to do or fails the guard.
//!
//! Side effects on the owning queue, the flow engine and the telephony
//! layer follow each transition. Those that only clean up (confbridge,
//! flow variables) are best-effort and never undo the transition.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::bus::{NotifyHandler, RequestHandler};
use crate::config::ExecutionConfig;
use crate::database::{Database, QueuecallFilter};
use crate::error::Result;
use crate::models::{Call, Customer, Queuecall, ReferenceType, Service};
use crate::queuehandler::QueueHandler;
use crate::util::Clock;

mod db;
mod event;
mod execute;
mod healthcheck;
mod kick;
mod service;
mod status;
mod timeout;
mod variables;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueuecallHandler: Send + Sync {
    /// Put a call into a queue. Returns the actions the flow engine pushes
    /// onto the caller's activeflow.
    async fn service_start(
        &self,
        queue_id: Uuid,
        activeflow_id: Uuid,
        reference_type: ReferenceType,
        reference_id: Uuid,
    ) -> Result<Service>;

    async fn get(&self, id: Uuid) -> Result<Queuecall>;
    async fn get_by_reference_id(&self, reference_id: Uuid) -> Result<Queuecall>;
    async fn list(
        &self,
        size: u64,
        token: Option<DateTime<Utc>>,
        filter: QueuecallFilter,
    ) -> Result<Vec<Queuecall>>;
    /// Only terminal queuecalls can be deleted.
    async fn delete(&self, id: Uuid) -> Result<Queuecall>;

    async fn update_status_waiting(&self, id: Uuid) -> Result<Queuecall>;

    /// Dial the agent and send the caller into the confbridge.
    async fn execute(&self, id: Uuid, agent_id: Uuid) -> Result<Queuecall>;

    async fn kick(&self, id: Uuid) -> Result<Queuecall>;
    async fn kick_by_reference_id(&self, reference_id: Uuid) -> Result<Queuecall>;

    async fn health_check(&self, id: Uuid, retry_count: u32) -> Result<()>;
    async fn timeout_wait(&self, id: Uuid) -> Result<()>;
    async fn timeout_service(&self, id: Uuid) -> Result<()>;

    async fn event_cm_call_hangup(&self, call: Call) -> Result<()>;
    async fn event_cm_confbridge_joined(&self, reference_id: Uuid, confbridge_id: Uuid) -> Result<()>;
    async fn event_cm_confbridge_leaved(&self, reference_id: Uuid, confbridge_id: Uuid) -> Result<()>;
    async fn event_cu_customer_deleted(&self, customer: Customer) -> Result<()>;
}

pub struct QueuecallHandlerImpl {
    db: Arc<dyn Database>,
    req: Arc<dyn RequestHandler>,
    notify: Arc<dyn NotifyHandler>,
    queue_handler: Arc<dyn QueueHandler>,
    clock: Arc<dyn Clock>,
    config: ExecutionConfig,
}

impl QueuecallHandlerImpl {
    pub fn new(
        db: Arc<dyn Database>,
        req: Arc<dyn RequestHandler>,
        notify: Arc<dyn NotifyHandler>,
        queue_handler: Arc<dyn QueueHandler>,
        clock: Arc<dyn Clock>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            db,
            req,
            notify,
            queue_handler,
            clock,
            config,
        }
    }
}

#[async_trait]
impl QueuecallHandler for QueuecallHandlerImpl {
    async fn service_start(
        &self,
        queue_id: Uuid,
        activeflow_id: Uuid,
        reference_type: ReferenceType,
        reference_id: Uuid,
    ) -> Result<Service> {
        self.start_service(queue_id, activeflow_id, reference_type, reference_id)
            .await
    }

    async fn get(&self, id: Uuid) -> Result<Queuecall> {
        self.db.queuecall_get(id).await
    }

    async fn get_by_reference_id(&self, reference_id: Uuid) -> Result<Queuecall> {
        self.db.queuecall_get_by_reference_id(reference_id).await
    }

    async fn list(
        &self,
        size: u64,
        token: Option<DateTime<Utc>>,
        filter: QueuecallFilter,
    ) -> Result<Vec<Queuecall>> {
        self.db.queuecall_list(size, token, filter).await
    }

    async fn delete(&self, id: Uuid) -> Result<Queuecall> {
        self.delete_queuecall(id).await
    }

    async fn update_status_waiting(&self, id: Uuid) -> Result<Queuecall> {
        self.set_status_waiting(id).await
    }

    async fn execute(&self, id: Uuid, agent_id: Uuid) -> Result<Queuecall> {
        self.dial_agent(id, agent_id).await
    }

    async fn kick(&self, id: Uuid) -> Result<Queuecall> {
        self.kick_queuecall(id).await
    }

    async fn kick_by_reference_id(&self, reference_id: Uuid) -> Result<Queuecall> {
        self.kick_reference(reference_id).await
    }

    async fn health_check(&self, id: Uuid, retry_count: u32) -> Result<()> {
        self.check_health(id, retry_count).await
    }

    async fn timeout_wait(&self, id: Uuid) -> Result<()> {
        self.handle_timeout_wait(id).await
    }

    async fn timeout_service(&self, id: Uuid) -> Result<()> {
        self.handle_timeout_service(id).await
    }

    async fn event_cm_call_hangup(&self, call: Call) -> Result<()> {
        self.handle_call_hangup(call).await
    }

    async fn event_cm_confbridge_joined(&self, reference_id: Uuid, confbridge_id: Uuid) -> Result<()> {
        self.handle_confbridge_joined(reference_id, confbridge_id).await
    }

    async fn event_cm_confbridge_leaved(&self, reference_id: Uuid, confbridge_id: Uuid) -> Result<()> {
        self.handle_confbridge_leaved(reference_id, confbridge_id).await
    }

    async fn event_cu_customer_deleted(&self, customer: Customer) -> Result<()> {
        self.handle_customer_deleted(customer).await
    }
}
