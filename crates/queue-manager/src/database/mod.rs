//! # Queue/Queuecall Store
//!
//! Persistent state for the two entities this service owns, behind the
//! [`Database`] trait so handlers can be tested against mocks.
//!
//! Rules every implementation follows:
//!
//! - Missing rows surface as [`QueueError::NotFound`](crate::error::QueueError::NotFound).
//! - Id collections are never null; an empty set reads back as `[]`.
//! - Queue membership sets are changed with single atomic statements, never
//!   read-modify-write in the application.
//! - Queuecall status changes are conditional on the current status. A
//!   transition whose guard fails returns `InvalidState` and changes nothing.
//! - Every write refreshes the cache; every read tries the cache first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Execute, Queue, Queuecall, RoutingMethod};

mod filter;
mod queuecalls;
mod queues;
mod schema;
mod sqlite;

pub use filter::{QueueFilter, QueuecallFilter};
pub use sqlite::SqliteDatabase;

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    async fn queue_create(&self, queue: &Queue) -> Result<()>;
    async fn queue_get(&self, id: Uuid) -> Result<Queue>;
    /// Newest first, strictly older than `token` when given.
    async fn queue_list(
        &self,
        size: u64,
        token: Option<DateTime<Utc>>,
        filter: QueueFilter,
    ) -> Result<Vec<Queue>>;
    async fn queue_delete(&self, id: Uuid) -> Result<()>;

    async fn queue_set_basic_info(
        &self,
        id: Uuid,
        name: String,
        detail: String,
        routing_method: RoutingMethod,
        tag_ids: Vec<Uuid>,
        wait_flow_id: Uuid,
        wait_timeout: i64,
        service_timeout: i64,
    ) -> Result<()>;
    async fn queue_set_tag_ids(&self, id: Uuid, tag_ids: Vec<Uuid>) -> Result<()>;
    async fn queue_set_routing_method(&self, id: Uuid, routing_method: RoutingMethod) -> Result<()>;
    async fn queue_set_execute(&self, id: Uuid, execute: Execute) -> Result<()>;

    /// Appends to the wait set and counts an incoming call. Does nothing
    /// unless the queuecall is `waiting` and not already a member.
    async fn queue_add_wait_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<()>;
    async fn queue_remove_wait_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<()>;
    /// Moves from the wait set to the service set and counts a serviced
    /// call. Does nothing unless the queuecall is in `service` and not
    /// already a member of the service set.
    async fn queue_add_service_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<()>;
    async fn queue_remove_service_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<()>;
    /// Removes from both sets.
    async fn queue_remove_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<()>;
    /// Removes from both sets and counts an abandoned call.
    async fn queue_add_abandoned_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<()>;

    async fn queuecall_create(&self, queuecall: &Queuecall) -> Result<()>;
    async fn queuecall_get(&self, id: Uuid) -> Result<Queuecall>;
    /// The most recently created queuecall for the reference.
    async fn queuecall_get_by_reference_id(&self, reference_id: Uuid) -> Result<Queuecall>;
    /// The oldest live `waiting` queuecall of the queue.
    async fn queuecall_get_oldest_waiting(&self, queue_id: Uuid) -> Result<Queuecall>;
    /// Newest first, strictly older than `token` when given.
    async fn queuecall_list(
        &self,
        size: u64,
        token: Option<DateTime<Utc>>,
        filter: QueuecallFilter,
    ) -> Result<Vec<Queuecall>>;
    async fn queuecall_delete(&self, id: Uuid) -> Result<()>;

    async fn queuecall_set_status_waiting(&self, id: Uuid) -> Result<()>;
    async fn queuecall_set_status_connecting(&self, id: Uuid, service_agent_id: Uuid) -> Result<()>;
    async fn queuecall_set_status_kicking(&self, id: Uuid) -> Result<()>;
    async fn queuecall_set_status_service(
        &self,
        id: Uuid,
        duration_waiting: i64,
        tm_service: DateTime<Utc>,
    ) -> Result<()>;
    async fn queuecall_set_status_abandoned(
        &self,
        id: Uuid,
        duration_waiting: i64,
        tm_end: DateTime<Utc>,
    ) -> Result<()>;
    async fn queuecall_set_status_done(
        &self,
        id: Uuid,
        duration_service: i64,
        tm_end: DateTime<Utc>,
    ) -> Result<()>;
}
