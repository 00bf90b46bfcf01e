//! Read-through/write-through cache in front of the store.
//!
//! The cache never holds anything the store does not. A miss or a cache
//! failure always falls back to the store, so losing the cache only costs
//! latency.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{QueueError, Result};
use crate::models::{Queue, Queuecall};

#[async_trait]
pub trait Cache: Send + Sync {
    async fn queue_get(&self, id: Uuid) -> Result<Queue>;
    async fn queue_set(&self, queue: &Queue) -> Result<()>;

    async fn queuecall_get(&self, id: Uuid) -> Result<Queuecall>;
    async fn queuecall_get_by_reference_id(&self, reference_id: Uuid) -> Result<Queuecall>;
    async fn queuecall_set(&self, queuecall: &Queuecall) -> Result<()>;
}

/// In-process cache keyed by record id.
#[derive(Default)]
pub struct MemoryCache {
    queues: DashMap<Uuid, Queue>,
    queuecalls: DashMap<Uuid, Queuecall>,
    /// reference id -> most recently created queuecall for it
    references: DashMap<Uuid, Uuid>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn queue_get(&self, id: Uuid) -> Result<Queue> {
        self.queues
            .get(&id)
            .map(|q| q.value().clone())
            .ok_or_else(|| QueueError::cache(format!("queue {} not cached", id)))
    }

    async fn queue_set(&self, queue: &Queue) -> Result<()> {
        self.queues.insert(queue.id, queue.clone());
        Ok(())
    }

    async fn queuecall_get(&self, id: Uuid) -> Result<Queuecall> {
        self.queuecalls
            .get(&id)
            .map(|qc| qc.value().clone())
            .ok_or_else(|| QueueError::cache(format!("queuecall {} not cached", id)))
    }

    async fn queuecall_get_by_reference_id(&self, reference_id: Uuid) -> Result<Queuecall> {
        let id = self
            .references
            .get(&reference_id)
            .map(|r| *r.value())
            .ok_or_else(|| QueueError::cache(format!("reference {} not cached", reference_id)))?;
        self.queuecall_get(id).await
    }

    async fn queuecall_set(&self, queuecall: &Queuecall) -> Result<()> {
        let newer = match self.references.get(&queuecall.reference_id) {
            Some(indexed) if *indexed.value() != queuecall.id => self
                .queuecalls
                .get(indexed.value())
                .map_or(true, |current| current.tm_create <= queuecall.tm_create),
            _ => true,
        };
        if newer {
            self.references.insert(queuecall.reference_id, queuecall.id);
        }

        self.queuecalls.insert(queuecall.id, queuecall.clone());
        Ok(())
    }
}
