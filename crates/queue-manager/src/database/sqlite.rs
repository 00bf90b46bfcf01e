use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use super::{schema, Database, QueueFilter, QueuecallFilter};
use crate::cache::Cache;
use crate::error::{QueueError, Result};
use crate::models::{Execute, Queue, Queuecall, RoutingMethod};

/// SQLite-backed store with a cache in front of it.
#[derive(Clone)]
pub struct SqliteDatabase {
    pub(super) pool: SqlitePool,
    pub(super) cache: Arc<dyn Cache>,
}

impl SqliteDatabase {
    /// Connect and make sure the schema exists.
    pub async fn new(database_url: &str, max_connections: u32, cache: Arc<dyn Cache>) -> Result<Self> {
        info!("Initializing queue database: {}", database_url);

        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let mut options = SqliteConnectOptions::from_str(database_url)?
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);
        if !in_memory {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        // Every connection to `:memory:` is its own database, so keep exactly one alive.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };

        let pool = pool_options.connect_with(options).await?;
        let db = Self { pool, cache };
        db.initialize_schema().await?;

        info!("Queue database initialized");
        Ok(db)
    }

    /// In-memory store for tests and standalone runs.
    pub async fn new_in_memory(cache: Arc<dyn Cache>) -> Result<Self> {
        Self::new("sqlite::memory:", 1, cache).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(schema::QUEUE_QUEUES).execute(&self.pool).await?;
        sqlx::query(schema::QUEUE_QUEUECALLS).execute(&self.pool).await?;
        for index in schema::INDEXES {
            sqlx::query(index).execute(&self.pool).await?;
        }
        debug!("Queue database schema ready");
        Ok(())
    }
}

pub(super) fn parse_uuid(value: &str) -> Result<Uuid> {
    if value.is_empty() {
        return Ok(Uuid::nil());
    }
    Uuid::parse_str(value)
        .map_err(|e| QueueError::internal(format!("invalid uuid in store {}: {}", value, e)))
}

/// Decode a JSON id array column. NULL and `null` read back as empty.
pub(super) fn parse_uuid_list(value: Option<String>) -> Result<Vec<Uuid>> {
    match value {
        Some(raw) if !raw.is_empty() => {
            let ids: Option<Vec<Uuid>> = serde_json::from_str(&raw)?;
            Ok(ids.unwrap_or_default())
        }
        _ => Ok(Vec::new()),
    }
}

pub(super) fn encode_uuid_list(ids: &[Uuid]) -> Result<String> {
    Ok(serde_json::to_string(ids)?)
}

/// SQL expression for `column` with `?1` removed from its id array.
pub(super) fn json_remove_expr(table: &str, column: &str) -> String {
    format!(
        "(SELECT json_group_array(value) FROM json_each(coalesce({table}.{column}, '[]')) WHERE value != ?1)"
    )
}

/// SQL expression for `column` with `?1` appended to its id array.
pub(super) fn json_append_expr(column: &str) -> String {
    format!("json_insert(coalesce({column}, '[]'), '$[#]', ?1)")
}

/// SQL condition true when `?1` is a member of `column`.
pub(super) fn json_contains_expr(table: &str, column: &str) -> String {
    format!("EXISTS (SELECT 1 FROM json_each(coalesce({table}.{column}, '[]')) WHERE value = ?1)")
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn queue_create(&self, queue: &Queue) -> Result<()> {
        self.queue_insert(queue).await
    }

    async fn queue_get(&self, id: Uuid) -> Result<Queue> {
        self.queue_get_cached(id).await
    }

    async fn queue_list(
        &self,
        size: u64,
        token: Option<DateTime<Utc>>,
        filter: QueueFilter,
    ) -> Result<Vec<Queue>> {
        self.queue_select_page(size, token, &filter).await
    }

    async fn queue_delete(&self, id: Uuid) -> Result<()> {
        self.queue_soft_delete(id).await
    }

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
    ) -> Result<()> {
        self.queue_update_basic_info(
            id,
            &name,
            &detail,
            routing_method,
            &tag_ids,
            wait_flow_id,
            wait_timeout,
            service_timeout,
        )
        .await
    }

    async fn queue_set_tag_ids(&self, id: Uuid, tag_ids: Vec<Uuid>) -> Result<()> {
        self.queue_update_tag_ids(id, &tag_ids).await
    }

    async fn queue_set_routing_method(&self, id: Uuid, routing_method: RoutingMethod) -> Result<()> {
        self.queue_update_routing_method(id, routing_method).await
    }

    async fn queue_set_execute(&self, id: Uuid, execute: Execute) -> Result<()> {
        self.queue_update_execute(id, execute).await
    }

    async fn queue_add_wait_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<()> {
        self.queue_membership_add_wait(id, queuecall_id).await
    }

    async fn queue_remove_wait_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<()> {
        self.queue_membership_remove(id, queuecall_id, true, false, false).await
    }

    async fn queue_add_service_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<()> {
        self.queue_membership_add_service(id, queuecall_id).await
    }

    async fn queue_remove_service_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<()> {
        self.queue_membership_remove(id, queuecall_id, false, true, false).await
    }

    async fn queue_remove_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<()> {
        self.queue_membership_remove(id, queuecall_id, true, true, false).await
    }

    async fn queue_add_abandoned_queuecall_id(&self, id: Uuid, queuecall_id: Uuid) -> Result<()> {
        self.queue_membership_remove(id, queuecall_id, true, true, true).await
    }

    async fn queuecall_create(&self, queuecall: &Queuecall) -> Result<()> {
        self.queuecall_insert(queuecall).await
    }

    async fn queuecall_get(&self, id: Uuid) -> Result<Queuecall> {
        self.queuecall_get_cached(id).await
    }

    async fn queuecall_get_by_reference_id(&self, reference_id: Uuid) -> Result<Queuecall> {
        self.queuecall_get_by_reference_cached(reference_id).await
    }

    async fn queuecall_get_oldest_waiting(&self, queue_id: Uuid) -> Result<Queuecall> {
        self.queuecall_select_oldest_waiting(queue_id).await
    }

    async fn queuecall_list(
        &self,
        size: u64,
        token: Option<DateTime<Utc>>,
        filter: QueuecallFilter,
    ) -> Result<Vec<Queuecall>> {
        self.queuecall_select_page(size, token, &filter).await
    }

    async fn queuecall_delete(&self, id: Uuid) -> Result<()> {
        self.queuecall_soft_delete(id).await
    }

    async fn queuecall_set_status_waiting(&self, id: Uuid) -> Result<()> {
        self.queuecall_transition_waiting(id).await
    }

    async fn queuecall_set_status_connecting(&self, id: Uuid, service_agent_id: Uuid) -> Result<()> {
        self.queuecall_transition_connecting(id, service_agent_id).await
    }

    async fn queuecall_set_status_kicking(&self, id: Uuid) -> Result<()> {
        self.queuecall_transition_kicking(id).await
    }

    async fn queuecall_set_status_service(
        &self,
        id: Uuid,
        duration_waiting: i64,
        tm_service: DateTime<Utc>,
    ) -> Result<()> {
        self.queuecall_transition_service(id, duration_waiting, tm_service).await
    }

    async fn queuecall_set_status_abandoned(
        &self,
        id: Uuid,
        duration_waiting: i64,
        tm_end: DateTime<Utc>,
    ) -> Result<()> {
        self.queuecall_transition_abandoned(id, duration_waiting, tm_end).await
    }

    async fn queuecall_set_status_done(
        &self,
        id: Uuid,
        duration_service: i64,
        tm_end: DateTime<Utc>,
    ) -> Result<()> {
        self.queuecall_transition_done(id, duration_service, tm_end).await
    }
}
