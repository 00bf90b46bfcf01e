//! SQLite storage for queues.
//!
//! Membership sets are JSON arrays updated in a single statement, guarded by
//! the queuecall's current status so a late update cannot re-add an ended
//! call.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, warn};
use uuid::Uuid;

use super::sqlite::{
    encode_uuid_list, json_append_expr, json_contains_expr, json_remove_expr, parse_uuid,
    parse_uuid_list, SqliteDatabase,
};
use super::{QueueFilter, DEFAULT_PAGE_SIZE};
use crate::error::{QueueError, Result};
use crate::models::{Execute, Queue, RoutingMethod};
use crate::util::{format_timestamp, parse_timestamp, DEFAULT_TIMESTAMP};

const QUEUE_SELECT: &str = r#"
    SELECT
        id,
        customer_id,

        name,
        detail,

        routing_method,
        tag_ids,

        execute,

        wait_flow_id,
        wait_timeout,
        service_timeout,

        coalesce(wait_queuecall_ids, '[]') AS wait_queuecall_ids,
        coalesce(service_queuecall_ids, '[]') AS service_queuecall_ids,

        total_incoming_count,
        total_serviced_count,
        total_abandoned_count,

        tm_create,
        tm_update,
        tm_delete
    FROM
        queue_queues
"#;

fn queue_from_row(row: &SqliteRow) -> Result<Queue> {
    let routing_method: String = row.try_get("routing_method")?;
    let execute: String = row.try_get("execute")?;

    Ok(Queue {
        id: parse_uuid(row.try_get("id")?)?,
        customer_id: parse_uuid(row.try_get("customer_id")?)?,
        name: row.try_get("name")?,
        detail: row.try_get("detail")?,
        routing_method: RoutingMethod::parse(&routing_method)?,
        tag_ids: parse_uuid_list(row.try_get("tag_ids")?)?,
        execute: Execute::parse(&execute)?,
        wait_flow_id: parse_uuid(row.try_get("wait_flow_id")?)?,
        wait_timeout: row.try_get("wait_timeout")?,
        service_timeout: row.try_get("service_timeout")?,
        wait_queuecall_ids: parse_uuid_list(row.try_get("wait_queuecall_ids")?)?,
        service_queuecall_ids: parse_uuid_list(row.try_get("service_queuecall_ids")?)?,
        total_incoming_count: row.try_get("total_incoming_count")?,
        total_serviced_count: row.try_get("total_serviced_count")?,
        total_abandoned_count: row.try_get("total_abandoned_count")?,
        tm_create: parse_timestamp(row.try_get("tm_create")?)?,
        tm_update: parse_timestamp(row.try_get("tm_update")?)?,
        tm_delete: parse_timestamp(row.try_get("tm_delete")?)?,
    })
}

fn now() -> String {
    format_timestamp(&Utc::now())
}

impl SqliteDatabase {
    pub(super) async fn queue_insert(&self, queue: &Queue) -> Result<()> {
        let ts = now();
        sqlx::query(
            r#"
            INSERT INTO queue_queues (
                id, customer_id,
                name, detail,
                routing_method, tag_ids,
                execute,
                wait_flow_id, wait_timeout, service_timeout,
                wait_queuecall_ids, service_queuecall_ids,
                total_incoming_count, total_serviced_count, total_abandoned_count,
                tm_create, tm_update, tm_delete
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(queue.id.to_string())
        .bind(queue.customer_id.to_string())
        .bind(&queue.name)
        .bind(&queue.detail)
        .bind(queue.routing_method.as_str())
        .bind(encode_uuid_list(&queue.tag_ids)?)
        .bind(queue.execute.as_str())
        .bind(queue.wait_flow_id.to_string())
        .bind(queue.wait_timeout)
        .bind(queue.service_timeout)
        .bind(encode_uuid_list(&queue.wait_queuecall_ids)?)
        .bind(encode_uuid_list(&queue.service_queuecall_ids)?)
        .bind(queue.total_incoming_count)
        .bind(queue.total_serviced_count)
        .bind(queue.total_abandoned_count)
        .bind(&ts)
        .bind(&ts)
        .bind(DEFAULT_TIMESTAMP)
        .execute(&self.pool)
        .await?;

        self.queue_update_to_cache(queue.id).await;
        Ok(())
    }

    async fn queue_get_from_db(&self, id: Uuid) -> Result<Queue> {
        let query = format!("{} WHERE id = ?", QUEUE_SELECT);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| QueueError::not_found(format!("queue {}", id)))?;

        queue_from_row(&row)
    }

    /// Re-read the row and overwrite the cache. Failures only cost a later miss.
    async fn queue_update_to_cache(&self, id: Uuid) {
        match self.queue_get_from_db(id).await {
            Ok(queue) => {
                if let Err(e) = self.cache.queue_set(&queue).await {
                    warn!("Could not cache queue {}: {}", id, e);
                }
            }
            Err(e) => warn!("Could not refresh cached queue {}: {}", id, e),
        }
    }

    pub(super) async fn queue_get_cached(&self, id: Uuid) -> Result<Queue> {
        if let Ok(queue) = self.cache.queue_get(id).await {
            return Ok(queue);
        }

        let queue = self.queue_get_from_db(id).await?;
        if let Err(e) = self.cache.queue_set(&queue).await {
            debug!("Could not cache queue {}: {}", id, e);
        }
        Ok(queue)
    }

    pub(super) async fn queue_select_page(
        &self,
        size: u64,
        token: Option<DateTime<Utc>>,
        filter: &QueueFilter,
    ) -> Result<Vec<Queue>> {
        let token = format_timestamp(&token.unwrap_or_else(Utc::now));
        let size = if size == 0 { DEFAULT_PAGE_SIZE } else { size };

        let mut qb = QueryBuilder::<Sqlite>::new(QUEUE_SELECT);
        qb.push(" WHERE tm_create < ").push_bind(token);
        filter.push_conditions(&mut qb);
        qb.push(" ORDER BY tm_create DESC LIMIT ").push_bind(size as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(queue_from_row).collect()
    }

    pub(super) async fn queue_soft_delete(&self, id: Uuid) -> Result<()> {
        let ts = now();
        let result = sqlx::query("UPDATE queue_queues SET tm_update = ?, tm_delete = ? WHERE id = ?")
            .bind(&ts)
            .bind(&ts)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        self.ensure_queue_affected(id, result.rows_affected())?;

        self.queue_update_to_cache(id).await;
        Ok(())
    }

    pub(super) async fn queue_update_basic_info(
        &self,
        id: Uuid,
        name: &str,
        detail: &str,
        routing_method: RoutingMethod,
        tag_ids: &[Uuid],
        wait_flow_id: Uuid,
        wait_timeout: i64,
        service_timeout: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE queue_queues SET
                name = ?,
                detail = ?,
                routing_method = ?,
                tag_ids = ?,
                wait_flow_id = ?,
                wait_timeout = ?,
                service_timeout = ?,
                tm_update = ?
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(detail)
        .bind(routing_method.as_str())
        .bind(encode_uuid_list(tag_ids)?)
        .bind(wait_flow_id.to_string())
        .bind(wait_timeout)
        .bind(service_timeout)
        .bind(now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        self.ensure_queue_affected(id, result.rows_affected())?;

        self.queue_update_to_cache(id).await;
        Ok(())
    }

    pub(super) async fn queue_update_tag_ids(&self, id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        let result = sqlx::query("UPDATE queue_queues SET tag_ids = ?, tm_update = ? WHERE id = ?")
            .bind(encode_uuid_list(tag_ids)?)
            .bind(now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        self.ensure_queue_affected(id, result.rows_affected())?;

        self.queue_update_to_cache(id).await;
        Ok(())
    }

    pub(super) async fn queue_update_routing_method(
        &self,
        id: Uuid,
        routing_method: RoutingMethod,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE queue_queues SET routing_method = ?, tm_update = ? WHERE id = ?")
                .bind(routing_method.as_str())
                .bind(now())
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;
        self.ensure_queue_affected(id, result.rows_affected())?;

        self.queue_update_to_cache(id).await;
        Ok(())
    }

    pub(super) async fn queue_update_execute(&self, id: Uuid, execute: Execute) -> Result<()> {
        let result = sqlx::query("UPDATE queue_queues SET execute = ?, tm_update = ? WHERE id = ?")
            .bind(execute.as_str())
            .bind(now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        self.ensure_queue_affected(id, result.rows_affected())?;

        self.queue_update_to_cache(id).await;
        Ok(())
    }

    /// Counts the queuecall as incoming once it has left `initiating`, even
    /// when it moved past `waiting` before getting here. Only a queuecall
    /// still waiting joins the wait set.
    pub(super) async fn queue_membership_add_wait(&self, id: Uuid, queuecall_id: Uuid) -> Result<()> {
        let count = format!(
            r#"
            UPDATE queue_queues SET
                total_incoming_count = total_incoming_count + 1,
                tm_update = ?2
            WHERE id = ?3
                AND NOT {contains}
                AND EXISTS (SELECT 1 FROM queue_queuecalls WHERE id = ?1 AND status <> 'initiating')
            "#,
            contains = json_contains_expr("queue_queues", "wait_queuecall_ids"),
        );
        let append = format!(
            r#"
            UPDATE queue_queues SET
                wait_queuecall_ids = {append},
                tm_update = ?2
            WHERE id = ?3
                AND NOT {contains}
                AND EXISTS (SELECT 1 FROM queue_queuecalls WHERE id = ?1 AND status = 'waiting')
            "#,
            append = json_append_expr("wait_queuecall_ids"),
            contains = json_contains_expr("queue_queues", "wait_queuecall_ids"),
        );

        let ts = now();
        let mut tx = self.pool.begin().await?;
        let counted = sqlx::query(&count)
            .bind(queuecall_id.to_string())
            .bind(&ts)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        let appended = sqlx::query(&append)
            .bind(queuecall_id.to_string())
            .bind(&ts)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(
            "Queue {} add wait for queuecall {}: counted {}, appended {}",
            id,
            queuecall_id,
            counted.rows_affected(),
            appended.rows_affected()
        );

        self.queue_update_to_cache(id).await;
        Ok(())
    }

    pub(super) async fn queue_membership_add_service(
        &self,
        id: Uuid,
        queuecall_id: Uuid,
    ) -> Result<()> {
        let query = format!(
            r#"
            UPDATE queue_queues SET
                wait_queuecall_ids = {remove_wait},
                service_queuecall_ids = {append},
                total_serviced_count = total_serviced_count + 1,
                tm_update = ?2
            WHERE id = ?3
                AND NOT {contains}
                AND EXISTS (SELECT 1 FROM queue_queuecalls WHERE id = ?1 AND status = 'service')
            "#,
            remove_wait = json_remove_expr("queue_queues", "wait_queuecall_ids"),
            append = json_append_expr("service_queuecall_ids"),
            contains = json_contains_expr("queue_queues", "service_queuecall_ids"),
        );
        self.queue_membership_execute(&query, id, queuecall_id).await
    }

    /// Remove from the selected sets, optionally counting an abandoned call.
    pub(super) async fn queue_membership_remove(
        &self,
        id: Uuid,
        queuecall_id: Uuid,
        from_wait: bool,
        from_service: bool,
        count_abandoned: bool,
    ) -> Result<()> {
        let mut assignments = Vec::new();
        if from_wait {
            assignments.push(format!(
                "wait_queuecall_ids = {}",
                json_remove_expr("queue_queues", "wait_queuecall_ids")
            ));
        }
        if from_service {
            assignments.push(format!(
                "service_queuecall_ids = {}",
                json_remove_expr("queue_queues", "service_queuecall_ids")
            ));
        }
        if count_abandoned {
            assignments.push("total_abandoned_count = total_abandoned_count + 1".to_string());
        }
        assignments.push("tm_update = ?2".to_string());

        let query = format!("UPDATE queue_queues SET {} WHERE id = ?3", assignments.join(", "));
        self.queue_membership_execute(&query, id, queuecall_id).await
    }

    async fn queue_membership_execute(&self, query: &str, id: Uuid, queuecall_id: Uuid) -> Result<()> {
        let result = sqlx::query(query)
            .bind(queuecall_id.to_string())
            .bind(now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        debug!(
            "Queue {} membership update for queuecall {} affected {} row(s)",
            id,
            queuecall_id,
            result.rows_affected()
        );

        self.queue_update_to_cache(id).await;
        Ok(())
    }

    fn ensure_queue_affected(&self, id: Uuid, rows_affected: u64) -> Result<()> {
        if rows_affected == 0 {
            return Err(QueueError::not_found(format!("queue {}", id)));
        }
        Ok(())
    }
}
