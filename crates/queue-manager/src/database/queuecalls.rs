//! SQLite storage for queuecalls.
//!
//! Status changes only apply from the statuses the target allows and fail
//! with an invalid state error otherwise.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, warn};
use uuid::Uuid;

use super::sqlite::{encode_uuid_list, parse_uuid, parse_uuid_list, SqliteDatabase};
use super::{QueuecallFilter, DEFAULT_PAGE_SIZE};
use crate::error::{QueueError, Result};
use crate::models::{Address, Queuecall, QueuecallStatus, RoutingMethod};
use crate::util::{format_timestamp, parse_timestamp, DEFAULT_TIMESTAMP};

const QUEUECALL_SELECT: &str = r#"
    SELECT
        id,
        customer_id,
        queue_id,

        reference_type,
        reference_id,
        reference_activeflow_id,

        forward_action_id,
        exit_action_id,
        confbridge_id,

        source,
        routing_method,
        tag_ids,

        status,
        service_agent_id,

        timeout_wait,
        timeout_service,

        duration_waiting,
        duration_service,

        tm_create,
        tm_service,
        tm_update,
        tm_end,
        tm_delete
    FROM
        queue_queuecalls
"#;

fn queuecall_from_row(row: &SqliteRow) -> Result<Queuecall> {
    let reference_type: String = row.try_get("reference_type")?;
    let routing_method: String = row.try_get("routing_method")?;
    let status: String = row.try_get("status")?;
    let source: Option<String> = row.try_get("source")?;

    let source = match source {
        Some(raw) if !raw.is_empty() => serde_json::from_str::<Option<Address>>(&raw)?.unwrap_or_default(),
        _ => Address::default(),
    };

    Ok(Queuecall {
        id: parse_uuid(row.try_get("id")?)?,
        customer_id: parse_uuid(row.try_get("customer_id")?)?,
        queue_id: parse_uuid(row.try_get("queue_id")?)?,
        reference_type: serde_json::from_value(serde_json::Value::String(reference_type))?,
        reference_id: parse_uuid(row.try_get("reference_id")?)?,
        reference_activeflow_id: parse_uuid(row.try_get("reference_activeflow_id")?)?,
        forward_action_id: parse_uuid(row.try_get("forward_action_id")?)?,
        exit_action_id: parse_uuid(row.try_get("exit_action_id")?)?,
        confbridge_id: parse_uuid(row.try_get("confbridge_id")?)?,
        source,
        routing_method: RoutingMethod::parse(&routing_method)?,
        tag_ids: parse_uuid_list(row.try_get("tag_ids")?)?,
        status: QueuecallStatus::parse(&status)?,
        service_agent_id: parse_uuid(row.try_get("service_agent_id")?)?,
        timeout_wait: row.try_get("timeout_wait")?,
        timeout_service: row.try_get("timeout_service")?,
        duration_waiting: row.try_get("duration_waiting")?,
        duration_service: row.try_get("duration_service")?,
        tm_create: parse_timestamp(row.try_get("tm_create")?)?,
        tm_service: parse_timestamp(row.try_get("tm_service")?)?,
        tm_update: parse_timestamp(row.try_get("tm_update")?)?,
        tm_end: parse_timestamp(row.try_get("tm_end")?)?,
        tm_delete: parse_timestamp(row.try_get("tm_delete")?)?,
    })
}

/// `'a', 'b'` list for an `IN (...)` guard. Status names are static.
fn status_list(statuses: &[QueuecallStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn now() -> String {
    format_timestamp(&Utc::now())
}

impl SqliteDatabase {
    pub(super) async fn queuecall_insert(&self, qc: &Queuecall) -> Result<()> {
        let ts = now();
        sqlx::query(
            r#"
            INSERT INTO queue_queuecalls (
                id, customer_id, queue_id,
                reference_type, reference_id, reference_activeflow_id,
                forward_action_id, exit_action_id, confbridge_id,
                source, routing_method, tag_ids,
                status, service_agent_id,
                timeout_wait, timeout_service,
                duration_waiting, duration_service,
                tm_create, tm_service, tm_update, tm_end, tm_delete
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(qc.id.to_string())
        .bind(qc.customer_id.to_string())
        .bind(qc.queue_id.to_string())
        .bind(qc.reference_type.as_str())
        .bind(qc.reference_id.to_string())
        .bind(qc.reference_activeflow_id.to_string())
        .bind(qc.forward_action_id.to_string())
        .bind(qc.exit_action_id.to_string())
        .bind(qc.confbridge_id.to_string())
        .bind(serde_json::to_string(&qc.source)?)
        .bind(qc.routing_method.as_str())
        .bind(encode_uuid_list(&qc.tag_ids)?)
        .bind(qc.status.as_str())
        .bind(qc.service_agent_id.to_string())
        .bind(qc.timeout_wait)
        .bind(qc.timeout_service)
        .bind(qc.duration_waiting)
        .bind(qc.duration_service)
        .bind(&ts)
        .bind(DEFAULT_TIMESTAMP)
        .bind(&ts)
        .bind(DEFAULT_TIMESTAMP)
        .bind(DEFAULT_TIMESTAMP)
        .execute(&self.pool)
        .await?;

        self.queuecall_update_to_cache(qc.id).await;
        Ok(())
    }

    async fn queuecall_get_from_db(&self, id: Uuid) -> Result<Queuecall> {
        let query = format!("{} WHERE id = ?", QUEUECALL_SELECT);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| QueueError::not_found(format!("queuecall {}", id)))?;

        queuecall_from_row(&row)
    }

    async fn queuecall_update_to_cache(&self, id: Uuid) {
        match self.queuecall_get_from_db(id).await {
            Ok(qc) => {
                if let Err(e) = self.cache.queuecall_set(&qc).await {
                    warn!("Could not cache queuecall {}: {}", id, e);
                }
            }
            Err(e) => warn!("Could not refresh cached queuecall {}: {}", id, e),
        }
    }

    pub(super) async fn queuecall_get_cached(&self, id: Uuid) -> Result<Queuecall> {
        if let Ok(qc) = self.cache.queuecall_get(id).await {
            return Ok(qc);
        }

        let qc = self.queuecall_get_from_db(id).await?;
        if let Err(e) = self.cache.queuecall_set(&qc).await {
            debug!("Could not cache queuecall {}: {}", id, e);
        }
        Ok(qc)
    }

    pub(super) async fn queuecall_get_by_reference_cached(&self, reference_id: Uuid) -> Result<Queuecall> {
        if let Ok(qc) = self.cache.queuecall_get_by_reference_id(reference_id).await {
            return Ok(qc);
        }

        let query = format!(
            "{} WHERE reference_id = ? ORDER BY tm_create DESC LIMIT 1",
            QUEUECALL_SELECT
        );
        let row = sqlx::query(&query)
            .bind(reference_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| QueueError::not_found(format!("queuecall of reference {}", reference_id)))?;

        let qc = queuecall_from_row(&row)?;
        if let Err(e) = self.cache.queuecall_set(&qc).await {
            debug!("Could not cache queuecall {}: {}", qc.id, e);
        }
        Ok(qc)
    }

    pub(super) async fn queuecall_select_oldest_waiting(&self, queue_id: Uuid) -> Result<Queuecall> {
        let query = format!(
            "{} WHERE queue_id = ? AND status = ? AND tm_delete >= ? ORDER BY tm_create ASC LIMIT 1",
            QUEUECALL_SELECT
        );
        let row = sqlx::query(&query)
            .bind(queue_id.to_string())
            .bind(QueuecallStatus::Waiting.as_str())
            .bind(DEFAULT_TIMESTAMP)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| QueueError::not_found(format!("waiting queuecall of queue {}", queue_id)))?;

        queuecall_from_row(&row)
    }

    pub(super) async fn queuecall_select_page(
        &self,
        size: u64,
        token: Option<DateTime<Utc>>,
        filter: &QueuecallFilter,
    ) -> Result<Vec<Queuecall>> {
        let token = format_timestamp(&token.unwrap_or_else(Utc::now));
        let size = if size == 0 { DEFAULT_PAGE_SIZE } else { size };

        let mut qb = QueryBuilder::<Sqlite>::new(QUEUECALL_SELECT);
        qb.push(" WHERE tm_create < ").push_bind(token);
        filter.push_conditions(&mut qb);
        qb.push(" ORDER BY tm_create DESC LIMIT ").push_bind(size as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(queuecall_from_row).collect()
    }

    pub(super) async fn queuecall_soft_delete(&self, id: Uuid) -> Result<()> {
        let ts = now();
        let result =
            sqlx::query("UPDATE queue_queuecalls SET tm_update = ?, tm_delete = ? WHERE id = ?")
                .bind(&ts)
                .bind(&ts)
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(QueueError::not_found(format!("queuecall {}", id)));
        }

        self.queuecall_update_to_cache(id).await;
        Ok(())
    }

    /// Run a status update guarded by the target's allowed source statuses.
    ///
    /// `assignments` must only use `?` placeholders; they are bound from
    /// `binds` ahead of the status, timestamp and id.
    async fn queuecall_transition(
        &self,
        id: Uuid,
        target: QueuecallStatus,
        assignments: &str,
        binds: Vec<BindValue>,
    ) -> Result<()> {
        let allowed = target.allowed_from();
        let query = format!(
            "UPDATE queue_queuecalls SET {}status = ?, tm_update = ? WHERE id = ? AND status IN ({})",
            assignments,
            status_list(allowed)
        );

        let mut q = sqlx::query(&query);
        for bind in binds {
            q = match bind {
                BindValue::Text(v) => q.bind(v),
                BindValue::Int(v) => q.bind(v),
            };
        }
        let result = q
            .bind(target.as_str())
            .bind(now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            let current = self.queuecall_get_from_db(id).await?;
            return Err(QueueError::invalid_state(format!(
                "queuecall {} is {}, cannot become {}",
                id,
                current.status.as_str(),
                target.as_str()
            )));
        }

        self.queuecall_update_to_cache(id).await;
        Ok(())
    }

    pub(super) async fn queuecall_transition_waiting(&self, id: Uuid) -> Result<()> {
        self.queuecall_transition(id, QueuecallStatus::Waiting, "", vec![]).await
    }

    pub(super) async fn queuecall_transition_connecting(
        &self,
        id: Uuid,
        service_agent_id: Uuid,
    ) -> Result<()> {
        self.queuecall_transition(
            id,
            QueuecallStatus::Connecting,
            "service_agent_id = ?, ",
            vec![BindValue::Text(service_agent_id.to_string())],
        )
        .await
    }

    pub(super) async fn queuecall_transition_kicking(&self, id: Uuid) -> Result<()> {
        self.queuecall_transition(id, QueuecallStatus::Kicking, "", vec![]).await
    }

    pub(super) async fn queuecall_transition_service(
        &self,
        id: Uuid,
        duration_waiting: i64,
        tm_service: DateTime<Utc>,
    ) -> Result<()> {
        self.queuecall_transition(
            id,
            QueuecallStatus::Service,
            "duration_waiting = ?, tm_service = ?, ",
            vec![
                BindValue::Int(duration_waiting),
                BindValue::Text(format_timestamp(&tm_service)),
            ],
        )
        .await
    }

    pub(super) async fn queuecall_transition_abandoned(
        &self,
        id: Uuid,
        duration_waiting: i64,
        tm_end: DateTime<Utc>,
    ) -> Result<()> {
        self.queuecall_transition(
            id,
            QueuecallStatus::Abandoned,
            "duration_waiting = ?, tm_end = ?, ",
            vec![
                BindValue::Int(duration_waiting),
                BindValue::Text(format_timestamp(&tm_end)),
            ],
        )
        .await
    }

    pub(super) async fn queuecall_transition_done(
        &self,
        id: Uuid,
        duration_service: i64,
        tm_end: DateTime<Utc>,
    ) -> Result<()> {
        self.queuecall_transition(
            id,
            QueuecallStatus::Done,
            "duration_service = ?, tm_end = ?, ",
            vec![
                BindValue::Int(duration_service),
                BindValue::Text(format_timestamp(&tm_end)),
            ],
        )
        .await
    }
}

enum BindValue {
    Text(String),
    Int(i64),
}
