//! Typed listing filters.
//!
//! Every field is optional; `None` means "do not filter on this column".
//! Both filters deserialize straight from a request body, so the request
//! bridge never has to interpret string-keyed maps.

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use crate::models::{Execute, QueuecallStatus};
use crate::util::DEFAULT_TIMESTAMP;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueFilter {
    pub customer_id: Option<Uuid>,
    pub name: Option<String>,
    pub execute: Option<Execute>,
    /// `Some(false)` keeps only live rows, `Some(true)` only deleted ones
    pub deleted: Option<bool>,
}

impl QueueFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customer_id(mut self, customer_id: Uuid) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_execute(mut self, execute: Execute) -> Self {
        self.execute = Some(execute);
        self
    }

    pub fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = Some(deleted);
        self
    }

    pub(crate) fn push_conditions(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(customer_id) = self.customer_id {
            qb.push(" AND customer_id = ").push_bind(customer_id.to_string());
        }
        if let Some(name) = &self.name {
            qb.push(" AND name = ").push_bind(name.clone());
        }
        if let Some(execute) = self.execute {
            qb.push(" AND execute = ").push_bind(execute.as_str());
        }
        push_deleted(qb, self.deleted);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueuecallFilter {
    pub customer_id: Option<Uuid>,
    pub queue_id: Option<Uuid>,
    pub reference_id: Option<Uuid>,
    pub reference_activeflow_id: Option<Uuid>,
    pub service_agent_id: Option<Uuid>,
    pub status: Option<QueuecallStatus>,
    /// `Some(false)` keeps only live rows, `Some(true)` only deleted ones
    pub deleted: Option<bool>,
}

impl QueuecallFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customer_id(mut self, customer_id: Uuid) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_queue_id(mut self, queue_id: Uuid) -> Self {
        self.queue_id = Some(queue_id);
        self
    }

    pub fn with_reference_id(mut self, reference_id: Uuid) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    pub fn with_reference_activeflow_id(mut self, activeflow_id: Uuid) -> Self {
        self.reference_activeflow_id = Some(activeflow_id);
        self
    }

    pub fn with_service_agent_id(mut self, agent_id: Uuid) -> Self {
        self.service_agent_id = Some(agent_id);
        self
    }

    pub fn with_status(mut self, status: QueuecallStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = Some(deleted);
        self
    }

    pub(crate) fn push_conditions(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        let uuid_columns = [
            ("customer_id", self.customer_id),
            ("queue_id", self.queue_id),
            ("reference_id", self.reference_id),
            ("reference_activeflow_id", self.reference_activeflow_id),
            ("service_agent_id", self.service_agent_id),
        ];
        for (column, value) in uuid_columns {
            if let Some(value) = value {
                qb.push(format!(" AND {} = ", column)).push_bind(value.to_string());
            }
        }
        if let Some(status) = self.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        push_deleted(qb, self.deleted);
    }
}

fn push_deleted(qb: &mut QueryBuilder<'_, Sqlite>, deleted: Option<bool>) {
    match deleted {
        Some(false) => {
            qb.push(" AND tm_delete >= ").push_bind(DEFAULT_TIMESTAMP);
        }
        Some(true) => {
            qb.push(" AND tm_delete < ").push_bind(DEFAULT_TIMESTAMP);
        }
        None => {}
    }
}
