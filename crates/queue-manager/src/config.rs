//! # Queue Manager Configuration
//!
//! Settings are layered: compiled-in defaults, then an optional TOML file,
//! then `QUEUE_MANAGER__<SECTION>__<KEY>` environment variables.
//!
//! ```rust
//! use rvoip_queue_manager::config::QueueManagerConfig;
//!
//! let config = QueueManagerConfig::default();
//! assert_eq!(config.execution.execute_delay_ms, 100);
//! assert!(config.validate().is_ok());
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QueueError, Result};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "QUEUE_MANAGER";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueManagerConfig {
    pub general: GeneralConfig,
    pub database: DatabaseConfig,
    pub execution: ExecutionConfig,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Publisher name stamped on every outgoing request and event
    pub service_name: String,
    /// Queue this service consumes RPC requests from
    pub listen_queue: String,
    /// Exchange this service publishes its events to
    pub event_queue: String,
    /// Queue this service receives subscribed peer events on
    pub subscribe_queue: String,
    /// Peer event exchanges to subscribe to
    pub subscribe_targets: Vec<String>,
    /// Number of concurrent request workers
    pub worker_count: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            service_name: "queue-manager".to_string(),
            listen_queue: "bin-manager.queue-manager.request".to_string(),
            event_queue: "bin-manager.queue-manager.event".to_string(),
            subscribe_queue: "bin-manager.queue-manager.subscribe".to_string(),
            subscribe_targets: vec![
                "bin-manager.call-manager.event".to_string(),
                "bin-manager.customer-manager.event".to_string(),
            ],
            worker_count: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 5,
        }
    }
}

/// Timer settings for the self re-arming loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Re-arm delay after a successful dispatch
    pub execute_delay_ms: u64,
    /// Re-arm delay when no agent is free or a step failed
    pub execute_retry_delay_ms: u64,
    /// Delay before the first run after the loop is switched on
    pub execute_start_delay_ms: u64,
    /// Interval between queuecall health checks
    pub health_check_delay_ms: u64,
    /// Failed health checks tolerated before the queuecall is kicked
    pub health_check_max_retry: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            execute_delay_ms: 100,
            execute_retry_delay_ms: 1000,
            execute_start_delay_ms: 100,
            health_check_delay_ms: 5000,
            health_check_max_retry: 2,
        }
    }
}

impl ExecutionConfig {
    pub fn execute_delay(&self) -> Duration {
        Duration::from_millis(self.execute_delay_ms)
    }

    pub fn execute_retry_delay(&self) -> Duration {
        Duration::from_millis(self.execute_retry_delay_ms)
    }

    pub fn execute_start_delay(&self) -> Duration {
        Duration::from_millis(self.execute_start_delay_ms)
    }

    pub fn health_check_delay(&self) -> Duration {
        Duration::from_millis(self.health_check_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub json: bool,
    pub file_info: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
        }
    }
}

impl QueueManagerConfig {
    /// Load defaults, then `path` if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())
            .map_err(|e| QueueError::configuration(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("general.subscribe_targets")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| QueueError::configuration(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.service_name.is_empty() {
            return Err(QueueError::configuration("service_name must not be empty"));
        }
        if self.general.listen_queue.is_empty() {
            return Err(QueueError::configuration("listen_queue must not be empty"));
        }
        if self.general.worker_count == 0 {
            return Err(QueueError::configuration("worker_count must be greater than zero"));
        }
        if self.database.database_url.is_empty() {
            return Err(QueueError::configuration("database_url must not be empty"));
        }
        if self.database.max_connections == 0 {
            return Err(QueueError::configuration("max_connections must be greater than zero"));
        }

        let execution = &self.execution;
        if execution.execute_delay_ms == 0
            || execution.execute_retry_delay_ms == 0
            || execution.health_check_delay_ms == 0
        {
            return Err(QueueError::configuration("execution delays must be greater than zero"));
        }

        Ok(())
    }
}
