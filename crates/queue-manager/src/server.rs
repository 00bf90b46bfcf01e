//! # Queue Manager Server
//!
//! Wires the store, the message bus and the handlers into one running
//! service and owns its start/stop lifecycle.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           QueueManagerServer            │
//! ├─────────────────────────────────────────┤
//! │  ListenHandler   │  SubscribeHandler    │
//! ├─────────────────────────────────────────┤
//! │  QueueHandler    │  QueuecallHandler    │
//! ├─────────────────────────────────────────┤
//! │  Database + Cache │ Request/Notify      │
//! ├─────────────────────────────────────────┤
//! │            LocalTransport               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use rvoip_queue_manager::config::QueueManagerConfig;
//! use rvoip_queue_manager::server::QueueManagerServerBuilder;
//!
//! # async fn example() -> rvoip_queue_manager::error::Result<()> {
//! let mut server = QueueManagerServerBuilder::new()
//!     .with_config(QueueManagerConfig::default())
//!     .with_in_memory_database()
//!     .build()
//!     .await?;
//!
//! server.start().await?;
//! // ...
//! server.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::bus::{
    BusNotifyHandler, BusRequestHandler, LocalTransport, NotifyHandler, RequestHandler, Transport,
};
use crate::cache::MemoryCache;
use crate::config::QueueManagerConfig;
use crate::database::{Database, SqliteDatabase};
use crate::error::{QueueError, Result};
use crate::listenhandler::ListenHandler;
use crate::queuecallhandler::{QueuecallHandler, QueuecallHandlerImpl};
use crate::queuehandler::{QueueHandler, QueueHandlerImpl};
use crate::subscribehandler::SubscribeHandler;
use crate::util::SystemClock;

/// The queue manager service: handlers bound to a transport.
pub struct QueueManagerServer {
    config: QueueManagerConfig,
    transport: Arc<LocalTransport>,
    queue_handler: Arc<dyn QueueHandler>,
    queuecall_handler: Arc<dyn QueuecallHandler>,
    listen_handle: Option<JoinHandle<()>>,
    subscribe_handle: Option<JoinHandle<()>>,
}

impl QueueManagerServer {
    /// Build the service on its own in-process transport.
    pub async fn new(config: QueueManagerConfig) -> Result<Self> {
        Self::with_transport(config, Arc::new(LocalTransport::new())).await
    }

    /// Build the service on a transport shared with peer services.
    pub async fn with_transport(
        config: QueueManagerConfig,
        transport: Arc<LocalTransport>,
    ) -> Result<Self> {
        config.validate()?;
        info!("Creating queue manager. service: {}", config.general.service_name);

        let cache = Arc::new(MemoryCache::new());
        let db: Arc<dyn Database> = Arc::new(
            SqliteDatabase::new(
                &config.database.database_url,
                config.database.max_connections,
                cache,
            )
            .await?,
        );

        let bus: Arc<dyn Transport> = transport.clone();
        let req: Arc<dyn RequestHandler> = Arc::new(BusRequestHandler::new(
            bus.clone(),
            config.general.service_name.clone(),
            config.general.listen_queue.clone(),
        ));
        let notify: Arc<dyn NotifyHandler> = Arc::new(BusNotifyHandler::new(
            bus,
            config.general.service_name.clone(),
            config.general.event_queue.clone(),
        ));

        let queue_handler: Arc<dyn QueueHandler> = Arc::new(QueueHandlerImpl::new(
            db.clone(),
            req.clone(),
            notify.clone(),
            config.execution.clone(),
        ));
        let queuecall_handler: Arc<dyn QueuecallHandler> = Arc::new(QueuecallHandlerImpl::new(
            db,
            req,
            notify,
            queue_handler.clone(),
            Arc::new(SystemClock),
            config.execution.clone(),
        ));

        Ok(Self {
            config,
            transport,
            queue_handler,
            queuecall_handler,
            listen_handle: None,
            subscribe_handle: None,
        })
    }

    /// Start consuming requests and subscribed events.
    pub async fn start(&mut self) -> Result<()> {
        if self.listen_handle.is_some() {
            return Err(QueueError::invalid_state("queue manager is already running"));
        }

        let general = &self.config.general;
        let listen = Arc::new(ListenHandler::new(
            self.queue_handler.clone(),
            self.queuecall_handler.clone(),
        ));
        self.listen_handle = Some(self.transport.consume_rpc(
            &general.listen_queue,
            listen,
            general.worker_count,
        ));
        info!("Listening for requests. queue: {}", general.listen_queue);

        let subscribe = Arc::new(SubscribeHandler::new(
            self.queue_handler.clone(),
            self.queuecall_handler.clone(),
        ));
        self.subscribe_handle = Some(self.transport.subscribe(
            &general.subscribe_targets,
            subscribe,
            general.worker_count,
        ));
        info!(
            "Subscribed to peer events. queue: {}, targets: {:?}",
            general.subscribe_queue, general.subscribe_targets
        );

        Ok(())
    }

    /// Stop consumers. Pending timers are dropped with the transport.
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping queue manager...");
        self.transport.shutdown();

        for handle in [self.listen_handle.take(), self.subscribe_handle.take()]
            .into_iter()
            .flatten()
        {
            let _ = handle.await;
        }

        info!("Queue manager stopped");
        Ok(())
    }

    pub fn config(&self) -> &QueueManagerConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<LocalTransport> {
        &self.transport
    }

    pub fn queue_handler(&self) -> &Arc<dyn QueueHandler> {
        &self.queue_handler
    }

    pub fn queuecall_handler(&self) -> &Arc<dyn QueuecallHandler> {
        &self.queuecall_handler
    }
}

/// Builder for [`QueueManagerServer`].
pub struct QueueManagerServerBuilder {
    config: Option<QueueManagerConfig>,
    database_url: Option<String>,
    transport: Option<Arc<LocalTransport>>,
}

impl QueueManagerServerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            database_url: None,
            transport: None,
        }
    }

    pub fn with_config(mut self, config: QueueManagerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the configured database location.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_in_memory_database(mut self) -> Self {
        self.database_url = Some("sqlite::memory:".to_string());
        self
    }

    /// Share a transport with peer services in the same process.
    pub fn with_transport(mut self, transport: Arc<LocalTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub async fn build(self) -> Result<QueueManagerServer> {
        let mut config = self
            .config
            .ok_or_else(|| QueueError::configuration("Configuration not provided"))?;
        if let Some(url) = self.database_url {
            config.database.database_url = url;
        }

        match self.transport {
            Some(transport) => QueueManagerServer::with_transport(config, transport).await,
            None => QueueManagerServer::new(config).await,
        }
    }
}

impl Default for QueueManagerServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
