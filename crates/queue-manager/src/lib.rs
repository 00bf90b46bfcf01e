//! # Queue-Manager
//!
//! Call-center queue orchestration for RVoIP.
//!
//! This crate provides:
//! - Queue and queuecall records in SQLite with an in-process cache
//! - The queuecall status machine and its side effects on queues, flows and calls
//! - A self re-arming dispatch loop that hands waiting calls to free agents
//! - Health checks and wait/service timeouts driven by delayed self-requests
//! - The RPC request bridge and the peer event bridge
//!
//! ## Architecture
//!
//! Peer services (flow, call, agent and customer managers) are reached only
//! through the message bus. Every timer is a delayed request to this
//! service's own request queue, so nothing here keeps per-call tasks alive.

pub mod bus;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod listenhandler;
pub mod logging;
pub mod models;
pub mod queuecallhandler;
pub mod queuehandler;
pub mod server;
pub mod subscribehandler;
pub mod util;

#[cfg(test)]
mod testutil;

pub use config::QueueManagerConfig;
pub use error::{QueueError, Result};
pub use models::{Queue, Queuecall, QueuecallStatus};
pub use queuecallhandler::{QueuecallHandler, QueuecallHandlerImpl};
pub use queuehandler::{QueueHandler, QueueHandlerImpl};
pub use server::{QueueManagerServer, QueueManagerServerBuilder};
