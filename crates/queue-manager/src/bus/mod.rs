//! # Message Bus
//!
//! Wire types and the seams the queue core talks through:
//!
//! - [`Transport`] moves requests, delayed requests and events between
//!   services. [`LocalTransport`] is the in-process implementation.
//! - [`RequestHandler`] is the typed RPC client for peer services and for
//!   this service's own delayed self-requests (every timer in the core).
//! - [`NotifyHandler`] publishes this service's events.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{QueueError, Result};

pub mod notifyhandler;
pub mod requesthandler;
pub mod transport;

pub use notifyhandler::{BusNotifyHandler, NotifyHandler};
pub use requesthandler::{BusRequestHandler, RequestHandler};
pub use transport::{EventHandler, LocalTransport, RpcHandler, Transport};

pub const DATA_TYPE_JSON: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// RPC request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub uri: String,
    pub method: Method,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Request {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            method,
            publisher: String::new(),
            data_type: String::new(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_json<T: Serialize>(mut self, data: &T) -> Result<Self> {
        self.data_type = DATA_TYPE_JSON.to_string();
        self.data = serde_json::to_value(data)?;
        Ok(self)
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = publisher.into();
        self
    }

    /// Decode the body. A missing body decodes as `T::default()`.
    pub fn parse_data<T: DeserializeOwned + Default>(&self) -> Result<T> {
        if self.data.is_null() {
            return Ok(T::default());
        }
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status_code: u16,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            status_code: 200,
            data_type: String::new(),
            data: serde_json::Value::Null,
        }
    }

    pub fn json<T: Serialize>(data: &T) -> Result<Self> {
        Ok(Self {
            status_code: 200,
            data_type: DATA_TYPE_JSON.to_string(),
            data: serde_json::to_value(data)?,
        })
    }

    pub fn error(status_code: u16) -> Self {
        Self {
            status_code,
            data_type: String::new(),
            data: serde_json::Value::Null,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Decode the body of a successful response.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T> {
        self.ensure_success()?;
        Ok(serde_json::from_value(self.data)?)
    }

    pub fn ensure_success(&self) -> Result<()> {
        if !self.is_success() {
            return Err(QueueError::Request {
                status_code: self.status_code,
                message: self.data.to_string(),
            });
        }
        Ok(())
    }
}

/// Published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub publisher: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Event {
    pub fn new<T: Serialize>(
        publisher: impl Into<String>,
        event_type: impl Into<String>,
        data: &T,
    ) -> Result<Self> {
        Ok(Self {
            publisher: publisher.into(),
            event_type: event_type.into(),
            data_type: DATA_TYPE_JSON.to_string(),
            data: serde_json::to_value(data)?,
        })
    }

    pub fn parse_data<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}
