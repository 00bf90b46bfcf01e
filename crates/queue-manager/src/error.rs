use thiserror::Error;

/// Error type for queue manager operations
///
/// Every handler in this crate returns [`Result`]. The variants separate
/// caller mistakes (validation, wrong state) from infrastructure failures so
/// the request bridge can map them onto response status codes, and so the
/// execution loop and health check know what is worth retrying.
#[derive(Error, Debug)]
pub enum QueueError {
    /// The request carried a value the operation does not accept
    ///
    /// # Examples
    /// - Routing method other than `random`
    /// - Malformed identifier in a request URI
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The request names a feature this service does not implement
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The record is in a status that does not allow the operation
    ///
    /// Returned when a status transition guard fails, e.g. kicking a
    /// queuecall that is already `done`.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Store failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Cache failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// A peer service answered with a failure status
    #[error("Request error: {status_code} {message}")]
    Request { status_code: u16, message: String },

    /// The message bus could not deliver a request or event
    #[error("Transport error: {0}")]
    Transport(String),

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Prefix the message with the operation that failed.
    ///
    /// The variant is kept so callers can still tell a missing record from
    /// a broken store after the error has crossed a handler boundary.
    pub fn context(self, operation: &str) -> Self {
        match self {
            Self::InvalidArgument(m) => Self::InvalidArgument(format!("{}: {}", operation, m)),
            Self::Unsupported(m) => Self::Unsupported(format!("{}: {}", operation, m)),
            Self::InvalidState(m) => Self::InvalidState(format!("{}: {}", operation, m)),
            Self::NotFound(m) => Self::NotFound(format!("{}: {}", operation, m)),
            Self::Cache(m) => Self::Cache(format!("{}: {}", operation, m)),
            Self::Request { status_code, message } => Self::Request {
                status_code,
                message: format!("{}: {}", operation, message),
            },
            Self::Transport(m) => Self::Transport(format!("{}: {}", operation, m)),
            Self::Configuration(m) => Self::Configuration(format!("{}: {}", operation, m)),
            Self::Internal(m) => Self::Internal(format!("{}: {}", operation, m)),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Status code the request bridge answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidArgument(_) | Self::Unsupported(_) | Self::InvalidState(_) => 400,
            Self::NotFound(_) => 404,
            Self::Serialization(_) => 400,
            _ => 500,
        }
    }
}

/// Result type for queue manager operations
pub type Result<T> = std::result::Result<T, QueueError>;

/// Adds operation context to a failed [`Result`].
pub trait ResultExt<T> {
    fn context(self, operation: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, operation: &str) -> Result<T> {
        self.map_err(|e| e.context(operation))
    }
}
