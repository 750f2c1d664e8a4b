//! Error types for the Headcount estimation core.
//!
//! Backend failures are kept apart from the top-level error: they
//! never escape an adapter call and are only carried for logging inside
//! [`BackendOutcome::Unavailable`](crate::backend::BackendOutcome).

use thiserror::Error;

/// Top-level error type for Headcount operations.
#[derive(Error, Debug)]
pub enum HeadcountError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persistence errors from an update sink
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Why a backend could not produce a count.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend's credential pool had no usable entry
    #[error("{backend}: no credential configured")]
    MissingCredential { backend: String },

    /// Transport failure or non-success HTTP status
    #[error("{backend}: {message}")]
    Http {
        backend: String,
        message: String,
        status_code: Option<u16>,
    },

    /// The call did not finish within the adapter's bound
    #[error("{backend}: timed out after {timeout_ms}ms")]
    Timeout { backend: String, timeout_ms: u64 },

    /// The response body could not be interpreted as a count
    #[error("{backend}: unparseable response: {message}")]
    Parse { backend: String, message: String },

    /// The backend answered with an error-shaped payload
    #[error("{backend}: API error: {message}")]
    Api { backend: String, message: String },

    /// The task running the adapter panicked or was aborted
    #[error("{backend}: task failed: {message}")]
    TaskFailed { backend: String, message: String },
}

/// Update sink errors.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Transport failure or non-success HTTP status from the store
    #[error("Store request failed: {message}")]
    Http {
        message: String,
        status_code: Option<u16>,
    },

    /// The store accepted the request but reported a failed write
    #[error("Store rejected write: {0}")]
    Rejected(String),

    /// Subject identifier cannot be used as a record key
    #[error("Invalid subject id {0:?}")]
    InvalidSubject(String),

    /// No access token could be obtained for the store
    #[error("Store authentication failed: {0}")]
    Auth(String),

    /// The sink is missing a required setting
    #[error("Sink not configured: {0}")]
    NotConfigured(String),
}

/// Convenience type alias for Headcount results.
pub type Result<T> = std::result::Result<T, HeadcountError>;
