//! Error types for the Sofía intake service.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Session store errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Malformed user input. Always recovered locally by re-prompting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Could not interpret date: {0:?}")]
    UnparseableDate(String),

    #[error("Phone number too short: {digits} digits, at least {min} required")]
    PhoneTooShort { digits: usize, min: usize },
}

/// Record backend failures. A negative search or verification result is
/// not an error and never appears here.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Identity token fetch failed for audience {audience}: {reason}")]
    AuthFailure { audience: String, reason: String },

    #[error("Record backend unreachable during {operation}: {reason}")]
    Unreachable { operation: String, reason: String },

    #[error("Record backend timed out during {operation} after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("Record backend returned HTTP {status} during {operation}")]
    HttpStatus { operation: String, status: u16 },

    #[error("Record backend rejected {operation}: {message}")]
    Rejected { operation: String, message: String },

    #[error("Invalid response from record backend during {operation}: {reason}")]
    InvalidResponse { operation: String, reason: String },

    #[error("Missing required input for {operation}: {field}")]
    MissingInput { operation: String, field: String },

    #[error("Cannot create a service case without a resolved account id")]
    MissingAccount,
}

impl BackendError {
    /// Precondition faults are programming errors, not transient failures.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::MissingAccount | Self::MissingInput { .. })
    }
}

/// Transport-side errors (SMS delivery, agent forwarding).
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("Agent request failed: {0}")]
    Agent(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Session lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session bootstrap failed for {session_id}: {reason}")]
    BootstrapFailed { session_id: String, reason: String },

    #[error("Session {session_id} not found")]
    NotFound { session_id: String },

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
