//! Error types for session operations.

use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Record missing, or older than the driver's lifetime
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Encoded payload older than the codec's maximum age
    #[error("Session expired: {0}")]
    Expired(String),

    /// Filesystem or other backend I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Tampered, truncated or foreign-namespace payload
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encoding key has the wrong length
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Driver name resolved to an empty string
    #[error("Driver is not set")]
    DriverNotSet,

    /// No driver registered under the name
    #[error("Driver [{0}] not supported")]
    DriverNotSupported(String),

    /// A driver is already registered under the name
    #[error("Driver [{0}] already exists")]
    DriverExists(String),

    /// Driver registration attempted after the registry was sealed
    #[error("Driver registry is sealed; drivers must be registered before sessions are built")]
    RegistrySealed,

    /// Session shell is not bound to a driver and codec
    #[error("Session is not bound to a driver")]
    Unbound,

    /// Invalid session ID
    #[error("Invalid session ID: {0}")]
    InvalidSessionId(String),

    /// No async runtime available for background work
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl SessionError {
    /// Whether the error means "there is no usable record" rather than a
    /// backend failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::NotFound(_) | SessionError::Expired(_))
    }
}
