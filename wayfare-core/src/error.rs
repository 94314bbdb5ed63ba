//! Error types for Wayfare operations

use thiserror::Error;

/// Faults talking to an external HTTP service (geocoder, area search).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request to {service} failed with status {status}: {message}")]
    RequestFailed {
        service: String,
        status: u16,
        message: String,
    },

    #[error("Request to {service} timed out")]
    Timeout { service: String },

    #[error("Invalid response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },
}

/// Backing key-value store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Store backend error: {reason}")]
    Backend { reason: String },

    #[error("Cache key is {len} bytes, store accepts at most {max}")]
    KeyTooLong { len: usize, max: usize },

    #[error("Chunk payload is {len} bytes, store accepts at most {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Serialization codec errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Failed to encode value: {0}")]
    Encode(String),

    #[error("Failed to decode payload: {0}")]
    Decode(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or WAYFARE_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(String),
}

/// Input validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Master error type for all Wayfare errors.
#[derive(Debug, Error)]
pub enum WayfareError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl WayfareError {
    /// True for faults coming from an external service call.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result type alias for Wayfare operations.
pub type WayfareResult<T> = Result<T, WayfareError>;

/// Result type alias for chunk store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Build a `RequestFailed` transport error.
pub fn request_failed(service: &str, status: u16, message: impl Into<String>) -> WayfareError {
    WayfareError::Transport(TransportError::RequestFailed {
        service: service.to_string(),
        status,
        message: message.into(),
    })
}

/// Build an `InvalidResponse` transport error.
pub fn invalid_response(service: &str, reason: impl Into<String>) -> WayfareError {
    WayfareError::Transport(TransportError::InvalidResponse {
        service: service.to_string(),
        reason: reason.into(),
    })
}

// =============================================================================
// TESTS
// =============================================================================
