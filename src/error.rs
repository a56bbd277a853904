//! Error types and the failure taxonomy for the streaming client

use std::time::SystemTime;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success status from the upstream endpoint
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Streaming error while reading the response body
    #[error("Streaming error: {0}")]
    Stream(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout error
    #[error("Request timeout")]
    Timeout,

    /// The request was cancelled through an abort handle
    #[error("Request aborted")]
    Aborted,

    /// Terminal, fully classified stream failure
    #[error(transparent)]
    Unrecoverable(ClassifiedError),

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create an API error from a status code and response body
    pub fn api_status(status: u16, message: impl Into<String>) -> Self {
        Error::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a new stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new other error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a timeout error
    pub fn timeout() -> Self {
        Error::Timeout
    }

    /// Create an aborted error
    pub fn aborted() -> Self {
        Error::Aborted
    }

    /// The classified failure carried by a terminal error, if any
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            Error::Unrecoverable(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure buckets every raw error maps into.
///
/// The enumeration is closed: classification assigns exactly one kind to
/// every failure, and retry policy is keyed on the kind alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connectivity failure (DNS, refused/reset connections, transport drops)
    Network,
    /// HTTP 429
    RateLimit,
    /// HTTP 401/403
    Auth,
    /// HTTP 5xx
    Server,
    /// Context-length / token budget exceeded
    TokenLimit,
    /// The request or a body read timed out
    Timeout,
    /// Explicit cancellation
    Aborted,
    /// Anything that matched no other bucket
    Unknown,
}

impl ErrorKind {
    /// Default retry eligibility for this kind.
    ///
    /// `Unknown` defaults to non-retryable here; the recovery policy can
    /// override that single kind via configuration.
    pub fn default_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::RateLimit | ErrorKind::Server | ErrorKind::Timeout
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Network => "network",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Auth => "auth",
            ErrorKind::Server => "server",
            ErrorKind::TokenLimit => "token_limit",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Aborted => "aborted",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A raw failure after classification.
///
/// Produced fresh per failure and never mutated afterwards. This is the
/// only error shape surfaced to callers at the end of a session: through
/// the `error` state field, the `on_error` callback, and the
/// [`Error::Unrecoverable`] return value.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    /// Which failure bucket this error fell into
    pub kind: ErrorKind,
    /// Human-readable description taken from the raw failure
    pub message: String,
    /// Whether the recovery policy may retry after this failure
    pub retryable: bool,
    /// When classification happened
    pub timestamp: SystemTime,
}

impl ClassifiedError {
    /// Build a classified error stamped with the current time
    pub fn new(kind: ErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
            timestamp: SystemTime::now(),
        }
    }
}
