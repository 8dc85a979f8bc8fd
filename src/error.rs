//! Service and provider error types.
//!
//! Provider failures carry a closed [`ProviderErrorKind`] tag so the retry
//! policy can match on the tag set instead of inspecting error text or
//! downcasting. [`ServiceError`] is the request-level taxonomy the HTTP
//! layer maps to status codes.

use std::fmt;

/// Classification of a model-provider failure.
///
/// Everything except `Other` is transient and eligible for retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    RateLimited,
    Timeout,
    ConnectionFailed,
    ServerError,
    /// Non-retryable: client errors, malformed responses, bad configuration.
    Other,
}

/// An error returned by an embedding or completion provider call.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::ConnectionFailed, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::ServerError, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Other, message)
    }

    /// Whether the retry policy should attempt this call again.
    pub fn is_transient(&self) -> bool {
        self.kind != ProviderErrorKind::Other
    }

    /// Classify a transport-level `reqwest` failure.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else if err.is_connect() {
            Self::connection_failed(err.to_string())
        } else {
            Self::connection_failed(err.to_string())
        }
    }

    /// Classify a non-success HTTP status from a provider.
    ///
    /// 429 and 5xx are transient; any other status is terminal.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status.as_u16() == 429 {
            Self::rate_limited(format!("provider returned 429: {}", body))
        } else if status.is_server_error() {
            Self::server_error(format!("provider returned {}: {}", status, body))
        } else {
            Self::other(format!("provider returned {}: {}", status, body))
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ProviderErrorKind::RateLimited => "rate limited",
            ProviderErrorKind::Timeout => "timeout",
            ProviderErrorKind::ConnectionFailed => "connection failed",
            ProviderErrorKind::ServerError => "server error",
            ProviderErrorKind::Other => "provider error",
        };
        write!(f, "{}: {}", kind, self.message)
    }
}

impl std::error::Error for ProviderError {}

/// Request-level failure taxonomy.
///
/// The HTTP layer maps each variant to a status code; streaming responses
/// report the same failures as in-band `error` events instead.
#[derive(Debug)]
pub enum ServiceError {
    /// Fatal misconfiguration detected at startup (missing key, missing corpus).
    Config(String),
    /// Malformed request — surfaced as 400 with field detail.
    Validation(String),
    /// Vector store empty or unreachable — 503.
    IndexUnavailable(String),
    /// Provider failure, after retry exhaustion or immediately when fatal — 503.
    Provider(ProviderError),
    /// Missing or invalid document path — 404. Traversal attempts are
    /// indistinguishable from not-found to the caller.
    NotFound,
    Internal(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Config(msg) => write!(f, "configuration error: {}", msg),
            ServiceError::Validation(msg) => write!(f, "{}", msg),
            ServiceError::IndexUnavailable(msg) => write!(f, "{}", msg),
            ServiceError::Provider(err) => write!(f, "LLM request failed: {}", err),
            ServiceError::NotFound => write!(f, "Not found"),
            ServiceError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<ProviderError> for ServiceError {
    fn from(err: ProviderError) -> Self {
        ServiceError::Provider(err)
    }
}
