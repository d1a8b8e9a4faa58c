//! Catalog client error types.
//!
//! Error definitions with a transient/permanent classification consumed by
//! the retry layer: transient failures (network, rate limit, server side)
//! are retried with backoff, permanent ones are surfaced immediately.

use thiserror::Error;

/// Error that can occur while talking to the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog could not be reached (connect failure, DNS, broken
    /// transport).
    #[error("catalog unreachable: {message}")]
    Unreachable { message: String },

    /// The request timed out.
    #[error("catalog request timed out: {message}")]
    Timeout { message: String },

    /// The catalog asked us to slow down (HTTP 429).
    #[error("rate limited by catalog")]
    RateLimited {
        /// Parsed `Retry-After` header, if the catalog sent one.
        retry_after_secs: Option<u64>,
    },

    /// Credentials were rejected (HTTP 401).
    #[error("authentication failed: catalog rejected the credentials")]
    AuthFailed,

    /// The authenticated principal may not perform this operation
    /// (HTTP 403).
    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    /// The addressed organization or member does not exist (HTTP 404).
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Any other API-level failure; `status >= 500` counts as transient.
    #[error("catalog API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The client was constructed with unusable configuration.
    #[error("invalid client configuration: {message}")]
    InvalidConfig { message: String },

    /// The response body could not be decoded.
    #[error("failed to decode catalog response: {message}")]
    Serialization { message: String },

    /// Emitted by the retry layer after exhausting its attempts.
    #[error("{message}")]
    MaxRetriesExceeded { attempts: u32, message: String },
}

impl CatalogError {
    /// Whether the failure may resolve itself and the call should be
    /// retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CatalogError::Unreachable { .. }
                | CatalogError::Timeout { .. }
                | CatalogError::RateLimited { .. }
        ) || self.is_server_error()
    }

    /// Whether this is a server-side (5xx) API error.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, CatalogError::Api { status, .. } if *status >= 500)
    }

    /// Stable code for classification in results and audit records.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            CatalogError::Unreachable { .. } => "UNREACHABLE",
            CatalogError::Timeout { .. } => "TIMEOUT",
            CatalogError::RateLimited { .. } => "RATE_LIMITED",
            CatalogError::AuthFailed => "AUTH_FAILED",
            CatalogError::PermissionDenied { .. } => "PERMISSION_DENIED",
            CatalogError::NotFound { .. } => "NOT_FOUND",
            CatalogError::Api { status, .. } if *status >= 500 => "SERVER_ERROR",
            CatalogError::Api { .. } => "API_ERROR",
            CatalogError::InvalidConfig { .. } => "INVALID_CONFIG",
            CatalogError::Serialization { .. } => "SERIALIZATION_ERROR",
            CatalogError::MaxRetriesExceeded { .. } => "MAX_RETRIES_EXCEEDED",
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CatalogError::Timeout {
                message: err.to_string(),
            }
        } else if err.is_decode() {
            CatalogError::Serialization {
                message: err.to_string(),
            }
        } else {
            CatalogError::Unreachable {
                message: err.to_string(),
            }
        }
    }
}

/// Result type for catalog client operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
