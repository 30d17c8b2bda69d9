//! HTTP error types

use pacer_config::ConfigError;
use pacer_resilience::Retryable;
use reqwest::StatusCode;
use std::time::Duration;

/// Error type for HTTP operations
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Rate limited (HTTP {status}), resume in {resume_hint:?}")]
    RateLimited {
        status: StatusCode,
        resume_hint: Option<Duration>,
    },

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

impl HttpError {
    /// Status code of the response that caused this error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::RateLimited { status, .. } | HttpError::Status { status, .. } => {
                Some(*status)
            }
            HttpError::NetworkError(error) => error.status(),
            HttpError::ConfigError(_) => None,
        }
    }
}

impl Retryable for HttpError {
    /// Transport failures, timeouts, 5xx and rate limits are retryable;
    /// other client errors and malformed requests are not
    fn is_retryable(&self) -> bool {
        match self {
            HttpError::NetworkError(error) => !error.is_builder(),
            HttpError::RateLimited { .. } => true,
            HttpError::Status { status, .. } => {
                !status.is_client_error() || *status == StatusCode::REQUEST_TIMEOUT
            }
            HttpError::ConfigError(_) => false,
        }
    }

    fn is_rate_limited(&self) -> bool {
        matches!(self, HttpError::RateLimited { .. })
    }

    fn retry_delay(&self) -> Option<Duration> {
        match self {
            HttpError::RateLimited { resume_hint, .. } => *resume_hint,
            _ => None,
        }
    }
}

/// Default fatal predicate: anything that retrying cannot fix
pub fn is_fatal_by_default(error: &HttpError) -> bool {
    !error.is_retryable()
}
