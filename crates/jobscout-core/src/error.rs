use std::time::Duration;

use thiserror::Error;

use crate::models::{FetchErrorKind, SourceId};

/// Application-wide error types for jobscout.
#[derive(Error, Debug)]
pub enum AppError {
    /// A query named a source with no registered fetcher.
    #[error("No fetcher registered for source '{0}'")]
    UnknownSource(SourceId),

    /// Caller-supplied configuration is unusable (missing credentials, bad URL, ...).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Scoring weights do not sum to 1.0.
    #[error("Scoring weights must be non-negative and sum to 1.0 (got {sum:.4})")]
    WeightInvariant { sum: f64 },

    /// HTTP exchange failed in a way none of the typed variants describe.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request or source timed out.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The source signalled throttling or anti-automation.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Response did not have the structure the fetcher expects.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Classify this error for reporting in a `FetchError`.
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            AppError::Timeout(_) => FetchErrorKind::Timeout,
            AppError::RateLimited(_) => FetchErrorKind::RateLimited,
            AppError::NetworkError(_) => FetchErrorKind::NetworkError,
            AppError::ParseError(_) | AppError::SerializationError(_) => {
                FetchErrorKind::ParseError
            }
            AppError::InvalidConfig(_)
            | AppError::UnknownSource(_)
            | AppError::WeightInvariant { .. } => FetchErrorKind::InvalidConfig,
            AppError::HttpError(_) | AppError::Generic(_) => FetchErrorKind::GenericFailure,
        }
    }

    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
