//! Muninn error types
//!
//! Two layers:
//!
//! - [`MuninnError`]: configuration and programmer errors surfaced by
//!   constructors, config loading and cache administration. The router's
//!   `route()` never returns one.
//! - [`EngineError`]: the outcome of one failed engine attempt. Caught by
//!   the router, classified into a [`FailureCategory`], and used to decide
//!   between retrying, advancing the chain, or falling back.

use std::time::Duration;

use crate::types::FailureCategory;

/// Muninn error types
#[derive(Debug, thiserror::Error)]
pub enum MuninnError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("engine not found: {0}")]
    EngineNotFound(String),

    #[error("engine already registered: {0}")]
    DuplicateEngine(String),

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Result type alias for Muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;

/// Failure of a single engine attempt.
///
/// Adapters return these for expected failures instead of panicking; the
/// router also converts `success = false` responses into
/// [`EngineError::Unsuccessful`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// The attempt did not finish within its timeout.
    #[error("engine timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure (DNS, refused, reset).
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// The backend reports a hard outage.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Internal failure of a local engine.
    #[error("local engine failure: {0}")]
    LocalEngine(String),

    /// Retrieval of supporting context failed before the engine could answer.
    #[error("context collection failed: {0}")]
    ContextCollection(String),

    /// The engine answered but flagged the answer as unsuccessful.
    #[error("engine returned an unsuccessful response: {0}")]
    Unsuccessful(String),

    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Whether retrying the same engine may succeed.
    ///
    /// Timeouts, connection failures and rate limits are transient. Hard
    /// outages and engine-internal failures advance the chain immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Timeout(_) | EngineError::Network(_) | EngineError::RateLimited { .. }
        )
    }

    /// Backoff hint supplied by the backend, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            EngineError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Map into the fallback taxonomy.
    pub fn category(&self) -> FailureCategory {
        match self {
            EngineError::Timeout(_) | EngineError::Network(_) => FailureCategory::NetworkTimeout,
            EngineError::RateLimited { .. } => FailureCategory::RateLimitExceeded,
            EngineError::Unavailable(_) => FailureCategory::BackendUnavailable,
            EngineError::LocalEngine(_) => FailureCategory::LocalEngineFailure,
            EngineError::ContextCollection(_) => FailureCategory::ContextCollectionFailure,
            EngineError::Unsuccessful(msg) | EngineError::Other(msg) => {
                FailureCategory::classify(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(EngineError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(EngineError::Network("reset".into()).is_transient());
        assert!(EngineError::RateLimited { retry_after: None }.is_transient());
        assert!(!EngineError::Unavailable("down".into()).is_transient());
        assert!(!EngineError::LocalEngine("panic".into()).is_transient());
        assert!(!EngineError::Unsuccessful("empty".into()).is_transient());
    }

    #[test]
    fn retry_after_only_for_rate_limits() {
        let hint = Duration::from_secs(3);
        assert_eq!(
            EngineError::RateLimited {
                retry_after: Some(hint)
            }
            .retry_after(),
            Some(hint)
        );
        assert_eq!(EngineError::Network("x".into()).retry_after(), None);
    }

    #[test]
    fn category_mapping() {
        assert_eq!(
            EngineError::Timeout(Duration::from_millis(10)).category(),
            FailureCategory::NetworkTimeout
        );
        assert_eq!(
            EngineError::RateLimited { retry_after: None }.category(),
            FailureCategory::RateLimitExceeded
        );
        assert_eq!(
            EngineError::Unavailable("503".into()).category(),
            FailureCategory::BackendUnavailable
        );
        assert_eq!(
            EngineError::ContextCollection("metrics feed".into()).category(),
            FailureCategory::ContextCollectionFailure
        );
        assert_eq!(
            EngineError::Other("something odd".into()).category(),
            FailureCategory::Unknown
        );
    }

    #[test]
    fn display_includes_detail() {
        let err = MuninnError::EngineNotFound("local-rag".into());
        assert!(err.to_string().contains("local-rag"));
    }
}
