// Error model for the indexing and hybrid-search core: a `#[source]`-
// carrying enum plus an `ErrorContext` extension trait, covering the eight
// kinds this domain actually raises.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

/// Top-level error type for the indexing and hybrid-search core.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid parameters: {message}")]
    InvalidParams { message: String },

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("configuration invalid: {message}")]
    ConfigValidation { message: String },

    #[error("backend unavailable: {backend}: {message}")]
    BackendUnavailable {
        backend: String,
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    #[error("already running: {project_id}")]
    AlreadyRunning { project_id: String },

    #[error("parse error in {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl From<io::Error> for IndexError {
    fn from(err: io::Error) -> Self {
        IndexError::Internal {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<anyhow::Error> for IndexError {
    fn from(err: anyhow::Error) -> Self {
        IndexError::Internal {
            message: err.to_string(),
            source: None,
        }
    }
}

/// Extension trait for attaching context to a `Result` as it propagates.
pub trait ErrorContext<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| IndexError::Internal {
            message: format!("{}: {}", context, e),
            source: None,
        })
    }
}

/// Whether an error is worth retrying at the adapter boundary (vector-store
/// connect, embedder batch call). Used by `retry_with_backoff`.
pub fn is_retryable(error: &IndexError) -> bool {
    matches!(error, IndexError::BackendUnavailable { .. })
}

/// Maximum number of retry attempts (after the initial try) made by
/// `retry_with_backoff` and `SledVectorStore::open`, regardless of how much
/// of `max_elapsed`/`max_elapsed_time` remains.
pub const MAX_RETRIES: u32 = 3;

/// Builds the backoff policy shared by `retry_with_backoff` and
/// `SledVectorStore::open`: 1s initial interval, doubling, capped at 10s,
/// bounded overall by `max_elapsed`.
pub fn backend_backoff(max_elapsed: Duration) -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_secs(1),
        multiplier: 2.0,
        max_interval: Duration::from_secs(10),
        max_elapsed_time: Some(max_elapsed),
        ..ExponentialBackoff::default()
    }
}

/// Retries `operation` with exponential backoff while its error is
/// `is_retryable`, giving up once `max_elapsed` has passed, `MAX_RETRIES`
/// attempts have been made, or a non-retryable error is returned.
pub async fn retry_with_backoff<F, Fut, T>(max_elapsed: Duration, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = backend_backoff(max_elapsed);
    let mut retries = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) && retries < MAX_RETRIES => match backoff.next_backoff() {
                Some(delay) => {
                    retries += 1;
                    log::warn!("retrying after backend error ({}/{}): {}", retries, MAX_RETRIES, err);
                    tokio::time::sleep(delay).await;
                }
                None => return Err(err),
            },
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_becomes_internal() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: IndexError = io_err.into();
        assert!(matches!(err, IndexError::Internal { .. }));
    }

    #[test]
    fn context_wraps_message() {
        let result: std::result::Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::Other, "boom"));
        let wrapped = result.context("loading project");
        assert!(wrapped.is_err());
        assert!(wrapped.unwrap_err().to_string().contains("loading project"));
    }

    #[test]
    fn retryable_classification() {
        let retryable = IndexError::BackendUnavailable {
            backend: "vector-store".into(),
            message: "timeout".into(),
            source: None,
        };
        assert!(is_retryable(&retryable));
        assert!(!is_retryable(&IndexError::Cancelled { operation: "x".into() }));
    }

    #[tokio::test]
    async fn retry_with_backoff_gives_up_on_non_retryable_error() {
        let result: Result<()> = retry_with_backoff(Duration::from_millis(50), || async {
            Err(IndexError::InvalidParams { message: "bad".into() })
        })
        .await;
        assert!(matches!(result, Err(IndexError::InvalidParams { .. })));
    }

    #[tokio::test]
    async fn retry_with_backoff_returns_first_success() {
        let result = retry_with_backoff(Duration::from_millis(50), || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
