//! Retry of Telegram API operations.
//!
//! Calls are retried with exponential backoff and jitter. Requests are only
//! retried on transient failures (network, I/O, flood wait); file downloads
//! are retried on any failure.

use crate::config::{
    TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
};
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use teloxide::RequestError;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::{Retry, RetryIf};
use tracing::warn;

fn backoff() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter) // Add jitter to prevent thundering herd
        .take(TELEGRAM_API_MAX_RETRIES)
}

/// Whether a failed request may succeed when repeated.
#[must_use]
pub fn is_transient(error: &RequestError) -> bool {
    matches!(
        error,
        RequestError::Network(_) | RequestError::Io(_) | RequestError::RetryAfter(_)
    )
}

/// Retry a Telegram API request, giving up immediately on API errors such as
/// missing permissions.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first
/// non-transient error.
pub async fn retry_request<F, Fut, T>(operation: F) -> Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    RetryIf::start(backoff(), operation, is_transient)
        .await
        .map_err(|e| {
            if is_transient(&e) {
                warn!(
                    "Telegram API request failed after {} retries: {}",
                    TELEGRAM_API_MAX_RETRIES, e
                );
            }
            e
        })
}

/// Retry a Telegram API file operation (e.g., `get_file` + `download_file`).
///
/// # Errors
///
/// Returns the last error once retries are exhausted.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    Retry::start(backoff(), operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} retries: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use teloxide::ApiError;

    #[tokio::test(start_paused = true)]
    async fn test_api_errors_are_not_retried() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), RequestError> = retry_request(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(RequestError::Api(ApiError::MessageCantBeDeleted))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_io_errors_are_retried() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), RequestError> = retry_request(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(RequestError::Io(Arc::new(std::io::Error::other("reset"))))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), TELEGRAM_API_MAX_RETRIES + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_recovers_after_failure() -> Result<()> {
        let attempts = AtomicUsize::new(0);
        let bytes = retry_telegram_operation(|| async {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("connection reset");
            }
            Ok(vec![1u8, 2, 3])
        })
        .await?;
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        Ok(())
    }
}
