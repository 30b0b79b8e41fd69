//! Concurrent batch execution with per-item deadlines.
//!
//! Every item runs as its own tokio task. The batch resolves once every item
//! has either finished or hit its deadline, and results keep input order.
//!
//! A timed-out item is detached rather than cancelled: the task keeps
//! running to completion and its side effects (such as a cache insert) still
//! land, only its result is discarded. Upstream requests carry their own
//! transport timeout, which bounds how long detached work can live.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;

use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("item did not settle within {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    #[error("item task aborted: {0}")]
    Aborted(String),
}

impl From<BatchError> for Error {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::TimedOut { timeout_ms } => Error::Timeout { timeout_ms },
            BatchError::Aborted(msg) => Error::Internal(msg),
        }
    }
}

/// Run every future concurrently, each bounded by `per_item_timeout`.
///
/// The returned vector has one slot per input, in input order.
pub async fn run_batch<I, F, T>(items: I, per_item_timeout: Duration) -> Vec<Result<T, BatchError>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let timeout_ms = u64::try_from(per_item_timeout.as_millis()).unwrap_or(u64::MAX);

    let slots: Vec<_> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let handle = tokio::spawn(item);
            async move {
                match tokio::time::timeout(per_item_timeout, handle).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(join_err)) => {
                        tracing::warn!(index, error = %join_err, "batch item task failed");
                        Err(BatchError::Aborted(join_err.to_string()))
                    }
                    Err(_) => {
                        tracing::warn!(index, timeout_ms, "batch item timed out");
                        Err(BatchError::TimedOut { timeout_ms })
                    }
                }
            }
        })
        .collect();

    join_all(slots).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_results_keep_input_order() {
        let items = [300u64, 100, 200].map(|delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            delay
        });

        let results = run_batch(items, Duration::from_secs(1)).await;
        assert_eq!(results, vec![Ok(300), Ok(100), Ok(200)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_item_times_out_alone() {
        let items: Vec<std::pin::Pin<Box<dyn Future<Output = &'static str> + Send>>> = vec![
            Box::pin(async { "a" }),
            Box::pin(std::future::pending()),
            Box::pin(async { "c" }),
        ];

        let results = run_batch(items, Duration::from_millis(100)).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Ok("a"));
        assert_eq!(results[1], Err(BatchError::TimedOut { timeout_ms: 100 }));
        assert_eq!(results[2], Ok("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_item_keeps_running() {
        let landed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&landed);

        let item = async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            flag.store(true, Ordering::SeqCst);
        };

        let results = run_batch([item], Duration::from_millis(100)).await;
        assert!(matches!(results[0], Err(BatchError::TimedOut { .. })));
        assert!(!landed.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(landed.load(Ordering::SeqCst));
    }

    async fn explode() -> u8 {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_panicking_item_is_aborted() {
        let items: Vec<std::pin::Pin<Box<dyn Future<Output = u8> + Send>>> =
            vec![Box::pin(async { 1 }), Box::pin(explode())];

        let results = run_batch(items, Duration::from_secs(5)).await;
        assert_eq!(results[0], Ok(1));
        assert!(matches!(results[1], Err(BatchError::Aborted(_))));
    }

    #[test]
    fn test_batch_error_into_error() {
        let err: Error = BatchError::TimedOut { timeout_ms: 50_000 }.into();
        assert_eq!(err.message(), "Request timed out after 50 seconds");
        assert_eq!(err.kind(), "TimeoutError");
    }
}
