//! Cancellation helpers.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::IndexingError;

/// Await `fut`, or return [`IndexingError::Cancelled`] as soon as `token` fires.
///
/// Cancellation wins when both are ready.
pub async fn or_cancelled<T, E, F>(token: &CancellationToken, fut: F) -> Result<T, IndexingError>
where
    F: Future<Output = Result<T, E>>,
    IndexingError: From<E>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(IndexingError::Cancelled),
        result = fut => result.map_err(IndexingError::from),
    }
}

/// Sleep for `duration` unless cancelled first.
///
/// Returns `false` when the sleep was interrupted.
pub async fn sleep_or_cancelled(token: &CancellationToken, duration: std::time::Duration) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
