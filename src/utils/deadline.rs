//! Explicit deadlines for remote round trips.

use std::future::Future;
use std::time::Duration;

/// Await `fut`, failing with `on_timeout()` if it does not finish within `limit`.
///
/// Every call that talks to the staging area or the warehouse goes through
/// this so a stuck connection surfaces as an error instead of hanging the
/// invocation until the platform kills it.
pub async fn with_deadline<T, E, F>(
    limit: Duration,
    fut: F,
    on_timeout: impl FnOnce() -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
