//! Deadline wrapper for calls that leave the process.

use std::future::Future;
use std::time::Duration;

/// Error types that can describe a call abandoned after its deadline.
pub trait TimedOut {
    fn timed_out(operation: &str, after: Duration) -> Self;
}

/// Runs `fut` with a deadline. The caller decides what a timeout fails (an
/// item, a source); it never aborts a whole pass on its own.
pub async fn bounded<T, E, F>(limit: Duration, operation: &str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: TimedOut,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(E::timed_out(operation, limit)),
    }
}
