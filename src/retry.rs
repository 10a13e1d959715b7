//! Bounded backoff for idempotent external calls.
//!
//! Only reads go through this (label fetches); issue creation is never
//! retried, so a flaky tracker cannot produce duplicate items.

use std::time::Duration;
use tracing::warn;

/// Run `op` up to `attempts` times, doubling the wait after each failure,
/// starting from `base_delay`. Returns the first success or the last error.
pub async fn with_backoff<F, Fut, T, E>(attempts: u32, base_delay: Duration, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    debug_assert!(attempts > 0);
    let mut delay = base_delay;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(attempt, "retryable call failed: {e}");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
