//! Bounded retry with exponential backoff.

use std::fmt::Display;
use std::future::Future;

use tracing::warn;

use crate::rate_limit::backoff_delay;

/// Run `op` up to `max_attempts` times, sleeping `backoff_delay(attempt,
/// base_ms)` between attempts. Errors for which `is_retryable` is false are
/// returned immediately.
pub async fn retry_with_backoff<T, E, F, Fut>(
    what: &str,
    max_attempts: u32,
    base_ms: u64,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) && attempt + 1 < max_attempts => {
                let wait = backoff_delay(attempt, base_ms);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what,
                    attempt + 1,
                    max_attempts,
                    e,
                    wait
                );
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
