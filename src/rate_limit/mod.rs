//! Politeness delays and retry timing for requests to shared external services.
//!
//! The filing archive and model providers are rate limited per host, not per
//! worker, so every request goes through one shared [`RateLimiter`].

mod limiter;

pub use limiter::{DomainStats, RateLimitConfig, RateLimiter};

use std::time::Duration;

/// Upper bound for any single backoff or Retry-After wait.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Parse a Retry-After header value (seconds).
/// Returns the duration to wait, or None if the header is missing or not numeric.
pub fn parse_retry_after(header_value: Option<&str>) -> Option<Duration> {
    let value = header_value?;
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(MAX_BACKOFF))
}

/// Exponential backoff delay for a zero-based attempt number.
pub fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    let factor = 2u64.saturating_pow(attempt);
    let delay_ms = base_ms.saturating_mul(factor);
    Duration::from_millis(delay_ms).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        assert_eq!(backoff_delay(0, 500), Duration::from_millis(500));
        assert_eq!(backoff_delay(1, 500), Duration::from_millis(1000));
        assert_eq!(backoff_delay(3, 500), Duration::from_millis(4000));
        assert_eq!(backoff_delay(40, 500), MAX_BACKOFF);
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(Some("5")), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(Some(" 7 ")), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after(Some("3600")), Some(MAX_BACKOFF));
        assert_eq!(parse_retry_after(Some("Wed, 21 Oct 2015 07:28:00 GMT")), None);
        assert_eq!(parse_retry_after(None), None);
    }
}
