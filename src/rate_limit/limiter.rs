//! Adaptive per-domain rate limiter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// Configuration for rate limiting behavior.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Base delay between requests to the same domain.
    pub base_delay: Duration,
    /// Maximum delay (ceiling for backoff).
    pub max_delay: Duration,
    /// Multiplier for exponential backoff on rate limit.
    pub backoff_multiplier: f64,
    /// Multiplier for recovery on success (< 1.0 to decrease delay).
    pub recovery_multiplier: f64,
    /// Number of consecutive successes before reducing delay.
    pub recovery_threshold: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(150),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            recovery_multiplier: 0.8,
            recovery_threshold: 5,
        }
    }
}

impl RateLimitConfig {
    pub fn with_base_delay(base_delay: Duration) -> Self {
        Self {
            base_delay,
            ..Self::default()
        }
    }
}

/// Statistics for a domain.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainStats {
    pub current_delay: Duration,
    pub in_backoff: bool,
    pub total_requests: u64,
    pub rate_limit_hits: u64,
}

#[derive(Debug)]
struct DomainEntry {
    current_delay_ms: u64,
    next_slot: Option<Instant>,
    consecutive_successes: u32,
    in_backoff: bool,
    total_requests: u64,
    rate_limit_hits: u64,
}

impl DomainEntry {
    fn new(base_delay_ms: u64) -> Self {
        Self {
            current_delay_ms: base_delay_ms,
            next_slot: None,
            consecutive_successes: 0,
            in_backoff: false,
            total_requests: 0,
            rate_limit_hits: 0,
        }
    }

    fn stats(&self) -> DomainStats {
        DomainStats {
            current_delay: Duration::from_millis(self.current_delay_ms),
            in_backoff: self.in_backoff,
            total_requests: self.total_requests,
            rate_limit_hits: self.rate_limit_hits,
        }
    }
}

/// Adaptive rate limiter that spaces requests to each domain.
///
/// Cloning shares state, so every worker holding a clone is throttled
/// against the same per-domain schedule.
#[derive(Clone)]
pub struct RateLimiter {
    domains: Arc<Mutex<HashMap<String, DomainEntry>>>,
    config: RateLimitConfig,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            domains: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// Extract domain from URL.
    pub fn extract_domain(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|s| s.to_string()))
    }

    fn base_delay_ms(&self) -> u64 {
        self.config.base_delay.as_millis() as u64
    }

    /// Wait until the domain is ready, then reserve the next request slot.
    /// Returns the domain name, or None for URLs without a host.
    pub async fn acquire(&self, url: &str) -> Option<String> {
        let domain = Self::extract_domain(url)?;
        let base_delay_ms = self.base_delay_ms();

        // Reserve a slot under the lock, sleep outside it.
        let wait_time = {
            let mut domains = self.domains.lock().await;
            let entry = domains
                .entry(domain.clone())
                .or_insert_with(|| DomainEntry::new(base_delay_ms));
            let now = Instant::now();
            let slot = match entry.next_slot {
                Some(next) if next > now => next,
                _ => now,
            };
            entry.next_slot = Some(slot + Duration::from_millis(entry.current_delay_ms));
            entry.total_requests += 1;
            slot.saturating_duration_since(now)
        };

        if wait_time > Duration::ZERO {
            debug!("Rate limiting {}: waiting {:?}", domain, wait_time);
            tokio::time::sleep(wait_time).await;
        }
        Some(domain)
    }

    /// Check if a status code is a rate limit signal.
    pub fn is_rate_limit(status_code: u16) -> bool {
        matches!(status_code, 429 | 503)
    }

    /// Report a successful request - may decrease delay.
    pub async fn report_success(&self, domain: &str) {
        let base_delay_ms = self.base_delay_ms();
        let mut domains = self.domains.lock().await;
        let entry = domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainEntry::new(base_delay_ms));
        entry.consecutive_successes += 1;

        if entry.in_backoff && entry.consecutive_successes >= self.config.recovery_threshold {
            let new_delay_ms =
                (entry.current_delay_ms as f64 * self.config.recovery_multiplier) as u64;
            if new_delay_ms <= base_delay_ms {
                entry.in_backoff = false;
                entry.current_delay_ms = base_delay_ms;
                info!("Domain {} recovered from rate limit backoff", domain);
            } else {
                entry.current_delay_ms = new_delay_ms;
                debug!("Domain {} delay reduced to {}ms", domain, new_delay_ms);
            }
            entry.consecutive_successes = 0;
        }
    }

    /// Report a rate limit hit (429, 503, or a 403 used as throttling) - increases delay.
    pub async fn report_rate_limit(&self, domain: &str, status_code: u16) {
        let base_delay_ms = self.base_delay_ms();
        let max_delay_ms = self.config.max_delay.as_millis() as u64;
        let mut domains = self.domains.lock().await;
        let entry = domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainEntry::new(base_delay_ms));
        entry.rate_limit_hits += 1;
        entry.consecutive_successes = 0;
        entry.in_backoff = true;

        let new_delay_ms =
            (entry.current_delay_ms.max(1) as f64 * self.config.backoff_multiplier) as u64;
        entry.current_delay_ms = new_delay_ms.min(max_delay_ms);

        warn!(
            "Rate limited by {} (HTTP {}), backing off to {}ms",
            domain, status_code, entry.current_delay_ms
        );
    }

    /// Report a server error (5xx other than 503) - resets the success streak only.
    pub async fn report_server_error(&self, domain: &str) {
        let mut domains = self.domains.lock().await;
        if let Some(entry) = domains.get_mut(domain) {
            entry.consecutive_successes = 0;
        }
    }

    /// Current statistics for a domain, if it has been seen.
    pub async fn stats(&self, domain: &str) -> Option<DomainStats> {
        let domains = self.domains.lock().await;
        domains.get(domain).map(DomainEntry::stats)
    }
}
