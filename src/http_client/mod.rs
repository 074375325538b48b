//! Rate-limited HTTP client shared by the filing source and model backends.

mod response;
mod user_agent;

pub use response::HttpResponse;
pub use user_agent::{UserAgentPool, USER_AGENT};

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::header::USER_AGENT as USER_AGENT_HEADER;
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;

use crate::rate_limit::{RateLimitConfig, RateLimiter};

fn extract_response_headers(response: &Response) -> HashMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect()
}

/// Builder for constructing `HttpClient` with optional configuration.
pub struct HttpClientBuilder {
    source_id: String,
    timeout: Duration,
    request_delay: Duration,
    user_agents: Option<UserAgentPool>,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClientBuilder {
    /// Set the contact user agents rotated across attempts.
    pub fn user_agents(mut self, pool: UserAgentPool) -> Self {
        self.user_agents = Some(pool);
        self
    }

    /// Set a shared rate limiter.
    /// Without this, creates a per-client limiter using `request_delay`.
    pub fn rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        let client = Client::builder()
            .timeout(self.timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        let rate_limiter = self.rate_limiter.unwrap_or_else(|| {
            RateLimiter::new(RateLimitConfig::with_base_delay(self.request_delay))
        });

        Ok(HttpClient {
            client,
            source_id: self.source_id,
            user_agents: self.user_agents.unwrap_or_default(),
            rate_limiter,
        })
    }
}

/// HTTP client that waits on the shared per-domain limiter before each
/// request and reports the response status back to it.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    source_id: String,
    user_agents: UserAgentPool,
    rate_limiter: RateLimiter,
}

impl HttpClient {
    /// Create a builder for configuring an `HttpClient`.
    ///
    /// - `source_id`: identifier used in log lines
    /// - `timeout`: per-request timeout
    /// - `request_delay`: base politeness delay between requests to one host
    pub fn builder(
        source_id: &str,
        timeout: Duration,
        request_delay: Duration,
    ) -> HttpClientBuilder {
        HttpClientBuilder {
            source_id: source_id.to_string(),
            timeout,
            request_delay,
            user_agents: None,
            rate_limiter: None,
        }
    }

    /// Get the rate limiter for this client.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn user_agents(&self) -> &UserAgentPool {
        &self.user_agents
    }

    async fn send(
        &self,
        url: &str,
        request: RequestBuilder,
        attempt: u32,
    ) -> Result<HttpResponse, reqwest::Error> {
        let domain = self.rate_limiter.acquire(url).await;
        let request = request.header(USER_AGENT_HEADER, self.user_agents.for_attempt(attempt));

        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status();
        let headers = extract_response_headers(&response);

        debug!(
            source = %self.source_id,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "{}",
            url
        );

        if let Some(ref domain) = domain {
            let code = status.as_u16();
            if RateLimiter::is_rate_limit(code)
                || (code == 403 && headers.contains_key("retry-after"))
            {
                self.rate_limiter.report_rate_limit(domain, code).await;
            } else if status.is_server_error() {
                self.rate_limiter.report_server_error(domain).await;
            } else if status.is_success() {
                self.rate_limiter.report_success(domain).await;
            }
        }

        Ok(HttpResponse {
            status,
            headers,
            response,
        })
    }

    /// GET a URL; `attempt` selects the user agent.
    pub async fn get(&self, url: &str, attempt: u32) -> Result<HttpResponse, reqwest::Error> {
        self.send(url, self.client.get(url), attempt).await
    }

    /// POST a JSON body with extra headers.
    pub async fn post_json_with_headers<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, reqwest::Error> {
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.send(url, request, 0).await
    }
}
