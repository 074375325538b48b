//! Ordered provider chain with per-provider retry.
//!
//! Each provider gets a bounded number of attempts with exponential backoff
//! (or the server's `Retry-After`). When a provider is exhausted or fails
//! with a non-retryable error, the next one is tried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{CompletionRequest, ModelBackend, ModelError};
use crate::rate_limit::backoff_delay;

const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

pub struct ProviderChain {
    backends: Vec<Arc<dyn ModelBackend>>,
    max_attempts: u32,
    backoff_base_ms: u64,
}

impl ProviderChain {
    /// Build a chain from backends in preference order. Backends that are
    /// not configured are dropped.
    pub fn new(backends: Vec<Arc<dyn ModelBackend>>, max_attempts: u32) -> Self {
        let mut available = Vec::with_capacity(backends.len());
        for backend in backends {
            if backend.is_available() {
                debug!("model chain: added {}", backend.name());
                available.push(backend);
            } else {
                debug!("model chain: {} not available", backend.name());
            }
        }

        info!("model chain initialized with {} backends", available.len());

        Self {
            backends: available,
            max_attempts: max_attempts.max(1),
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        }
    }

    pub fn with_backoff_base_ms(mut self, base_ms: u64) -> Self {
        self.backoff_base_ms = base_ms;
        self
    }

    pub fn has_backends(&self) -> bool {
        !self.backends.is_empty()
    }

    pub fn backend_names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    async fn complete_with_retry(
        &self,
        backend: &dyn ModelBackend,
        request: &CompletionRequest,
    ) -> Result<String, ModelError> {
        let mut attempt = 0;
        loop {
            match backend.complete(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    let backoff = backoff_delay(attempt, self.backoff_base_ms);
                    let wait = e.retry_after().map_or(backoff, |d| d.max(backoff));
                    warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        backend.name(),
                        attempt + 1,
                        self.max_attempts,
                        e,
                        wait
                    );
                    sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn sleep(wait: Duration) {
    if !wait.is_zero() {
        tokio::time::sleep(wait).await;
    }
}

#[async_trait]
impl ModelBackend for ProviderChain {
    fn name(&self) -> String {
        format!("chain[{}]", self.backend_names().join(","))
    }

    fn is_available(&self) -> bool {
        self.has_backends()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        let mut last_error: Option<ModelError> = None;

        for backend in &self.backends {
            match self.complete_with_retry(backend.as_ref(), request).await {
                Ok(text) => {
                    debug!("model completion succeeded with {}", backend.name());
                    return Ok(text);
                }
                Err(e) => {
                    warn!("model backend {} failed: {}, trying next", backend.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ModelError::Unavailable("no model provider configured".to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct ScriptedBackend {
        name: &'static str,
        available: bool,
        script: Mutex<Vec<Result<String, ModelError>>>,
        calls: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(name: &'static str, script: Vec<Result<String, ModelError>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                available: true,
                script: Mutex::new(script.into_iter().rev().collect()),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        fn name(&self) -> String {
            self.name.to_string()
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ModelError::Connection("script exhausted".into())))
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system: "s".into(),
            prompt: "p".into(),
        }
    }

    fn limited() -> ModelError {
        ModelError::RateLimited {
            provider: ProviderKind::OpenAi,
            retry_after_secs: None,
        }
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let first = ScriptedBackend::new("first", vec![Err(limited()), Ok("{}".into())]);
        let chain = ProviderChain::new(vec![first.clone()], 3).with_backoff_base_ms(0);
        assert_eq!(chain.complete(&request()).await.unwrap(), "{}");
        assert_eq!(first.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_falls_back_after_exhausting_attempts() {
        let first = ScriptedBackend::new("first", vec![Err(limited()), Err(limited())]);
        let second = ScriptedBackend::new("second", vec![Ok("ok".into())]);
        let chain =
            ProviderChain::new(vec![first.clone(), second.clone()], 2).with_backoff_base_ms(0);
        assert_eq!(chain.complete(&request()).await.unwrap(), "ok");
        assert_eq!(first.calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_moves_on_immediately() {
        let first = ScriptedBackend::new(
            "first",
            vec![Err(ModelError::SchemaViolation("refused".into()))],
        );
        let chain = ProviderChain::new(vec![first.clone()], 5).with_backoff_base_ms(0);
        let err = chain.complete(&request()).await.unwrap_err();
        assert!(matches!(err, ModelError::SchemaViolation(_)));
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_is_unavailable() {
        let chain = ProviderChain::new(Vec::new(), 3);
        assert!(!chain.is_available());
        assert!(matches!(
            chain.complete(&request()).await,
            Err(ModelError::Unavailable(_))
        ));
    }
}
