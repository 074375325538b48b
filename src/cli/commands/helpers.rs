//! Shared construction of pipeline components from settings.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::config::Settings;
use crate::extract::{RowPolicy, StructuredExtractor};
use crate::http_client::{HttpClient, UserAgentPool};
use crate::llm::{
    GeminiBackend, ModelBackend, ModelExtractor, OpenAiBackend, ProviderChain, ProviderKind,
};
use crate::pipeline::{AccessionProcessor, DEFAULT_PERSIST_BACKOFF_MS};
use crate::source::EdgarSource;
use crate::storage::LocalArtifactStore;

/// Model calls are slow; give them their own client without a politeness delay.
const MODEL_TIMEOUT: Duration = Duration::from_secs(180);

pub fn edgar_source(settings: &Settings) -> anyhow::Result<EdgarSource> {
    let client = HttpClient::builder(
        "edgar",
        Duration::from_secs(settings.request_timeout_secs),
        Duration::from_millis(settings.request_delay_ms),
    )
    .user_agents(UserAgentPool::new(&settings.user_agents))
    .build()
    .context("building EDGAR HTTP client")?;
    Ok(EdgarSource::new(client, settings.fetch_max_attempts))
}

pub fn artifact_store(settings: &Settings) -> LocalArtifactStore {
    LocalArtifactStore::new(&settings.storage.root, &settings.storage.prefix)
}

pub fn provider_chain(settings: &Settings) -> anyhow::Result<ProviderChain> {
    let client = HttpClient::builder("model", MODEL_TIMEOUT, Duration::ZERO)
        .build()
        .context("building model HTTP client")?;

    let model = &settings.model;
    let backends: Vec<Arc<dyn ModelBackend>> = model
        .providers
        .iter()
        .map(|kind| -> Arc<dyn ModelBackend> {
            match kind {
                ProviderKind::OpenAi => {
                    let cfg = &model.openai;
                    let mut backend = OpenAiBackend::new(client.clone(), cfg.api_key.clone());
                    if let Some(ref name) = cfg.model {
                        backend = backend.with_model(name);
                    }
                    if let Some(ref endpoint) = cfg.endpoint {
                        backend = backend.with_endpoint(endpoint);
                    }
                    Arc::new(backend)
                }
                ProviderKind::Gemini => {
                    let cfg = &model.gemini;
                    let mut backend = GeminiBackend::new(client.clone(), cfg.api_key.clone());
                    if let Some(ref name) = cfg.model {
                        backend = backend.with_model(name);
                    }
                    if let Some(ref endpoint) = cfg.endpoint {
                        backend = backend.with_endpoint(endpoint);
                    }
                    Arc::new(backend)
                }
            }
        })
        .collect();

    Ok(ProviderChain::new(backends, model.max_attempts))
}

pub fn processor(settings: &Settings) -> anyhow::Result<AccessionProcessor> {
    let source = edgar_source(settings)?;
    let chain = provider_chain(settings)?;
    if !chain.has_backends() {
        tracing::warn!("No model provider configured; tier 3 extraction will fail");
    }
    let fallback = ModelExtractor::new(Arc::new(chain))
        .with_max_content_chars(settings.model.max_content_chars)
        .with_concurrency(settings.model.concurrency);

    Ok(AccessionProcessor::new(
        Arc::new(source),
        StructuredExtractor::new(RowPolicy::new(settings.skipped_row_threshold)),
        Arc::new(fallback),
        Arc::new(artifact_store(settings)),
    )
    .with_persist_retry(settings.persist_max_attempts, DEFAULT_PERSIST_BACKOFF_MS))
}
