//! Model-backed extraction (tier 3).
//!
//! Documents without a usable structured table are projected to plain text
//! and sent to a language model constrained to the holdings schema. Two
//! interchangeable providers are supported; a [`ProviderChain`] retries each
//! and falls back to the next when one is unavailable.

mod chain;
mod extractor;
mod gemini;
mod openai;
pub mod prompts;

pub use chain::ProviderChain;
pub use extractor::{parse_model_output, ModelExtractor};
pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extract::{truncate_chars, ExtractedRows};
use crate::http_client::HttpResponse;
use crate::models::FailureKind;
use crate::source::RawDocument;

/// Errors from model backends and model-backed extraction.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Backend not available: {0}")]
    Unavailable(String),

    #[error("Rate limited by {provider}, retry after {retry_after_secs:?}s")]
    RateLimited {
        provider: ProviderKind,
        retry_after_secs: Option<u64>,
    },

    #[error("{provider} API error (HTTP {status}): {message}")]
    Api {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Malformed response from {provider}: {message}")]
    MalformedResponse {
        provider: ProviderKind,
        message: String,
    },

    #[error("Output violates holdings schema: {0}")]
    SchemaViolation(String),
}

impl ModelError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ModelError::SchemaViolation(_) => FailureKind::SchemaViolation,
            _ => FailureKind::ExtractionUnavailable,
        }
    }

    /// Whether retrying the same provider may help.
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::RateLimited { .. }
            | ModelError::Connection(_)
            | ModelError::MalformedResponse { .. } => true,
            ModelError::Api { status, .. } => *status >= 500,
            ModelError::Unavailable(_) | ModelError::SchemaViolation(_) => false,
        }
    }

    /// Server-requested wait before retrying.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ModelError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Supported model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions with JSON-schema output.
    OpenAi,
    /// Google Gemini `generateContent` with a response schema.
    Gemini,
}

impl ProviderKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open_ai" | "gpt" => Some(Self::OpenAi),
            "gemini" | "google" => Some(Self::Gemini),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a non-success provider response to a [`ModelError`].
pub(crate) async fn check_status(
    provider: ProviderKind,
    response: HttpResponse,
) -> Result<HttpResponse, ModelError> {
    if response.is_success() {
        return Ok(response);
    }
    let status = response.status.as_u16();
    if status == 429 {
        return Err(ModelError::RateLimited {
            provider,
            retry_after_secs: response.retry_after().map(|d| d.as_secs()),
        });
    }
    let body = response.text().await.unwrap_or_default();
    Err(ModelError::Api {
        provider,
        status,
        message: truncate_chars(body.trim(), 500).to_string(),
    })
}

/// One schema-constrained completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
}

/// A language-model provider that returns JSON conforming to the holdings
/// response schema.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> String;

    /// Whether the backend is configured (e.g. has credentials).
    fn is_available(&self) -> bool;

    /// Run one completion and return the raw structured payload.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError>;
}

/// Tier-3 extraction as seen by the processor.
#[async_trait]
pub trait FallbackExtractor: Send + Sync {
    async fn extract_via_model(&self, doc: &RawDocument) -> Result<ExtractedRows, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!(ProviderKind::from_str("OpenAI"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::from_str(" gemini "), Some(ProviderKind::Gemini));
        assert_eq!(ProviderKind::from_str("ollama"), None);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ModelError::SchemaViolation("x".into()).kind(),
            FailureKind::SchemaViolation
        );
        let limited = ModelError::RateLimited {
            provider: ProviderKind::Gemini,
            retry_after_secs: Some(3),
        };
        assert_eq!(limited.kind(), FailureKind::ExtractionUnavailable);
        assert!(limited.is_retryable());
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(3)));
        assert!(!ModelError::Unavailable("no key".into()).is_retryable());
        let client_error = ModelError::Api {
            provider: ProviderKind::OpenAi,
            status: 400,
            message: "bad".into(),
        };
        assert!(!client_error.is_retryable());
    }
}
