//! OpenAI-compatible chat completions backend.
//!
//! Uses structured outputs (`response_format.type = "json_schema"`, strict)
//! so the returned content is a JSON object matching the holdings schema.
//! Any endpoint speaking the same protocol works via `with_endpoint`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::prompts::openai_schema;
use super::{check_status, CompletionRequest, ModelBackend, ModelError, ProviderKind};
use crate::http_client::HttpClient;

pub const DEFAULT_MODEL: &str = "gpt-5-nano";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchema,
}

#[derive(Debug, Serialize)]
struct JsonSchema {
    name: &'static str,
    strict: bool,
    schema: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

pub struct OpenAiBackend {
    client: HttpClient,
    api_key: Option<String>,
    model: String,
    endpoint: String,
    temperature: Option<f32>,
}

impl OpenAiBackend {
    pub fn new(client: HttpClient, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Some reasoning models reject a temperature; unset by default.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    fn name(&self) -> String {
        format!("openai:{}", self.model)
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        let provider = ProviderKind::OpenAi;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ModelError::Unavailable("OPENAI_API_KEY not set".to_string()))?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchema {
                    name: "holdings_table",
                    strict: true,
                    schema: openai_schema(),
                },
            },
            temperature: self.temperature,
        };

        let auth = format!("Bearer {}", api_key);
        let response = self
            .client
            .post_json_with_headers(&self.completions_url(), &body, &[("Authorization", &auth)])
            .await
            .map_err(|e| ModelError::Connection(e.to_string()))?;
        let response = check_status(provider, response).await?;

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| ModelError::MalformedResponse {
                    provider,
                    message: e.to_string(),
                })?;

        if let Some(error) = parsed.error {
            return Err(ModelError::Api {
                provider,
                status: 200,
                message: error.message,
            });
        }

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| ModelError::MalformedResponse {
                provider,
                message: "no choices in response".to_string(),
            })?;

        if let Some(refusal) = message.refusal {
            return Err(ModelError::SchemaViolation(format!("model refused: {}", refusal)));
        }

        let content = message.content.unwrap_or_default();
        debug!("{} returned {} chars", self.name(), content.len());
        if content.trim().is_empty() {
            return Err(ModelError::MalformedResponse {
                provider,
                message: "empty completion".to_string(),
            });
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> HttpClient {
        HttpClient::builder("openai", Duration::from_secs(5), Duration::ZERO)
            .build()
            .unwrap()
    }

    #[test]
    fn test_availability_requires_key() {
        assert!(!OpenAiBackend::new(client(), None).is_available());
        assert!(!OpenAiBackend::new(client(), Some("  ".into())).is_available());
        assert!(OpenAiBackend::new(client(), Some("sk-test".into())).is_available());
    }

    #[test]
    fn test_endpoint_override() {
        let backend = OpenAiBackend::new(client(), None)
            .with_endpoint("http://localhost:8080/v1/")
            .with_model("local-model");
        assert_eq!(
            backend.completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
        assert_eq!(backend.name(), "openai:local-model");
    }

    #[tokio::test]
    async fn test_complete_without_key_is_unavailable() {
        let backend = OpenAiBackend::new(client(), None);
        let request = CompletionRequest {
            system: "s".into(),
            prompt: "p".into(),
        };
        assert!(matches!(
            backend.complete(&request).await,
            Err(ModelError::Unavailable(_))
        ));
    }

    #[test]
    fn test_request_serialization() {
        let body = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchema {
                    name: "holdings_table",
                    strict: true,
                    schema: openai_schema(),
                },
            },
            temperature: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["response_format"]["type"], "json_schema");
        assert!(value.get("temperature").is_none());
    }
}
