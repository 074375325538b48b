//! Tier-3 extraction: project, chunk, call the model, validate.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{debug, info};

use super::prompts::{extraction_prompt, SYSTEM_PROMPT};
use super::{CompletionRequest, FallbackExtractor, ModelBackend, ModelError};
use crate::extract::{model_chunks, truncate_chars, ExtractedRows};
use crate::models::HoldingsRecord;
use crate::source::RawDocument;

pub const DEFAULT_MAX_CONTENT_CHARS: usize = 100_000;
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelTable {
    result: Vec<HoldingsRecord>,
}

/// Validate one model response against the holdings schema.
///
/// Unknown keys, missing keys, and non-integer or negative numbers are
/// violations. Markdown code fences around the payload are tolerated.
pub fn parse_model_output(raw: &str) -> Result<Vec<HoldingsRecord>, ModelError> {
    let trimmed = raw.trim();
    let payload = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str::<ModelTable>(payload)
        .map(|t| t.result)
        .map_err(|e| ModelError::SchemaViolation(e.to_string()))
}

/// Sends projected table text to a [`ModelBackend`] and validates the output.
pub struct ModelExtractor {
    backend: Arc<dyn ModelBackend>,
    max_content_chars: usize,
    concurrency: usize,
}

impl ModelExtractor {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend,
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_max_content_chars(mut self, max: usize) -> Self {
        self.max_content_chars = max.max(1);
        self
    }

    /// Chunks of one document sent concurrently.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    fn chunks(&self, doc: &RawDocument) -> Vec<String> {
        let mut chunks = model_chunks(&doc.text);
        if chunks.is_empty() {
            if let Some(ref page) = doc.info_table_html {
                chunks = model_chunks(page);
            }
        }
        chunks
    }
}

#[async_trait]
impl FallbackExtractor for ModelExtractor {
    async fn extract_via_model(&self, doc: &RawDocument) -> Result<ExtractedRows, ModelError> {
        if !self.backend.is_available() {
            return Err(ModelError::Unavailable(
                "no model provider configured".to_string(),
            ));
        }

        let chunks = self.chunks(doc);
        if chunks.is_empty() {
            return Err(ModelError::SchemaViolation(
                "no holdings table text to send".to_string(),
            ));
        }

        info!(
            "{}: model extraction over {} chunk(s) via {}",
            doc.accession,
            chunks.len(),
            self.backend.name()
        );

        let responses: Vec<Result<String, ModelError>> = stream::iter(chunks.into_iter())
            .map(|chunk: String| {
                let request = CompletionRequest {
                    system: SYSTEM_PROMPT.to_string(),
                    prompt: extraction_prompt(truncate_chars(&chunk, self.max_content_chars)),
                };
                let backend = Arc::clone(&self.backend);
                async move { backend.complete(&request).await }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut records = Vec::new();
        let mut skipped_rows = 0;
        for response in responses {
            for record in parse_model_output(&response?)? {
                if record.is_total_row() {
                    skipped_rows += 1;
                } else {
                    records.push(record);
                }
            }
        }

        if records.is_empty() {
            return Err(ModelError::SchemaViolation(
                "model returned no holdings rows".to_string(),
            ));
        }

        debug!("{}: model returned {} rows", doc.accession, records.len());
        Ok(ExtractedRows {
            records,
            skipped_rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccessionId;
    use std::sync::Mutex;

    const ROW: &str = r#"{"name_of_issuer":"APPLE INC","title_of_class":"COM","cusip":"037833100","figi":"","value":1500,"shares_or_principal_amount":10000,"shares_or_principal_type":"SH","put_call":"","investment_discretion":"SOLE","other_manager":"","voting_sole":10000,"voting_shared":0,"voting_none":0}"#;

    struct FakeBackend {
        response: String,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn new(response: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                response: response.into(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelBackend for FakeBackend {
        fn name(&self) -> String {
            "fake".to_string()
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            Ok(self.response.clone())
        }
    }

    fn doc(text: &str) -> RawDocument {
        RawDocument::new(
            AccessionId::new("0000950123-24-000001"),
            "https://www.sec.gov/x.txt",
            text,
        )
    }

    const TABLE_DOC: &str = "<TABLE><TR><TD>Name of Issuer</TD><TD>CUSIP</TD></TR>\
<TR><TD>APPLE INC</TD><TD>037833100</TD></TR></TABLE>";

    #[test]
    fn test_parse_model_output_accepts_fenced_json() {
        let raw = format!("```json\n{{\"result\":[{}]}}\n```", ROW);
        let rows = parse_model_output(&raw).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 1500);
    }

    #[test]
    fn test_parse_model_output_rejects_unknown_key() {
        let raw = format!(
            "{{\"result\":[{}]}}",
            ROW.replace("\"figi\":\"\"", "\"figi\":\"\",\"note\":\"x\"")
        );
        assert!(matches!(
            parse_model_output(&raw),
            Err(ModelError::SchemaViolation(_))
        ));
    }

    #[test]
    fn test_parse_model_output_rejects_negative_and_text_numbers() {
        let negative = format!("{{\"result\":[{}]}}", ROW.replace("1500", "-1500"));
        assert!(parse_model_output(&negative).is_err());
        let textual = format!("{{\"result\":[{}]}}", ROW.replace("1500", "\"1,500\""));
        assert!(parse_model_output(&textual).is_err());
    }

    #[tokio::test]
    async fn test_extract_via_model_sends_projected_table() {
        let backend = FakeBackend::new(format!("{{\"result\":[{}]}}", ROW));
        let extractor = ModelExtractor::new(backend.clone());
        let rows = extractor.extract_via_model(&doc(TABLE_DOC)).await.unwrap();
        assert_eq!(rows.records.len(), 1);
        assert_eq!(rows.records[0].cusip, "037833100");

        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("APPLE INC | 037833100"));
        assert!(!prompts[0].contains("<TD>"));
    }

    #[tokio::test]
    async fn test_extract_via_model_truncates_chunks() {
        let backend = FakeBackend::new(format!("{{\"result\":[{}]}}", ROW));
        let extractor = ModelExtractor::new(backend.clone()).with_max_content_chars(10);
        extractor.extract_via_model(&doc(TABLE_DOC)).await.unwrap();
        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].ends_with("TEXT:\nName of Is"));
    }

    #[tokio::test]
    async fn test_empty_result_is_schema_violation() {
        let backend = FakeBackend::new(r#"{"result":[]}"#);
        let extractor = ModelExtractor::new(backend);
        let err = extractor.extract_via_model(&doc(TABLE_DOC)).await.unwrap_err();
        assert!(matches!(err, ModelError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn test_document_without_table_text() {
        let backend = FakeBackend::new(r#"{"result":[]}"#);
        let extractor = ModelExtractor::new(backend.clone());
        let err = extractor
            .extract_via_model(&doc("cover page only"))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::SchemaViolation(_)));
        assert!(backend.prompts.lock().unwrap().is_empty());
    }
}
