//! Accession processor: fetch, extract through the tiers, persist.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::retry::retry_with_backoff;
use crate::extract::{value_multiplier, ExtractedRows, StructuredExtractor};
use crate::llm::FallbackExtractor;
use crate::models::{
    Accession, ExtractionTier, FailureKind, NormalizedTable, ProcessingOutcome, TableMeta,
};
use crate::source::{FilingSource, RawDocument};
use crate::storage::{artifact_key, encode_artifact, sha256_hex, ArtifactStore};

pub const DEFAULT_PERSIST_ATTEMPTS: u32 = 3;
pub const DEFAULT_PERSIST_BACKOFF_MS: u64 = 250;

/// Why an accession ended in `Failed`.
#[derive(Debug)]
struct Failure {
    kind: FailureKind,
    message: String,
}

impl Failure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Runs one accession through `Fetching -> Tier1 -> Tier2 -> Tier3 ->
/// Persisting`. Every failure is converted into a `Failed` outcome.
pub struct AccessionProcessor {
    source: Arc<dyn FilingSource>,
    structured: StructuredExtractor,
    fallback: Arc<dyn FallbackExtractor>,
    store: Arc<dyn ArtifactStore>,
    persist_attempts: u32,
    persist_backoff_ms: u64,
}

impl AccessionProcessor {
    pub fn new(
        source: Arc<dyn FilingSource>,
        structured: StructuredExtractor,
        fallback: Arc<dyn FallbackExtractor>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            source,
            structured,
            fallback,
            store,
            persist_attempts: DEFAULT_PERSIST_ATTEMPTS,
            persist_backoff_ms: DEFAULT_PERSIST_BACKOFF_MS,
        }
    }

    pub fn with_persist_retry(mut self, attempts: u32, backoff_ms: u64) -> Self {
        self.persist_attempts = attempts.max(1);
        self.persist_backoff_ms = backoff_ms;
        self
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub async fn process(&self, accession: &Accession) -> ProcessingOutcome {
        match self.run(accession).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                warn!(
                    accession = %accession.id,
                    kind = %failure.kind,
                    "{}",
                    failure.message
                );
                ProcessingOutcome::Failed {
                    accession: accession.id.clone(),
                    kind: failure.kind,
                    message: failure.message,
                }
            }
        }
    }

    async fn run(&self, accession: &Accession) -> Result<ProcessingOutcome, Failure> {
        debug!(accession = %accession.id, "fetching from {}", self.source.name());
        let doc = self
            .source
            .fetch_document(accession)
            .await
            .map_err(|e| Failure::new(e.kind(), e.to_string()))?;

        let (tier, rows) = self.extract(&doc).await?;

        let multiplier = value_multiplier(doc.info_table_html.as_deref().unwrap_or(&doc.text));
        let table = NormalizedTable::new(
            rows.records,
            TableMeta {
                accession: accession.id.clone(),
                cik: accession.cik.clone(),
                report_date: accession.report_date.clone(),
                filing_date: accession.filing_date.clone(),
                source_url: doc.url.clone(),
                tier,
                skipped_rows: rows.skipped_rows,
                value_multiplier: multiplier,
            },
        );

        let (key, digest) = self.persist(accession, &table).await?;
        info!(
            accession = %accession.id,
            tier = tier.number(),
            rows = table.row_count(),
            "persisted {}",
            key
        );

        Ok(ProcessingOutcome::Persisted {
            accession: accession.id.clone(),
            tier,
            rows: table.row_count(),
            skipped_rows: table.provenance().skipped_rows,
            key,
            digest,
        })
    }

    /// Try each tier in order. Structured tiers fall through on any error;
    /// the model tier's error is terminal.
    async fn extract(&self, doc: &RawDocument) -> Result<(ExtractionTier, ExtractedRows), Failure> {
        let mut notes = Vec::with_capacity(3);

        for tier in [ExtractionTier::Xml, ExtractionTier::Html] {
            match self.structured.extract(doc, tier) {
                Ok(rows) => return Ok((tier, rows)),
                Err(e) => {
                    debug!(accession = %doc.accession, "{} failed: {}", tier, e);
                    notes.push(format!("{}: {}", tier, e));
                }
            }
        }

        debug!(accession = %doc.accession, "falling back to model extraction");
        match self.fallback.extract_via_model(doc).await {
            Ok(rows) => Ok((ExtractionTier::Model, rows)),
            Err(e) => {
                notes.push(format!("{}: {}", ExtractionTier::Model, e));
                Err(Failure::new(e.kind(), notes.join("; ")))
            }
        }
    }

    async fn persist(
        &self,
        accession: &Accession,
        table: &NormalizedTable,
    ) -> Result<(String, String), Failure> {
        let bytes = encode_artifact(table).map_err(|e| Failure::new(e.kind(), e.to_string()))?;
        let digest = sha256_hex(&bytes);
        let key = artifact_key(self.store.prefix(), accession);

        retry_with_backoff(
            &format!("upload {}", key),
            self.persist_attempts,
            self.persist_backoff_ms,
            |e: &crate::storage::StorageError| e.is_retryable(),
            |_| self.store.upload(&key, &bytes),
        )
        .await
        .map_err(|e| Failure::new(e.kind(), e.to_string()))?;

        Ok((key, digest))
    }
}
