//! Structured extraction (tiers 1 and 2).
//!
//! Tier 1 reads the strict XML information table. Tier 2 locates a holdings
//! table in loose markup by its header signature: first in the rendered
//! information-table page, then in HTML embedded in the submission, then in
//! fixed-width SGML text tables. Every failure here is `MalformedInput`, the
//! signal for the processor to move on to the next tier.

pub mod coerce;
mod html;
mod row_policy;
pub mod text;
mod text_table;
mod xml;

pub use html::extract_html;
pub use row_policy::{RowPolicy, RowTally};
pub use text::{model_chunks, project_text, truncate_chars, value_multiplier};
pub use text_table::extract_text_table;
pub use xml::{extract_xml, find_information_table};

use thiserror::Error;
use tracing::debug;

use crate::models::{ExtractionTier, FailureKind, HoldingsRecord};
use crate::source::RawDocument;

/// Errors from structured extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No {0} holdings table found")]
    TableNotFound(&'static str),

    #[error("Malformed XML: {0}")]
    Xml(String),

    #[error("Row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    #[error("{skipped} of {expected} rows malformed (threshold {threshold})")]
    TooManySkipped {
        skipped: usize,
        expected: usize,
        threshold: f64,
    },

    #[error("Holdings table has no valid rows")]
    NoRows,

    #[error("{0} is not a structured tier")]
    UnsupportedTier(ExtractionTier),
}

impl ExtractError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::MalformedInput
    }
}

/// Rows recovered from one table, before accession metadata is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRows {
    pub records: Vec<HoldingsRecord>,
    pub skipped_rows: usize,
}

/// Runs the deterministic tiers over a raw document.
#[derive(Debug, Clone, Default)]
pub struct StructuredExtractor {
    policy: RowPolicy,
}

impl StructuredExtractor {
    pub fn new(policy: RowPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RowPolicy {
        &self.policy
    }

    /// Extract with one structured tier.
    pub fn extract(
        &self,
        doc: &RawDocument,
        tier: ExtractionTier,
    ) -> Result<ExtractedRows, ExtractError> {
        match tier {
            ExtractionTier::Xml => extract_xml(&doc.text),
            ExtractionTier::Html => self.extract_loose(doc),
            ExtractionTier::Model => Err(ExtractError::UnsupportedTier(tier)),
        }
    }

    fn extract_loose(&self, doc: &RawDocument) -> Result<ExtractedRows, ExtractError> {
        type ExtractFn = fn(&str, &RowPolicy) -> Result<ExtractedRows, ExtractError>;

        let mut layouts: Vec<(&'static str, &str, ExtractFn)> = Vec::with_capacity(3);
        if let Some(ref page) = doc.info_table_html {
            layouts.push(("information table page", page.as_str(), extract_html as ExtractFn));
        }
        layouts.push(("embedded HTML", doc.text.as_str(), extract_html as ExtractFn));
        layouts.push(("fixed-width text", doc.text.as_str(), extract_text_table as ExtractFn));

        let mut first_error: Option<ExtractError> = None;
        for (label, input, extract) in layouts {
            match extract(input, &self.policy) {
                Ok(rows) => {
                    debug!(
                        "{}: {} rows from {} ({} skipped)",
                        doc.accession,
                        rows.records.len(),
                        label,
                        rows.skipped_rows
                    );
                    return Ok(rows);
                }
                Err(ExtractError::TableNotFound(_)) => {}
                Err(e) => {
                    debug!("{}: {} table rejected: {}", doc.accession, label, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        Err(first_error.unwrap_or(ExtractError::TableNotFound("loose markup")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccessionId;

    fn doc(text: &str) -> RawDocument {
        RawDocument::new(AccessionId::new("0000000001-24-000001"), "mem://doc", text)
    }

    #[test]
    fn test_model_tier_is_not_structured() {
        let err = StructuredExtractor::default()
            .extract(&doc(""), ExtractionTier::Model)
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedInput);
    }

    #[test]
    fn test_loose_tier_falls_back_to_text_table() {
        let text = "<TABLE>\nNAME OF ISSUER  CLASS  CUSIP\n\
<S>          <C>      <C>        <C>     <C>     <C> <C> <C>   <C> <C>   <C> <C>\n\
APPLE INC    COM      037833100  100     10      SH      SOLE      10    0   0\n\
</TABLE>";
        let rows = StructuredExtractor::default()
            .extract(&doc(text), ExtractionTier::Html)
            .unwrap();
        assert_eq!(rows.records.len(), 1);
        assert_eq!(rows.records[0].cusip, "037833100");
    }

    #[test]
    fn test_loose_tier_reports_not_found() {
        let err = StructuredExtractor::default()
            .extract(&doc("plain prose"), ExtractionTier::Html)
            .unwrap_err();
        assert!(matches!(err, ExtractError::TableNotFound(_)));
    }
}
