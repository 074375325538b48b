//! Filing sources.
//!
//! A [`FilingSource`] turns an accession into its raw submission text and
//! lists the accessions a filer has on record. [`EdgarSource`] talks to the
//! SEC archive; tests substitute in-process fakes.

mod edgar;
mod index;
mod submissions;

pub use edgar::{EdgarSource, EdgarUrls};
pub use index::{parse_index_page, IndexLinks};
pub use submissions::{parse_submissions, FORM_TYPES};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Accession, AccessionId, FailureKind};

/// Errors from fetching filing documents.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Not found: {url} (HTTP {status})")]
    NotFound { url: String, status: u16 },

    #[error("Transient network error for {url}: {message}")]
    Transient { url: String, message: String },

    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::NotFound { .. } => FailureKind::NotFound,
            FetchError::Transient { .. } => FailureKind::TransientNetwork,
            FetchError::InvalidResponse { .. } => FailureKind::MalformedInput,
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// Raw filing content as retrieved from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub accession: AccessionId,
    /// URL the submission text was read from.
    pub url: String,
    /// Complete submission text.
    pub text: String,
    /// Rendered information-table page, when the archive index links one.
    pub info_table_html: Option<String>,
}

impl RawDocument {
    pub fn new(accession: AccessionId, url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            accession,
            url: url.into(),
            text: text.into(),
            info_table_html: None,
        }
    }

    pub fn with_info_table_html(mut self, html: impl Into<String>) -> Self {
        self.info_table_html = Some(html.into());
        self
    }
}

/// A source of filing documents.
#[async_trait]
pub trait FilingSource: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &str;

    /// Retrieve the raw document(s) for an accession.
    ///
    /// Fails only with `NotFound` (terminal) or `Transient` after the
    /// source's own retry budget is spent.
    async fn fetch_document(&self, accession: &Accession) -> Result<RawDocument, FetchError>;

    /// List a filer's holdings-report accessions on record.
    async fn list_pending_accessions(&self, cik: &str) -> Result<Vec<Accession>, FetchError>;
}
