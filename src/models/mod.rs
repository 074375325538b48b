//! Data models for form13f.

mod accession;
mod holding;
mod outcome;
mod table;

pub use accession::{normalize_cik, Accession, AccessionId};
pub use holding::HoldingsRecord;
pub use outcome::{AttemptContext, FailureKind, ProcessingOutcome, RunLogEntry};
pub use table::{ExtractionTier, NormalizedTable, Provenance, TableMeta};
