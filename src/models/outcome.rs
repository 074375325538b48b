//! Processing outcomes, failure taxonomy, and run log rows.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccessionId, ExtractionTier};

/// Failure kinds an accession can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureKind {
    /// Accession does not exist or was withdrawn. Never retried.
    NotFound,
    /// Timeout or rate-limit response that outlived its retry budget.
    TransientNetwork,
    /// Document did not match a tier's expected structure.
    MalformedInput,
    /// Model output did not conform to the holdings schema.
    SchemaViolation,
    /// No model backend could produce a response.
    ExtractionUnavailable,
    /// Artifact could not be written.
    Persistence,
}

impl FailureKind {
    pub const ALL: [FailureKind; 6] = [
        Self::NotFound,
        Self::TransientNetwork,
        Self::MalformedInput,
        Self::SchemaViolation,
        Self::ExtractionUnavailable,
        Self::Persistence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::TransientNetwork => "transient_network",
            Self::MalformedInput => "malformed_input",
            Self::SchemaViolation => "schema_violation",
            Self::ExtractionUnavailable => "extraction_unavailable",
            Self::Persistence => "persistence",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of processing one accession.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    Persisted {
        accession: AccessionId,
        tier: ExtractionTier,
        rows: usize,
        skipped_rows: usize,
        key: String,
        /// SHA-256 of the artifact bytes.
        digest: String,
    },
    Failed {
        accession: AccessionId,
        kind: FailureKind,
        message: String,
    },
}

impl ProcessingOutcome {
    pub fn accession(&self) -> &AccessionId {
        match self {
            Self::Persisted { accession, .. } | Self::Failed { accession, .. } => accession,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted { .. })
    }

    pub fn tier(&self) -> Option<ExtractionTier> {
        match self {
            Self::Persisted { tier, .. } => Some(*tier),
            Self::Failed { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Persisted { .. } => None,
            Self::Failed { kind, .. } => Some(*kind),
        }
    }

    /// Short label used in the run log `outcome` column.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Persisted { .. } => "persisted",
            Self::Failed { .. } => "failed",
        }
    }
}

/// One row of the run log: a single processing attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub run_id: String,
    pub accession: String,
    pub cik: String,
    /// Batch (filer file) the accession came from.
    pub batch: String,
    /// Worker identity, `f{file_worker}.r{record_worker}`.
    pub worker: String,
    pub outcome: String,
    /// Tier number (1-3); empty on failure.
    pub tier: Option<u8>,
    pub rows: usize,
    pub skipped_rows: usize,
    pub failure: Option<String>,
    pub message: String,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub digest: Option<String>,
}

/// Worker and timing context of one attempt, filled in by the orchestrator.
#[derive(Debug, Clone)]
pub struct AttemptContext {
    pub run_id: String,
    pub cik: String,
    pub batch: String,
    pub worker: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunLogEntry {
    pub fn from_outcome(outcome: &ProcessingOutcome, ctx: AttemptContext) -> Self {
        let (tier, rows, skipped_rows, failure, message, digest) = match outcome {
            ProcessingOutcome::Persisted {
                tier,
                rows,
                skipped_rows,
                key,
                digest,
                ..
            } => (
                Some(tier.number()),
                *rows,
                *skipped_rows,
                None,
                key.clone(),
                Some(digest.clone()),
            ),
            ProcessingOutcome::Failed { kind, message, .. } => (
                None,
                0,
                0,
                Some(kind.as_str().to_string()),
                message.clone(),
                None,
            ),
        };
        Self {
            run_id: ctx.run_id,
            accession: outcome.accession().to_string(),
            cik: ctx.cik,
            batch: ctx.batch,
            worker: ctx.worker,
            outcome: outcome.label().to_string(),
            tier,
            rows,
            skipped_rows,
            failure,
            message,
            duration_ms: ctx.duration_ms,
            started_at: ctx.started_at,
            digest,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_deref().and_then(FailureKind::from_str)
    }

    pub fn extraction_tier(&self) -> Option<ExtractionTier> {
        self.tier.and_then(ExtractionTier::from_number)
    }
}
