//! Run log persistence and run summaries.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;

use crate::models::{ExtractionTier, FailureKind, RunLogEntry};

/// Appends run log rows to a CSV file, writing the header only when the
/// file is new or empty.
pub struct RunLogWriter {
    writer: csv::Writer<std::fs::File>,
}

impl RunLogWriter {
    pub fn open(path: &Path) -> Result<Self, csv::Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let has_rows = file.metadata()?.len() > 0;
        let writer = csv::WriterBuilder::new()
            .has_headers(!has_rows)
            .from_writer(file);
        Ok(Self { writer })
    }

    pub fn append(&mut self, entry: &RunLogEntry) -> Result<(), csv::Error> {
        self.writer.serialize(entry)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Read a run log CSV back.
pub fn read_run_log(path: &Path) -> Result<Vec<RunLogEntry>, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    reader.deserialize().collect()
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub persisted_by_tier: BTreeMap<ExtractionTier, usize>,
    pub failed_by_kind: BTreeMap<FailureKind, usize>,
    /// Accessions skipped because the inventory already had them.
    pub skipped_by_dedup: usize,
    /// Accessions never dispatched because the run was stopped.
    pub not_dispatched: usize,
}

impl RunSummary {
    pub fn from_entries(entries: &[RunLogEntry]) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            if let Some(tier) = entry.extraction_tier() {
                *summary.persisted_by_tier.entry(tier).or_default() += 1;
            } else if let Some(kind) = entry.failure_kind() {
                *summary.failed_by_kind.entry(kind).or_default() += 1;
            }
        }
        summary
    }

    pub fn persisted(&self) -> usize {
        self.persisted_by_tier.values().sum()
    }

    pub fn failed(&self) -> usize {
        self.failed_by_kind.values().sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Persisted: {}", self.persisted())?;
        for (tier, count) in &self.persisted_by_tier {
            writeln!(f, "  {:<16} {}", tier.to_string(), count)?;
        }
        writeln!(f, "Failed: {}", self.failed())?;
        for (kind, count) in &self.failed_by_kind {
            writeln!(f, "  {:<24} {}", kind.as_str(), count)?;
        }
        write!(f, "Skipped (already persisted): {}", self.skipped_by_dedup)?;
        if self.not_dispatched > 0 {
            write!(f, "\nNot dispatched (stopped): {}", self.not_dispatched)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessionId, AttemptContext, ProcessingOutcome};
    use chrono::Utc;

    fn ctx() -> AttemptContext {
        AttemptContext {
            run_id: "run-1".into(),
            cik: "0000000001".into(),
            batch: "filer".into(),
            worker: "f0.r0".into(),
            started_at: Utc::now(),
            duration_ms: 12,
        }
    }

    fn entries() -> Vec<RunLogEntry> {
        let persisted = ProcessingOutcome::Persisted {
            accession: AccessionId::new("A"),
            tier: ExtractionTier::Html,
            rows: 10,
            skipped_rows: 1,
            key: "p/k.csv".into(),
            digest: "ab".into(),
        };
        let failed = ProcessingOutcome::Failed {
            accession: AccessionId::new("B"),
            kind: FailureKind::NotFound,
            message: "HTTP 404".into(),
        };
        vec![
            RunLogEntry::from_outcome(&persisted, ctx()),
            RunLogEntry::from_outcome(&failed, ctx()),
        ]
    }

    #[test]
    fn test_summary_counts() {
        let summary = RunSummary::from_entries(&entries());
        assert_eq!(summary.persisted(), 1);
        assert_eq!(summary.persisted_by_tier[&ExtractionTier::Html], 1);
        assert_eq!(summary.failed_by_kind[&FailureKind::NotFound], 1);
        assert!(summary.to_string().contains("not_found"));
    }

    #[test]
    fn test_writer_appends_with_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/run.csv");
        let all = entries();

        let mut writer = RunLogWriter::open(&path).unwrap();
        writer.append(&all[0]).unwrap();
        drop(writer);
        let mut writer = RunLogWriter::open(&path).unwrap();
        writer.append(&all[1]).unwrap();
        drop(writer);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("run_id").count(), 1);
        assert_eq!(read_run_log(&path).unwrap(), all);
    }
}
