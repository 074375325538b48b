//! Accession batches and the priority list.
//!
//! A batch is one flat CSV per filer with columns
//! `accessionNumber,cik,reportDate,filingDate` (and optionally
//! `documentUrl`). The priority list is a JSON array of accession ids or
//! CIKs, processed first in listed order.

use std::collections::VecDeque;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{normalize_cik, Accession};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid batch file {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid priority list {path}: {source}")]
    Priority {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct BatchRow {
    #[serde(rename = "accessionNumber")]
    accession_number: String,
    cik: String,
    #[serde(rename = "reportDate")]
    report_date: String,
    #[serde(rename = "filingDate", default)]
    filing_date: Option<String>,
    #[serde(
        rename = "documentUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    document_url: Option<String>,
}

impl From<BatchRow> for Accession {
    fn from(row: BatchRow) -> Self {
        let mut acc = Accession::new(row.accession_number, &row.cik, &row.report_date);
        if let Some(date) = row.filing_date.filter(|d| !d.trim().is_empty()) {
            acc = acc.with_filing_date(&date);
        }
        if let Some(url) = row.document_url.filter(|u| !u.trim().is_empty()) {
            acc = acc.with_document_url(&url);
        }
        acc
    }
}

/// Accessions from one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessionBatch {
    pub name: String,
    pub accessions: Vec<Accession>,
}

impl AccessionBatch {
    pub fn new(name: impl Into<String>, accessions: Vec<Accession>) -> Self {
        Self {
            name: name.into(),
            accessions,
        }
    }

    pub fn len(&self) -> usize {
        self.accessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessions.is_empty()
    }
}

pub fn read_batch(path: &Path) -> Result<AccessionBatch, BatchError> {
    let csv_error = |source| BatchError::Csv {
        path: path.display().to_string(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    let mut accessions = Vec::new();
    for row in reader.deserialize::<BatchRow>() {
        let row = row.map_err(csv_error)?;
        if row.accession_number.trim().is_empty() {
            continue;
        }
        accessions.push(Accession::from(row));
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(AccessionBatch::new(name, accessions))
}

pub fn write_batch(path: &Path, accessions: &[Accession]) -> Result<(), BatchError> {
    let csv_error = |source| BatchError::Csv {
        path: path.display().to_string(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    for acc in accessions {
        writer
            .serialize(BatchRow {
                accession_number: acc.id.to_string(),
                cik: acc.cik.clone(),
                report_date: acc.report_date.clone(),
                filing_date: acc.filing_date.clone(),
                document_url: None,
            })
            .map_err(csv_error)?;
    }
    writer.flush().map_err(|source| BatchError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Load every `*.csv` batch in a directory, in file-name order.
pub fn load_batches(dir: &Path) -> Result<Vec<AccessionBatch>, BatchError> {
    let io_error = |source| BatchError::Io {
        path: dir.display().to_string(),
        source,
    };
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .map_err(io_error)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .collect();
    paths.sort();

    let mut batches = Vec::with_capacity(paths.len());
    for path in paths {
        match read_batch(&path) {
            Ok(batch) => {
                debug!("Loaded {} accessions from {}", batch.len(), path.display());
                batches.push(batch);
            }
            Err(e) => warn!("Skipping batch: {}", e),
        }
    }
    Ok(batches)
}

/// Ordered list of accession ids or CIKs to dispatch first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriorityList {
    entries: Vec<String>,
}

impl PriorityList {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, BatchError> {
        let text = std::fs::read_to_string(path).map_err(|source| BatchError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let entries: Vec<String> =
            serde_json::from_str(&text).map_err(|source| BatchError::Priority {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self::new(entries))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of the first entry matching the accession id or its CIK.
    pub fn rank(&self, accession: &Accession) -> Option<usize> {
        self.entries.iter().position(|entry| {
            entry == accession.id.as_str() || normalize_cik(entry) == accession.cik
        })
    }
}

/// A unit of work handed to one file worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub batch: String,
    pub accessions: Vec<Accession>,
}

/// Order batches into a dispatch queue.
///
/// Priority accessions are pulled out of their batches and queued first,
/// one unit each, in priority-list order; ties keep input order. The
/// remaining accessions follow, grouped by their original batch.
pub fn plan_work(batches: Vec<AccessionBatch>, priority: &PriorityList) -> VecDeque<WorkUnit> {
    let mut ranked: Vec<(usize, usize, String, Accession)> = Vec::new();
    let mut rest: Vec<WorkUnit> = Vec::new();
    let mut seq = 0;

    for batch in batches {
        let mut remaining = Vec::with_capacity(batch.accessions.len());
        for acc in batch.accessions {
            match priority.rank(&acc) {
                Some(rank) => ranked.push((rank, seq, batch.name.clone(), acc)),
                None => remaining.push(acc),
            }
            seq += 1;
        }
        if !remaining.is_empty() {
            rest.push(WorkUnit {
                batch: batch.name,
                accessions: remaining,
            });
        }
    }

    ranked.sort_by_key(|(rank, seq, _, _)| (*rank, *seq));

    let mut queue: VecDeque<WorkUnit> = ranked
        .into_iter()
        .map(|(_, _, batch, acc)| WorkUnit {
            batch,
            accessions: vec![acc],
        })
        .collect();
    queue.extend(rest);
    queue
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc(id: &str, cik: &str) -> Accession {
        Accession::new(id, cik, "2024-03-31")
    }

    fn ids(queue: &VecDeque<WorkUnit>) -> Vec<Vec<String>> {
        queue
            .iter()
            .map(|u| u.accessions.iter().map(|a| a.id.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_read_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("berkshire.csv");
        std::fs::write(
            &path,
            "accessionNumber,cik,reportDate,filingDate\n\
             0000950123-24-000001,1067983,2024-03-31,2024-05-15\n\
             ,1067983,2024-03-31,\n\
             0000950123-24-000002,1067983,2023-12-31,\n",
        )
        .unwrap();

        let batch = read_batch(&path).unwrap();
        assert_eq!(batch.name, "berkshire");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.accessions[0].cik, "0001067983");
        assert_eq!(batch.accessions[0].filing_date.as_deref(), Some("2024-05-15"));
        assert_eq!(batch.accessions[1].filing_date, None);
    }

    #[test]
    fn test_write_then_load_batches() {
        let dir = tempfile::tempdir().unwrap();
        write_batch(
            &dir.path().join("b.csv"),
            &[acc("0000000002-24-000001", "2")],
        )
        .unwrap();
        write_batch(
            &dir.path().join("a.csv"),
            &[acc("0000000001-24-000001", "1")],
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let batches = load_batches(dir.path()).unwrap();
        let names: Vec<&str> = batches.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(batches[0].accessions[0].cik, "0000000001");
    }

    #[test]
    fn test_priority_rank_by_accession_or_cik() {
        let list = PriorityList::new(["0000000003-24-000001", "1067983"]);
        assert_eq!(list.rank(&acc("0000000003-24-000001", "3")), Some(0));
        assert_eq!(list.rank(&acc("0000950123-24-000009", "0001067983")), Some(1));
        assert_eq!(list.rank(&acc("0000000004-24-000001", "4")), None);
    }

    #[test]
    fn test_priority_list_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("priority.json");
        std::fs::write(&path, r#"["C", " ", "A"]"#).unwrap();
        assert_eq!(PriorityList::load(&path).unwrap(), PriorityList::new(["C", "A"]));

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            PriorityList::load(&path),
            Err(BatchError::Priority { .. })
        ));
    }

    #[test]
    fn test_plan_work_puts_priority_first() {
        let batches = vec![
            AccessionBatch::new("one", vec![acc("A", "1"), acc("B", "1")]),
            AccessionBatch::new("two", vec![acc("C", "2"), acc("D", "2")]),
        ];
        let queue = plan_work(batches, &PriorityList::new(["C", "A"]));
        assert_eq!(
            ids(&queue),
            vec![vec!["C"], vec!["A"], vec!["B"], vec!["D"]]
        );
        assert_eq!(queue[0].batch, "two");
    }

    #[test]
    fn test_plan_work_without_priority_keeps_batches() {
        let batches = vec![AccessionBatch::new("one", vec![acc("A", "1"), acc("B", "1")])];
        let queue = plan_work(batches, &PriorityList::default());
        assert_eq!(ids(&queue), vec![vec!["A", "B"]]);
    }
}
