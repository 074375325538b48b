//! Normalized holdings table with provenance.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccessionId, HoldingsRecord};

/// Extraction strategy that produced a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExtractionTier {
    /// Strict XML information table.
    Xml,
    /// Heuristic parse of loosely structured markup.
    Html,
    /// Language-model fallback.
    Model,
}

impl ExtractionTier {
    pub const ALL: [ExtractionTier; 3] = [Self::Xml, Self::Html, Self::Model];

    pub fn number(&self) -> u8 {
        match self {
            Self::Xml => 1,
            Self::Html => 2,
            Self::Model => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Xml),
            2 => Some(Self::Html),
            3 => Some(Self::Model),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Html => "html",
            Self::Model => "model",
        }
    }
}

impl fmt::Display for ExtractionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier{} ({})", self.number(), self.as_str())
    }
}

/// Accession metadata attached to a table by the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    pub accession: AccessionId,
    pub cik: String,
    pub report_date: String,
    pub filing_date: Option<String>,
    /// URL of the document the rows were read from.
    pub source_url: String,
    pub tier: ExtractionTier,
    pub skipped_rows: usize,
    pub value_multiplier: u32,
}

/// Provenance of a normalized table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub accession: AccessionId,
    pub cik: String,
    pub report_date: String,
    pub filing_date: Option<String>,
    pub source_url: String,
    pub tier: ExtractionTier,
    pub extracted_at: DateTime<Utc>,
    pub row_count: usize,
    pub skipped_rows: usize,
    pub value_multiplier: u32,
}

/// Ordered holdings records plus provenance.
///
/// Never mutated after construction; `row_count` always equals the number
/// of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTable {
    records: Vec<HoldingsRecord>,
    provenance: Provenance,
}

impl NormalizedTable {
    pub fn new(records: Vec<HoldingsRecord>, meta: TableMeta) -> Self {
        Self::with_timestamp(records, meta, Utc::now())
    }

    pub fn with_timestamp(
        records: Vec<HoldingsRecord>,
        meta: TableMeta,
        extracted_at: DateTime<Utc>,
    ) -> Self {
        let provenance = Provenance {
            accession: meta.accession,
            cik: meta.cik,
            report_date: meta.report_date,
            filing_date: meta.filing_date,
            source_url: meta.source_url,
            tier: meta.tier,
            extracted_at,
            row_count: records.len(),
            skipped_rows: meta.skipped_rows,
            value_multiplier: meta.value_multiplier,
        };
        Self {
            records,
            provenance,
        }
    }

    pub fn records(&self) -> &[HoldingsRecord] {
        &self.records
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn row_count(&self) -> usize {
        self.provenance.row_count
    }

    pub fn tier(&self) -> ExtractionTier {
        self.provenance.tier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(tier: ExtractionTier) -> TableMeta {
        TableMeta {
            accession: AccessionId::new("0000000001-24-000001"),
            cik: "0000000001".to_string(),
            report_date: "2024-03-31".to_string(),
            filing_date: None,
            source_url: "https://www.sec.gov/Archives/edgar/data/1/0000000001-24-000001.txt"
                .to_string(),
            tier,
            skipped_rows: 2,
            value_multiplier: 1,
        }
    }

    #[test]
    fn test_row_count_matches_records() {
        let records = vec![HoldingsRecord::default(), HoldingsRecord::default()];
        let table = NormalizedTable::new(records, meta(ExtractionTier::Html));
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.records().len(), 2);
        assert_eq!(table.provenance().skipped_rows, 2);
        assert_eq!(table.tier().number(), 2);
    }

    #[test]
    fn test_tier_numbers_round_trip() {
        for tier in ExtractionTier::ALL {
            assert_eq!(ExtractionTier::from_number(tier.number()), Some(tier));
        }
        assert_eq!(ExtractionTier::from_number(4), None);
    }
}
