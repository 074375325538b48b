//! Filing submission identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique accession number of a filing, e.g. `0001067983-24-000012`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessionId(String);

impl AccessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accession number without dashes, as used in archive directory names.
    pub fn compact(&self) -> String {
        self.0.replace('-', "")
    }

    /// Accession number with dashes replaced by underscores, as used in artifact names.
    pub fn underscored(&self) -> String {
        self.0.replace('-', "_")
    }
}

impl fmt::Display for AccessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccessionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccessionId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Zero-pad a CIK to the canonical 10 digits.
///
/// Non-numeric input is returned trimmed but otherwise untouched.
pub fn normalize_cik(cik: &str) -> String {
    let trimmed = cik.trim();
    // Spreadsheet exports sometimes carry a float suffix ("1067983.0").
    let digits = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        format!("{:0>10}", digits)
    } else {
        trimmed.to_string()
    }
}

/// One filing submission to process.
///
/// Immutable once constructed; identified solely by `id` for dedup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accession {
    pub id: AccessionId,
    /// Filer CIK, zero-padded to 10 digits.
    pub cik: String,
    /// Period of report (`YYYY-MM-DD`).
    pub report_date: String,
    pub filing_date: Option<String>,
    /// Explicit raw document location, overriding archive discovery.
    pub document_url: Option<String>,
}

impl Accession {
    pub fn new(id: impl Into<AccessionId>, cik: &str, report_date: &str) -> Self {
        Self {
            id: id.into(),
            cik: normalize_cik(cik),
            report_date: report_date.trim().to_string(),
            filing_date: None,
            document_url: None,
        }
    }

    pub fn with_filing_date(mut self, filing_date: &str) -> Self {
        self.filing_date = Some(filing_date.trim().to_string());
        self
    }

    pub fn with_document_url(mut self, url: &str) -> Self {
        self.document_url = Some(url.to_string());
        self
    }

    /// Report period with dashes replaced by underscores (`2024_03_31`).
    pub fn period_key(&self) -> String {
        self.report_date.replace('-', "_")
    }

    /// CIK without leading zeros, as used in archive paths.
    pub fn cik_unpadded(&self) -> &str {
        let stripped = self.cik.trim_start_matches('0');
        if stripped.is_empty() {
            "0"
        } else {
            stripped
        }
    }
}
