//! Artifact encoding and the destination key convention.
//!
//! Keys look like `{prefix}/{period}/{cik}_{accession}_{period}.csv` with
//! dashes in the accession and period replaced by underscores. The accession
//! can therefore be recovered from the file stem alone.

use sha2::{Digest, Sha256};

use super::StorageError;
use crate::models::{Accession, AccessionId, HoldingsRecord, NormalizedTable};

/// Full artifact header: the holdings fields, then per-row provenance.
pub const ARTIFACT_COLUMNS: [&str; 20] = [
    "name_of_issuer",
    "title_of_class",
    "cusip",
    "figi",
    "value",
    "shares_or_principal_amount",
    "shares_or_principal_type",
    "put_call",
    "investment_discretion",
    "other_manager",
    "voting_sole",
    "voting_shared",
    "voting_none",
    "accession",
    "cik",
    "report_date",
    "filing_date",
    "scraping_url",
    "tier",
    "value_multiplier",
];

pub fn artifact_key(prefix: &str, accession: &Accession) -> String {
    let period = accession.period_key();
    let file = format!(
        "{}_{}_{}.csv",
        accession.cik,
        accession.id.underscored(),
        period
    );
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/{}", period, file)
    } else {
        format!("{}/{}/{}", prefix, period, file)
    }
}

/// Recover the accession id from an artifact key or file name.
///
/// Returns `None` for keys that do not follow the naming convention.
pub fn accession_from_key(key: &str) -> Option<AccessionId> {
    let file = key.rsplit('/').next()?;
    let stem = file.strip_suffix(".csv")?;
    let parts: Vec<&str> = stem.split('_').collect();
    // cik + at least one accession part + yyyy_mm_dd
    if parts.len() < 5 {
        return None;
    }
    let middle = &parts[1..parts.len() - 3];
    if middle.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(AccessionId::new(middle.join("-")))
}

fn record_fields(r: &HoldingsRecord) -> [String; 13] {
    [
        r.name_of_issuer.clone(),
        r.title_of_class.clone(),
        r.cusip.clone(),
        r.figi.clone(),
        r.value.to_string(),
        r.shares_or_principal_amount.to_string(),
        r.shares_or_principal_type.clone(),
        r.put_call.clone(),
        r.investment_discretion.clone(),
        r.other_manager.clone(),
        r.voting_sole.to_string(),
        r.voting_shared.to_string(),
        r.voting_none.to_string(),
    ]
}

/// Encode a table as CSV bytes.
///
/// The output depends only on the records and accession metadata, so
/// re-processing a filing yields identical bytes.
pub fn encode_artifact(table: &NormalizedTable) -> Result<Vec<u8>, StorageError> {
    let provenance = table.provenance();
    let tier = provenance.tier.number().to_string();
    let multiplier = provenance.value_multiplier.to_string();
    let filing_date = provenance.filing_date.as_deref().unwrap_or("");

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(ARTIFACT_COLUMNS)?;
    for record in table.records() {
        let fields = record_fields(record);
        writer.write_record(fields.iter().map(String::as_str).chain([
            provenance.accession.as_str(),
            provenance.cik.as_str(),
            provenance.report_date.as_str(),
            filing_date,
            provenance.source_url.as_str(),
            tier.as_str(),
            multiplier.as_str(),
        ]))?;
    }

    writer
        .into_inner()
        .map_err(|e| StorageError::Upload(format!("failed to flush artifact: {}", e)))
}

/// Decode the holdings fields of an artifact, ignoring provenance columns.
pub fn decode_artifact(bytes: &[u8]) -> Result<Vec<HoldingsRecord>, StorageError> {
    let mut reader = csv::Reader::from_reader(bytes);
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let text = |i: usize| row.get(i).unwrap_or("").to_string();
        let number = |i: usize| row.get(i).and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
        records.push(HoldingsRecord {
            name_of_issuer: text(0),
            title_of_class: text(1),
            cusip: text(2),
            figi: text(3),
            value: number(4),
            shares_or_principal_amount: number(5),
            shares_or_principal_type: text(6),
            put_call: text(7),
            investment_discretion: text(8),
            other_manager: text(9),
            voting_sole: number(10),
            voting_shared: number(11),
            voting_none: number(12),
        });
    }
    Ok(records)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
