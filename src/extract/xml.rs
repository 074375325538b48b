//! Tier 1: strict XML information tables.
//!
//! Electronic 13F filings since 2013 embed an `informationTable` document
//! (optionally namespace-prefixed) inside the submission text. Every
//! `infoTable` row must carry the required elements and numeric fields must
//! coerce; any deviation rejects the whole table.

use std::collections::HashMap;
use std::sync::LazyLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use super::coerce::{parse_amount, RecordBuilder};
use super::{ExtractError, ExtractedRows};

static INFORMATION_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(<[\w:]*informationTable[\s\S]*?</[\w:]*informationTable\s*>)").unwrap()
});

/// Element paths below `infoTable`, mapped to record fields.
const FIELD_PATHS: [(&str, &str); 13] = [
    ("nameOfIssuer", "name_of_issuer"),
    ("titleOfClass", "title_of_class"),
    ("cusip", "cusip"),
    ("figi", "figi"),
    ("value", "value"),
    ("shrsOrPrnAmt/sshPrnamt", "shares_or_principal_amount"),
    ("shrsOrPrnAmt/sshPrnamtType", "shares_or_principal_type"),
    ("putCall", "put_call"),
    ("investmentDiscretion", "investment_discretion"),
    ("otherManager", "other_manager"),
    ("votingAuthority/Sole", "voting_sole"),
    ("votingAuthority/Shared", "voting_shared"),
    ("votingAuthority/None", "voting_none"),
];

const REQUIRED_PATHS: [&str; 4] = ["nameOfIssuer", "cusip", "value", "shrsOrPrnAmt/sshPrnamt"];

/// Find the `informationTable` XML block in a submission.
pub fn find_information_table(text: &str) -> Option<&str> {
    INFORMATION_TABLE.find(text).map(|m| m.as_str())
}

fn local_name(qname: &[u8]) -> String {
    let name = String::from_utf8_lossy(qname);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}

fn xml_err(reader: &Reader<&[u8]>, message: impl std::fmt::Display) -> ExtractError {
    ExtractError::Xml(format!(
        "{} at byte {}",
        message,
        reader.buffer_position()
    ))
}

/// Collect each `infoTable` element as a map of relative path to text.
fn read_info_tables(xml: &str) -> Result<Vec<HashMap<String, String>>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut rows = Vec::new();
    let mut current: Option<HashMap<String, String>> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref());
                if stack.is_empty() {
                    if name != "informationTable" {
                        return Err(xml_err(&reader, format!("unexpected root <{}>", name)));
                    }
                    saw_root = true;
                } else if name == "infoTable" {
                    if current.is_some() {
                        return Err(xml_err(&reader, "nested <infoTable>"));
                    }
                    current = Some(HashMap::new());
                }
                stack.push(name);
            }
            Ok(Event::Empty(_)) => {}
            Ok(Event::Text(e)) => {
                if let Some(row) = current.as_mut() {
                    let text = e.unescape().map_err(|err| xml_err(&reader, err))?;
                    if let Some(pos) = stack.iter().position(|n| n == "infoTable") {
                        let path = stack[pos + 1..].join("/");
                        row.entry(path).or_default().push_str(&text);
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(row) = current.as_mut() {
                    if let Some(pos) = stack.iter().position(|n| n == "infoTable") {
                        let path = stack[pos + 1..].join("/");
                        let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                        row.entry(path).or_default().push_str(&text);
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = local_name(e.name().as_ref());
                stack.pop();
                if name == "infoTable" {
                    if let Some(row) = current.take() {
                        rows.push(row);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(xml_err(&reader, e)),
        }
    }

    if !saw_root || !stack.is_empty() {
        return Err(ExtractError::Xml("unterminated informationTable".to_string()));
    }
    Ok(rows)
}

/// Tier 1 extraction over a submission's text.
pub fn extract_xml(text: &str) -> Result<ExtractedRows, ExtractError> {
    let block = find_information_table(text).ok_or(ExtractError::TableNotFound("XML"))?;
    let rows = read_info_tables(block)?;
    if rows.is_empty() {
        return Err(ExtractError::NoRows);
    }

    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        for required in REQUIRED_PATHS {
            if row.get(required).map_or(true, |v| v.trim().is_empty()) {
                return Err(ExtractError::InvalidRow {
                    row: i + 1,
                    message: format!("missing <{}>", required),
                });
            }
        }
        // Required numerics must be real numbers, not placeholders.
        for required in ["value", "shrsOrPrnAmt/sshPrnamt"] {
            let raw = row.get(required).map(String::as_str).unwrap_or("");
            if parse_amount(raw).is_none() || raw.trim().chars().all(|c| c == '-') {
                return Err(ExtractError::InvalidRow {
                    row: i + 1,
                    message: format!("non-numeric <{}>: {:?}", required, raw.trim()),
                });
            }
        }

        let mut builder = RecordBuilder::new();
        for (path, field) in FIELD_PATHS {
            if let Some(raw) = row.get(path) {
                builder.set(field, raw);
            }
        }
        let record = builder.build().map_err(|errors| ExtractError::InvalidRow {
            row: i + 1,
            message: errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })?;
        records.push(record);
    }

    Ok(ExtractedRows {
        records,
        skipped_rows: 0,
    })
}
