//! Tier 2: holdings tables in loose HTML markup.
//!
//! Covers the archive's rendered information-table page and HTML documents
//! embedded in older submissions. Columns are mapped from header text, with
//! a positional fallback when the header is too irregular to classify.

use scraper::{ElementRef, Html, Selector};

use super::coerce::{clean_text, RecordBuilder};
use super::row_policy::{RowPolicy, RowTally};
use super::{ExtractError, ExtractedRows};

/// Rows scanned for the header signature.
const HEADER_SCAN_ROWS: usize = 3;

/// Minimum column count for a holdings table.
const MIN_COLUMNS: usize = 8;

/// Column order when the table carries a FIGI column.
const POSITIONAL_WITH_FIGI: [&str; 13] = [
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
];

/// Column order of pre-FIGI filings.
const POSITIONAL: [&str; 12] = [
    "name_of_issuer",
    "title_of_class",
    "cusip",
    "value",
    "shares_or_principal_amount",
    "shares_or_principal_type",
    "put_call",
    "investment_discretion",
    "other_manager",
    "voting_sole",
    "voting_shared",
    "voting_none",
];

struct Selectors {
    table: Selector,
    row: Selector,
    cell: Selector,
}

impl Selectors {
    fn new() -> Option<Self> {
        Some(Self {
            table: Selector::parse("table").ok()?,
            row: Selector::parse("tr").ok()?,
            cell: Selector::parse("td, th").ok()?,
        })
    }
}

/// Cells of a row with `colspan` expanded, text whitespace-collapsed.
fn row_cells(row: ElementRef<'_>, cell_sel: &Selector) -> Vec<String> {
    let mut cells = Vec::new();
    for cell in row.select(cell_sel) {
        let text = clean_text(&cell.text().collect::<String>().replace('\u{a0}', " "));
        let span = cell
            .value()
            .attr("colspan")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .clamp(1, 16);
        cells.push(text);
        for _ in 1..span {
            cells.push(String::new());
        }
    }
    cells
}

fn is_header_signature(cells: &[String]) -> bool {
    let joined = cells.join(" ").to_lowercase();
    joined.contains("issuer") && (joined.contains("cusip") || joined.contains("class"))
}

/// Classify one header cell.
fn classify_header(text: &str) -> Option<&'static str> {
    let t = text.to_lowercase();
    if t.is_empty() {
        return None;
    }
    let field = if t.contains("issuer") {
        "name_of_issuer"
    } else if t.contains("class") {
        "title_of_class"
    } else if t.contains("cusip") {
        "cusip"
    } else if t.contains("figi") {
        "figi"
    } else if t.contains("sh/prn") || t.contains("sh/ prn") || t.contains("prn type") {
        "shares_or_principal_type"
    } else if t.contains("put") || t.contains("call") {
        "put_call"
    } else if t.contains("discretion") {
        "investment_discretion"
    } else if t.contains("manager") {
        "other_manager"
    } else if t.contains("voting") || t == "sole" {
        "voting_sole"
    } else if t == "shared" {
        "voting_shared"
    } else if t == "none" {
        "voting_none"
    } else if t.contains("value") {
        "value"
    } else if t.contains("amt") || t.contains("amount") || t.contains("shares") || t.contains("prn")
    {
        "shares_or_principal_amount"
    } else {
        return None;
    };
    Some(field)
}

/// Map column index to field name from the header row.
///
/// A "voting authority" cell spanning three columns fills sole, shared and
/// none. Returns None when the mapping lacks the columns needed to read a
/// holding.
fn header_mapping(header: &[String]) -> Option<Vec<Option<&'static str>>> {
    let mut mapping: Vec<Option<&'static str>> = vec![None; header.len()];
    let mut i = 0;
    while i < header.len() {
        let field = classify_header(&header[i]);
        mapping[i] = field;
        if field == Some("voting_sole") && header[i].to_lowercase().contains("voting") {
            // Spanned cells were expanded to empty strings after the label.
            if i + 2 < header.len() && header[i + 1].is_empty() && header[i + 2].is_empty() {
                mapping[i + 1] = Some("voting_shared");
                mapping[i + 2] = Some("voting_none");
                i += 2;
            }
        }
        i += 1;
    }

    let has = |name: &str| mapping.iter().any(|m| *m == Some(name));
    if has("name_of_issuer") && has("cusip") && has("value") {
        Some(mapping)
    } else {
        None
    }
}

fn positional_mapping(columns: usize) -> Vec<Option<&'static str>> {
    let order: &[&'static str] = if columns >= POSITIONAL_WITH_FIGI.len() {
        &POSITIONAL_WITH_FIGI
    } else {
        &POSITIONAL
    };
    (0..columns).map(|i| order.get(i).copied()).collect()
}

/// Header continuation rows (`SOLE SHARED NONE`, `COLUMN 1 ...`).
fn is_header_continuation(cells: &[String]) -> bool {
    let lower: Vec<String> = cells.iter().map(|c| c.to_lowercase()).collect();
    let has = |s: &str| lower.iter().any(|c| c == s);
    (has("sole") && has("shared")) || lower.iter().any(|c| c.starts_with("column "))
}

/// Apply one data row to the tally.
///
/// With `drop_unvoted`, rows whose voting columns are all zero are treated
/// as layout noise and neither accepted nor counted as skipped.
pub(crate) fn tally_row(
    tally: &mut RowTally,
    row_number: usize,
    cells: &[String],
    mapping: &[Option<&'static str>],
    drop_unvoted: bool,
) {
    if cells.iter().all(|c| c.is_empty()) || is_header_continuation(cells) {
        return;
    }

    let mut builder = RecordBuilder::new();
    for (cell, field) in cells.iter().zip(mapping) {
        if let Some(field) = field {
            builder.set(field, cell);
        }
    }

    match builder.build() {
        Ok(record) => {
            if record.is_total_row() || (drop_unvoted && record.voting_total() == 0) {
                return;
            }
            if record.name_of_issuer.is_empty() {
                tally.reject(row_number, &[]);
                return;
            }
            tally.accept(record);
        }
        Err(errors) => tally.reject(row_number, &errors),
    }
}

/// Locate the holdings table in an HTML document and extract its rows.
pub fn extract_html(html: &str, policy: &RowPolicy) -> Result<ExtractedRows, ExtractError> {
    let Some(selectors) = Selectors::new() else {
        return Err(ExtractError::TableNotFound("HTML"));
    };
    let document = Html::parse_document(html);

    for table in document.select(&selectors.table) {
        let rows: Vec<Vec<String>> = table
            .select(&selectors.row)
            .map(|row| row_cells(row, &selectors.cell))
            .collect();

        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns < MIN_COLUMNS {
            continue;
        }
        let Some(header_index) = rows
            .iter()
            .take(HEADER_SCAN_ROWS)
            .position(|cells| is_header_signature(cells))
        else {
            continue;
        };

        let mapping = header_mapping(&rows[header_index])
            .unwrap_or_else(|| positional_mapping(columns));

        let mut tally = policy.tally();
        for (i, cells) in rows.iter().enumerate().skip(header_index + 1) {
            tally_row(&mut tally, i + 1, cells, &mapping, false);
        }
        return tally.finish();
    }

    Err(ExtractError::TableNotFound("HTML"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> String {
        let tds: String = cells.iter().map(|c| format!("<td>{}</td>", c)).collect();
        format!("<tr>{}</tr>", tds)
    }

    fn holding(name: &str, value: &str) -> String {
        row(&[
            name, "COM", "037833100", "", value, "1,000", "SH", "", "SOLE", "", "1,000", "0", "0",
        ])
    }

    /// Layout of the archive's rendered information-table page.
    fn page(body_rows: &[String]) -> String {
        format!(
            r#"<html><body>
<table summary="Form 13F-NT Header Information"><tr><td>FORM 13F INFORMATION TABLE</td></tr></table>
<table summary="Form 13F-HR Information Table">
<tr><td>COLUMN 1</td><td>COLUMN 2</td><td>COLUMN 3</td><td>COLUMN 4</td><td>COLUMN 5</td><td colspan="3">COLUMN 6</td><td>COLUMN 7</td><td>COLUMN 8</td><td></td><td></td><td></td></tr>
<tr><td>NAME OF ISSUER</td><td>TITLE OF CLASS</td><td>CUSIP</td><td>FIGI</td><td>VALUE</td><td>SHRS OR PRN AMT</td><td>SH/ PRN</td><td>PUT/ CALL</td><td>INVESTMENT DISCRETION</td><td>OTHER MANAGER</td><td colspan="3">VOTING AUTHORITY</td></tr>
<tr><td></td><td></td><td></td><td></td><td>(to the nearest dollar)</td><td></td><td></td><td></td><td></td><td></td><td>SOLE</td><td>SHARED</td><td>NONE</td></tr>
{}
</table></body></html>"#,
            body_rows.join("\n")
        )
    }

    #[test]
    fn test_rendered_information_table() {
        let html = page(&[holding("APPLE INC", "$ 190,000"), holding("MICROSOFT CORP", "420,000")]);
        let rows = extract_html(&html, &RowPolicy::default()).unwrap();
        assert_eq!(rows.records.len(), 2);
        assert_eq!(rows.skipped_rows, 0);
        let apple = &rows.records[0];
        assert_eq!(apple.name_of_issuer, "APPLE INC");
        assert_eq!(apple.title_of_class, "COM");
        assert_eq!(apple.cusip, "037833100");
        assert_eq!(apple.value, 190_000);
        assert_eq!(apple.shares_or_principal_amount, 1_000);
        assert_eq!(apple.shares_or_principal_type, "SH");
        assert_eq!(apple.investment_discretion, "SOLE");
        assert_eq!(apple.voting_sole, 1_000);
    }

    #[test]
    fn test_header_mapping_expands_voting_span() {
        let header: Vec<String> = [
            "NAME OF ISSUER", "TITLE OF CLASS", "CUSIP", "VALUE (x$1000)", "SHRS OR PRN AMT",
            "SH/PRN", "PUT/CALL", "INVESTMENT DISCRETION", "OTHER MANAGERS",
            "VOTING AUTHORITY", "", "",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let mapping = header_mapping(&header).unwrap();
        assert_eq!(mapping[3], Some("value"));
        assert_eq!(mapping[4], Some("shares_or_principal_amount"));
        assert_eq!(mapping[5], Some("shares_or_principal_type"));
        assert_eq!(mapping[9], Some("voting_sole"));
        assert_eq!(mapping[10], Some("voting_shared"));
        assert_eq!(mapping[11], Some("voting_none"));
    }

    #[test]
    fn test_skipped_rows_at_threshold() {
        let mut rows: Vec<String> = (0..9).map(|i| holding(&format!("ISSUER {i}"), "10")).collect();
        rows.push(holding("BROKEN", "n/a"));
        let extracted = extract_html(&page(&rows), &RowPolicy::new(0.10)).unwrap();
        assert_eq!(extracted.records.len(), 9);
        assert_eq!(extracted.skipped_rows, 1);
    }

    #[test]
    fn test_skipped_rows_above_threshold() {
        let mut rows: Vec<String> = (0..8).map(|i| holding(&format!("ISSUER {i}"), "10")).collect();
        rows.push(holding("BROKEN", "n/a"));
        rows.push(holding("ALSO BROKEN", "??"));
        let err = extract_html(&page(&rows), &RowPolicy::new(0.10)).unwrap_err();
        assert!(matches!(err, ExtractError::TooManySkipped { skipped: 2, expected: 10, .. }));
    }

    #[test]
    fn test_total_and_blank_rows_are_not_counted() {
        let rows = vec![
            holding("APPLE INC", "10"),
            row(&["TOTAL", "", "", "", "10", "", "", "", "", "", "", "", ""]),
            row(&["", "", "", "", "", "", "", "", "", "", "", "", ""]),
        ];
        let extracted = extract_html(&page(&rows), &RowPolicy::new(0.0)).unwrap();
        assert_eq!(extracted.records.len(), 1);
        assert_eq!(extracted.skipped_rows, 0);
    }

    #[test]
    fn test_holding_without_voting_authority_is_kept() {
        let rows = vec![
            holding("APPLE INC", "10"),
            row(&[
                "BERKSHIRE HATHAWAY", "CL B", "084670702", "", "25", "500", "SH", "", "DFND", "",
                "0", "0", "0",
            ]),
        ];
        let extracted = extract_html(&page(&rows), &RowPolicy::new(0.0)).unwrap();
        assert_eq!(extracted.records.len(), 2);
        assert_eq!(extracted.skipped_rows, 0);
        let unvoted = &extracted.records[1];
        assert_eq!(unvoted.name_of_issuer, "BERKSHIRE HATHAWAY");
        assert_eq!(unvoted.shares_or_principal_amount, 500);
        assert_eq!(unvoted.voting_total(), 0);
    }

    #[test]
    fn test_no_matching_table() {
        let html = "<table><tr><td>a</td><td>b</td></tr></table>";
        let err = extract_html(html, &RowPolicy::default()).unwrap_err();
        assert!(matches!(err, ExtractError::TableNotFound(_)));
    }
}
