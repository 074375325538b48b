//! Tier 2: fixed-width text tables from pre-XML submissions.
//!
//! These filings lay the holdings out in an SGML `<TABLE>` block where a
//! marker line (`<S>  <C>  <C> ...`) gives the starting column of every
//! field. Cells are sliced at those positions, widened or narrowed to the
//! nearest whitespace so that values overflowing their column stay whole.

use std::sync::LazyLock;

use regex::Regex;

use super::coerce::RecordBuilder;
use super::html::tally_row;
use super::row_policy::RowPolicy;
use super::{ExtractError, ExtractedRows};

static TABLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table>(.*?)</table>").unwrap());

/// Leading name / class / cusip, separated by runs of two or more spaces.
static LINE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<name>.+?)\s{2,}(?P<title>.+?)\s{2,}(?P<cusip>\S+)\s*(?P<rest>.*)$")
        .unwrap()
});

static LEADING_AMOUNTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([\d,]+)?\s*([\d,]+)?\s*(.*)$").unwrap());

static NUMBER_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\d,]+$").unwrap());

/// Lines shorter than this fraction of the longest line are notes or
/// wrapped fragments, not rows.
const MIN_LINE_FRACTION: f64 = 0.3;

/// Field order of the marker columns.
const COLUMNS: [&str; 12] = [
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

/// A located fixed-width table: column start offsets plus data lines.
struct TextTable {
    columns: Vec<usize>,
    lines: Vec<Vec<char>>,
}

/// Find the holdings table: the first `<TABLE>` block mentioning "issuer"
/// with a `<C>` marker line.
fn locate(text: &str) -> Option<TextTable> {
    for caps in TABLE_BLOCK.captures_iter(text) {
        let block = caps.get(1)?.as_str();
        if !block.to_lowercase().contains("issuer") {
            continue;
        }
        let lines: Vec<&str> = block.trim_matches('\n').lines().collect();
        let Some(header_index) = lines
            .iter()
            .position(|line| line.to_lowercase().contains("<c>"))
        else {
            continue;
        };

        let header: Vec<char> = lines[header_index].chars().collect();
        let columns: Vec<usize> = header
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == '<')
            .map(|(i, _)| i)
            .collect();

        let data: Vec<Vec<char>> = lines[header_index + 1..]
            .iter()
            .map(|l| l.trim_end_matches('\r').chars().collect())
            .collect();
        let max_len = data.iter().map(Vec::len).max().unwrap_or(0);
        let min_len = max_len as f64 * MIN_LINE_FRACTION;
        let lines = data
            .into_iter()
            .filter(|l| {
                let trimmed = l.iter().collect::<String>();
                !trimmed.trim().is_empty() && trimmed.trim().chars().count() as f64 >= min_len
            })
            .map(|mut l| {
                l.resize(max_len, ' ');
                l
            })
            .collect();

        return Some(TextTable { columns, lines });
    }
    None
}

/// Slice a padded line into cells at the marker positions.
fn slice_cells(line: &[char], columns: &[usize]) -> Vec<String> {
    let mut row = line.to_vec();
    row.extend(std::iter::repeat(' ').take(5));

    columns
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let mut left = start.min(row.len() - 1);
            if left > 0 && !row[left].is_whitespace() {
                while left > 0 && !row[left - 1].is_whitespace() {
                    left -= 1;
                }
            }
            let mut right = match columns.get(i + 1) {
                Some(&next) => next.min(row.len() - 1),
                None => row.len(),
            };
            if i + 1 < columns.len() {
                while right > left && !row[right].is_whitespace() {
                    right -= 1;
                }
            }
            if right <= left {
                return String::new();
            }
            row[left..right].iter().collect::<String>().trim().to_string()
        })
        .collect()
}

/// Token-based reading of one line, for tables whose rows drift from the
/// marker columns. Trailing numbers are read right-to-left as
/// none / shared / sole / other manager.
fn parse_tokens(line: &str) -> Option<RecordBuilder> {
    let mut text = line.trim();
    if let Some(inner) = text.strip_prefix('"') {
        text = inner
            .strip_suffix("\",")
            .or_else(|| inner.strip_suffix('"'))
            .unwrap_or(inner);
    }
    let caps = LINE_PREFIX.captures(text)?;
    let rest = caps.name("rest").map_or("", |m| m.as_str());
    let amounts = LEADING_AMOUNTS.captures(rest)?;
    let value = amounts.get(1).map_or("", |m| m.as_str());
    let shares = amounts.get(2).map_or("", |m| m.as_str());
    let tail = amounts.get(3).map_or("", |m| m.as_str());

    let tokens: Vec<&str> = tail.split_whitespace().collect();
    let trailing_numbers = tokens
        .iter()
        .rev()
        .take_while(|t| NUMBER_TOKEN.is_match(t))
        .count();
    let (words, numbers) = tokens.split_at(tokens.len() - trailing_numbers);

    let mut share_type = "";
    let mut put_call = "";
    let mut discretion: Vec<&str> = Vec::new();
    for word in words {
        let upper = word.to_uppercase();
        if share_type.is_empty() && matches!(upper.as_str(), "SH" | "PRN" | "SHARES" | "PRF") {
            share_type = word;
        } else if put_call.is_empty() && matches!(upper.as_str(), "PUT" | "CALL" | "P" | "C") {
            put_call = word;
        } else {
            discretion.push(word);
        }
    }

    let from_end = |n: usize| numbers.len().checked_sub(n).map_or("", |i| numbers[i]);

    let mut builder = RecordBuilder::new();
    builder
        .set("name_of_issuer", caps.name("name").map_or("", |m| m.as_str()))
        .set("title_of_class", caps.name("title").map_or("", |m| m.as_str()))
        .set("cusip", caps.name("cusip").map_or("", |m| m.as_str()))
        .set("value", value)
        .set("shares_or_principal_amount", shares)
        .set("shares_or_principal_type", share_type)
        .set("put_call", put_call)
        .set("investment_discretion", &discretion.join(" "))
        .set("other_manager", from_end(4))
        .set("voting_sole", from_end(3))
        .set("voting_shared", from_end(2))
        .set("voting_none", from_end(1));
    Some(builder)
}

/// Extract holdings from the first fixed-width holdings table.
///
/// Rows are first sliced at the marker columns; if that yields nothing
/// usable, each line is re-read token by token.
pub fn extract_text_table(text: &str, policy: &RowPolicy) -> Result<ExtractedRows, ExtractError> {
    let table = locate(text).ok_or(ExtractError::TableNotFound("fixed-width text"))?;
    let mapping: Vec<Option<&'static str>> = (0..table.columns.len())
        .map(|i| COLUMNS.get(i).copied())
        .collect();

    let mut tally = policy.tally();
    for (i, line) in table.lines.iter().enumerate() {
        let cells = slice_cells(line, &table.columns);
        tally_row(&mut tally, i + 1, &cells, &mapping, true);
    }
    let positional = tally.finish();
    if positional.is_ok() {
        return positional;
    }

    let mut tally = policy.tally();
    for (i, line) in table.lines.iter().enumerate() {
        let line: String = line.iter().collect();
        let Some(builder) = parse_tokens(&line) else {
            continue;
        };
        match builder.build() {
            Ok(record) if record.is_total_row() || record.voting_total() == 0 => {}
            Ok(record) => tally.accept(record),
            Err(errors) => tally.reject(i + 1, &errors),
        }
    }
    match tally.finish() {
        Ok(rows) => Ok(rows),
        // Report the column-based failure; it reflects the declared layout.
        Err(_) => positional,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILING: &str = "\
<DOCUMENT>
<TYPE>13F-HR
<TEXT>
                         FORM 13F INFORMATION TABLE
<TABLE>
<CAPTION>
                                                   VALUE    SHARES/  SH/ PUT/ INVSTMT  OTHER     VOTING AUTHORITY
NAME OF ISSUER             TITLE OF CLASS CUSIP     (x$1000) PRN AMT  PRN CALL DSCRETN MANAGERS  SOLE     SHARED  NONE
<S>                        <C>            <C>       <C>      <C>      <C> <C>  <C>     <C>       <C>      <C>     <C>
ABBOTT LABS                COM            002824100     1250    25000 SH       SOLE              25000        0      0
AMERICAN EXPRESS CO        COM            025816109     3300    60000 SH       SOLE              60000        0      0
CISCO SYS INC              COM            17275R102      980    40000 SH       DEFINED   1              0    40000      0
-------------------------- -------------- --------- -------- --------
TOTAL                                                   5530
</TABLE>
</TEXT>
</DOCUMENT>";

    #[test]
    fn test_marker_columns() {
        let rows = extract_text_table(FILING, &RowPolicy::default()).unwrap();
        assert_eq!(rows.records.len(), 3);
        assert_eq!(rows.skipped_rows, 0);

        let abbott = &rows.records[0];
        assert_eq!(abbott.name_of_issuer, "ABBOTT LABS");
        assert_eq!(abbott.title_of_class, "COM");
        assert_eq!(abbott.cusip, "002824100");
        assert_eq!(abbott.value, 1250);
        assert_eq!(abbott.shares_or_principal_amount, 25000);
        assert_eq!(abbott.shares_or_principal_type, "SH");
        assert_eq!(abbott.investment_discretion, "SOLE");
        assert_eq!(abbott.voting_sole, 25000);

        let cisco = &rows.records[2];
        assert_eq!(cisco.investment_discretion, "DEFINED");
        assert_eq!(cisco.other_manager, "1");
        assert_eq!(cisco.voting_shared, 40000);
    }

    #[test]
    fn test_unvoted_rows_are_layout_noise() {
        let filing = FILING.replace("0    40000      0", "0        0      0");
        let rows = extract_text_table(&filing, &RowPolicy::new(0.0)).unwrap();
        assert_eq!(rows.records.len(), 2);
        assert_eq!(rows.skipped_rows, 0);
        assert!(rows.records.iter().all(|r| r.cusip != "17275R102"));
    }

    #[test]
    fn test_token_fallback() {
        let line = "\"APPLE INC   COM   037833100   1,200   5,000 SH SOLE 5,000 0 0\"";
        let record = parse_tokens(line).unwrap().build().unwrap();
        assert_eq!(record.name_of_issuer, "APPLE INC");
        assert_eq!(record.cusip, "037833100");
        assert_eq!(record.value, 1200);
        assert_eq!(record.shares_or_principal_amount, 5000);
        assert_eq!(record.shares_or_principal_type, "SH");
        assert_eq!(record.investment_discretion, "SOLE");
        assert_eq!(record.voting_sole, 5000);
        assert_eq!(record.voting_none, 0);
    }

    #[test]
    fn test_table_without_markers_is_not_found() {
        let text = "<TABLE>\nNAME OF ISSUER  CUSIP\nFOO  123\n</TABLE>";
        let err = extract_text_table(text, &RowPolicy::default()).unwrap_err();
        assert!(matches!(err, ExtractError::TableNotFound(_)));
    }
}
