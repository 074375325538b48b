//! Plain-text projection of raw filings for model-backed extraction, and
//! document-level markers such as the value unit.

use std::sync::LazyLock;

use regex::Regex;

static VALUE_MULTIPLIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"x\$(\d+)").unwrap());

static ANY_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table[^>]*>(.*?)</table\s*>").unwrap());

static ROW_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</tr\s*>").unwrap());

static CELL_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</t[dh]\s*>").unwrap());

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>|</p\s*>|</div\s*>").unwrap());

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n[ \t]*(\n[ \t]*)+").unwrap());

/// Unit of the reported `value` column: `x$N` gives N, `[thousands]` gives
/// 1000, otherwise values are in dollars.
pub fn value_multiplier(text: &str) -> u32 {
    if let Some(n) = VALUE_MULTIPLIER
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
    {
        return n;
    }
    if text.to_lowercase().contains("[thousands]") {
        return 1000;
    }
    1
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace('\u{a0}', " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Strip markup while keeping table layout readable.
///
/// HTML rows become lines with ` | ` between cells; fixed-width text keeps
/// its spacing. Runs of blank lines collapse to one.
pub fn project_text(raw: &str) -> String {
    let text = ROW_END.replace_all(raw, "\n");
    let text = CELL_END.replace_all(&text, " | ");
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, "");
    let text = decode_entities(&text);
    let text: String = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUN.replace_all(&text, "\n\n").trim().to_string()
}

fn mentions_holdings(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("issuer") || lower.contains("cusip")
}

/// Split a document into table-sized chunks for the model.
///
/// Each table block that mentions issuers or CUSIPs becomes one chunk. A
/// document without tables is sent whole if it mentions either; otherwise
/// there is nothing to extract.
pub fn model_chunks(raw: &str) -> Vec<String> {
    let mut saw_table = false;
    let mut chunks = Vec::new();
    for caps in ANY_TABLE.captures_iter(raw) {
        saw_table = true;
        let Some(block) = caps.get(1) else {
            continue;
        };
        if mentions_holdings(block.as_str()) {
            let projected = project_text(block.as_str());
            if !projected.is_empty() {
                chunks.push(projected);
            }
        }
    }

    if !saw_table && mentions_holdings(raw) {
        let projected = project_text(raw);
        if !projected.is_empty() {
            chunks.push(projected);
        }
    }
    chunks
}

/// Truncate to at most `max_chars` characters, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_multiplier() {
        assert_eq!(value_multiplier("VALUE (x$1000)"), 1000);
        assert_eq!(value_multiplier("VALUE (X$1000)"), 1);
        assert_eq!(value_multiplier("Market Value [thousands]"), 1000);
        assert_eq!(value_multiplier("VALUE (to the nearest dollar)"), 1);
    }

    #[test]
    fn test_project_html_table() {
        let html = "<table><tr><th>Name of Issuer</th><th>CUSIP</th></tr>\
                    <tr><td>APPLE&nbsp;INC</td><td>037833100</td></tr></table>";
        let text = project_text(html);
        assert_eq!(text, "Name of Issuer | CUSIP |\nAPPLE INC | 037833100 |");
    }

    #[test]
    fn test_project_keeps_fixed_width_spacing() {
        let raw = "<TABLE>\n<S>     <C>\nAPPLE INC    037833100\n\n\n\nTOTAL\n</TABLE>";
        let text = project_text(raw);
        assert_eq!(text, "APPLE INC    037833100\n\nTOTAL");
    }

    #[test]
    fn test_model_chunks_per_table() {
        let raw = "<TABLE>cover page</TABLE>\n<TABLE>NAME OF ISSUER\nAPPLE</TABLE>\n<table border=1><tr><td>CUSIP</td></tr></table>";
        let chunks = model_chunks(raw);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "NAME OF ISSUER\nAPPLE");
        assert_eq!(chunks[1], "CUSIP |");
    }

    #[test]
    fn test_model_chunks_whole_document() {
        assert_eq!(model_chunks("Issuer: APPLE INC cusip 037833100").len(), 1);
        assert!(model_chunks("nothing relevant").is_empty());
        assert!(model_chunks("<TABLE>cover</TABLE> issuer").is_empty());
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }
}
