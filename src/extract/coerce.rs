//! Cell text to typed field coercion.

use std::fmt;

use crate::models::HoldingsRecord;

/// A single field that could not be coerced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub value: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.field, self.value)
    }
}

/// Parse a non-negative integer amount as printed in filings.
///
/// Thousands separators, `$` and whitespace are ignored. Empty cells and
/// dash/equals placeholders are zero. Integral decimals (`1,200.00`) are
/// accepted; fractional or negative values are not.
pub fn parse_amount(raw: &str) -> Option<u64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '$') && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '-' || c == '=') {
        return Some(0);
    }

    if let Ok(n) = cleaned.parse::<u64>() {
        return Some(n);
    }

    let (whole, frac) = cleaned.split_once('.')?;
    if whole.is_empty() || !frac.chars().all(|c| c == '0') {
        return None;
    }
    whole.parse::<u64>().ok()
}

/// Normalize string cell content: trim and collapse internal whitespace.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds one [`HoldingsRecord`] from loosely typed cells, collecting every
/// field that fails coercion instead of stopping at the first.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    record: HoldingsRecord,
    errors: Vec<FieldError>,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field by its canonical name. Unknown names are ignored.
    pub fn set(&mut self, field: &str, raw: &str) -> &mut Self {
        match field {
            "name_of_issuer" => self.record.name_of_issuer = clean_text(raw),
            "title_of_class" => self.record.title_of_class = clean_text(raw),
            "cusip" => self.record.cusip = clean_text(raw),
            "figi" => self.record.figi = clean_text(raw),
            "shares_or_principal_type" => self.record.shares_or_principal_type = clean_text(raw),
            "put_call" => self.record.put_call = clean_text(raw),
            "investment_discretion" => self.record.investment_discretion = clean_text(raw),
            "other_manager" => self.record.other_manager = clean_text(raw),
            "value" => {
                let n = self.amount("value", raw);
                self.record.value = n;
            }
            "shares_or_principal_amount" => {
                let n = self.amount("shares_or_principal_amount", raw);
                self.record.shares_or_principal_amount = n;
            }
            "voting_sole" => {
                let n = self.amount("voting_sole", raw);
                self.record.voting_sole = n;
            }
            "voting_shared" => {
                let n = self.amount("voting_shared", raw);
                self.record.voting_shared = n;
            }
            "voting_none" => {
                let n = self.amount("voting_none", raw);
                self.record.voting_none = n;
            }
            _ => {}
        }
        self
    }

    fn amount(&mut self, field: &'static str, raw: &str) -> u64 {
        match parse_amount(raw) {
            Some(n) => n,
            None => {
                self.errors.push(FieldError {
                    field,
                    value: raw.trim().to_string(),
                });
                0
            }
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn build(self) -> Result<HoldingsRecord, Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(self.record)
        } else {
            Err(self.errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234"), Some(1234));
        assert_eq!(parse_amount(" $ 5,000 "), Some(5000));
        assert_eq!(parse_amount("1200.00"), Some(1200));
        assert_eq!(parse_amount(""), Some(0));
        assert_eq!(parse_amount("-"), Some(0));
        assert_eq!(parse_amount("-----"), Some(0));
        assert_eq!(parse_amount("12.5"), None);
        assert_eq!(parse_amount("-5"), None);
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_amount(".00"), None);
    }

    #[test]
    fn test_builder_collects_all_field_errors() {
        let mut builder = RecordBuilder::new();
        builder
            .set("name_of_issuer", "  APPLE   INC ")
            .set("value", "abc")
            .set("voting_sole", "x")
            .set("voting_none", "10");
        assert!(builder.has_errors());
        let errors = builder.build().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["value", "voting_sole"]);
    }

    #[test]
    fn test_builder_defaults_missing_fields() {
        let mut builder = RecordBuilder::new();
        builder.set("name_of_issuer", "APPLE INC").set("cusip", "037833100");
        let record = builder.build().unwrap();
        assert_eq!(record.name_of_issuer, "APPLE INC");
        assert_eq!(record.value, 0);
        assert_eq!(record.figi, "");
    }
}
