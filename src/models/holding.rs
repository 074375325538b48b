//! One row of a 13F information table.

use serde::{Deserialize, Serialize};

/// A normalized holdings row.
///
/// The field set is fixed and shared by every extraction tier. Fields the
/// source does not provide hold their null-equivalent (`""` or `0`) rather
/// than being dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HoldingsRecord {
    pub name_of_issuer: String,
    pub title_of_class: String,
    /// CUSIP-like security identifier.
    pub cusip: String,
    pub figi: String,
    /// Market value, in the filing's own units (see `value_multiplier`).
    pub value: u64,
    pub shares_or_principal_amount: u64,
    /// `SH` or `PRN`.
    pub shares_or_principal_type: String,
    /// `PUT`, `CALL` or empty.
    pub put_call: String,
    /// `SOLE`, `DFND` or `OTR`.
    pub investment_discretion: String,
    pub other_manager: String,
    pub voting_sole: u64,
    pub voting_shared: u64,
    pub voting_none: u64,
}

impl HoldingsRecord {
    /// Column names in artifact order.
    pub const FIELDS: [&'static str; 13] = [
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

    /// Numeric fields (must be non-negative integers).
    pub const NUMERIC_FIELDS: [&'static str; 5] = [
        "value",
        "shares_or_principal_amount",
        "voting_sole",
        "voting_shared",
        "voting_none",
    ];

    pub fn voting_total(&self) -> u64 {
        self.voting_sole
            .saturating_add(self.voting_shared)
            .saturating_add(self.voting_none)
    }

    /// Summary rows (`TOTAL`, `Grand Total`) are layout, not holdings.
    pub fn is_total_row(&self) -> bool {
        let name = self.name_of_issuer.trim().to_lowercase();
        name == "total" || name == "grand total" || name.starts_with("total ")
    }
}
