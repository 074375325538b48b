//! Row-level acceptance policy for heuristic extraction.

use tracing::debug;

use super::coerce::FieldError;
use super::{ExtractError, ExtractedRows};
use crate::models::HoldingsRecord;

/// Comparison slack so that a fraction equal to the threshold is accepted
/// despite float rounding.
const EPSILON: f64 = 1e-9;

/// Decides whether a partially malformed table is still usable.
///
/// Malformed rows are dropped and counted. If the dropped fraction of
/// candidate rows exceeds `max_skipped_fraction` the whole table is rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowPolicy {
    max_skipped_fraction: f64,
}

impl Default for RowPolicy {
    fn default() -> Self {
        Self::new(0.10)
    }
}

impl RowPolicy {
    pub fn new(max_skipped_fraction: f64) -> Self {
        Self {
            max_skipped_fraction: max_skipped_fraction.clamp(0.0, 1.0),
        }
    }

    pub fn max_skipped_fraction(&self) -> f64 {
        self.max_skipped_fraction
    }

    pub fn tally(&self) -> RowTally {
        RowTally {
            policy: *self,
            records: Vec::new(),
            skipped: 0,
        }
    }
}

/// Accumulates row results for one table.
#[derive(Debug)]
pub struct RowTally {
    policy: RowPolicy,
    records: Vec<HoldingsRecord>,
    skipped: usize,
}

impl RowTally {
    pub fn accept(&mut self, record: HoldingsRecord) {
        self.records.push(record);
    }

    pub fn reject(&mut self, row: usize, errors: &[FieldError]) {
        let fields: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        debug!("Skipping row {}: {}", row, fields.join(", "));
        self.skipped += 1;
    }

    pub fn candidates(&self) -> usize {
        self.records.len() + self.skipped
    }

    pub fn finish(self) -> Result<ExtractedRows, ExtractError> {
        let expected = self.candidates();
        if expected == 0 || self.records.is_empty() {
            return Err(ExtractError::NoRows);
        }

        let fraction = self.skipped as f64 / expected as f64;
        if fraction > self.policy.max_skipped_fraction + EPSILON {
            return Err(ExtractError::TooManySkipped {
                skipped: self.skipped,
                expected,
                threshold: self.policy.max_skipped_fraction,
            });
        }

        Ok(ExtractedRows {
            records: self.records,
            skipped_rows: self.skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(policy: RowPolicy, good: usize, bad: usize) -> Result<ExtractedRows, ExtractError> {
        let mut tally = policy.tally();
        for _ in 0..good {
            tally.accept(HoldingsRecord::default());
        }
        for i in 0..bad {
            tally.reject(i, &[]);
        }
        tally.finish()
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let rows = run(RowPolicy::new(0.10), 9, 1).unwrap();
        assert_eq!(rows.records.len(), 9);
        assert_eq!(rows.skipped_rows, 1);
    }

    #[test]
    fn test_one_row_over_threshold_fails() {
        let err = run(RowPolicy::new(0.10), 8, 2).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::TooManySkipped {
                skipped: 2,
                expected: 10,
                ..
            }
        ));
    }

    #[test]
    fn test_inexact_fractions() {
        // 0.3 is not exactly representable; 3 of 10 must still pass.
        assert!(run(RowPolicy::new(0.3), 7, 3).is_ok());
        assert!(run(RowPolicy::new(0.3), 6, 4).is_err());
    }

    #[test]
    fn test_empty_table_is_rejected() {
        assert!(matches!(run(RowPolicy::default(), 0, 0), Err(ExtractError::NoRows)));
        assert!(matches!(run(RowPolicy::new(1.0), 0, 3), Err(ExtractError::NoRows)));
    }
}
