//! Dedup gate.

use std::collections::HashSet;

use crate::models::{Accession, AccessionId};

/// True iff the accession has no persisted artifact in the inventory snapshot.
pub fn should_process(accession: &Accession, inventory: &HashSet<AccessionId>) -> bool {
    !inventory.contains(&accession.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_process() {
        let done = Accession::new("0000950123-24-000001", "1", "2024-03-31");
        let fresh = Accession::new("0000950123-24-000002", "1", "2024-03-31");
        let inventory: HashSet<AccessionId> = [done.id.clone()].into_iter().collect();

        assert!(!should_process(&done, &inventory));
        assert!(should_process(&fresh, &inventory));
        assert!(should_process(&done, &HashSet::new()));
    }
}
