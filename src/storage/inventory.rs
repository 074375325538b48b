//! Inventory snapshot file.
//!
//! A one-column CSV (`accession`) caching the set of persisted accessions
//! between runs, so a run can skip listing the store.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ArtifactStore, StorageError};
use crate::models::AccessionId;

#[derive(Debug, Serialize, Deserialize)]
struct InventoryRow {
    accession: AccessionId,
}

pub fn read_inventory_file(path: &Path) -> Result<HashSet<AccessionId>, StorageError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut inventory = HashSet::new();
    for row in reader.deserialize::<InventoryRow>() {
        inventory.insert(row?.accession);
    }
    Ok(inventory)
}

/// Write ids sorted, so the file is stable across runs.
pub fn write_inventory_file(
    path: &Path,
    inventory: &HashSet<AccessionId>,
) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let mut ids: Vec<&AccessionId> = inventory.iter().collect();
    ids.sort();

    let mut writer = csv::Writer::from_path(path)?;
    for id in ids {
        writer.serialize(InventoryRow {
            accession: id.clone(),
        })?;
    }
    writer.flush().map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

/// Load the inventory snapshot for a run.
///
/// With `refresh`, the store is listed and the cache file rewritten.
/// Otherwise the cache file is read; a missing file is an empty inventory.
pub async fn load_inventory(
    store: &dyn ArtifactStore,
    cache: &Path,
    refresh: bool,
) -> Result<HashSet<AccessionId>, StorageError> {
    if refresh {
        let inventory = store.list_inventory().await?;
        write_inventory_file(cache, &inventory)?;
        info!(
            "Inventory refreshed: {} accessions -> {}",
            inventory.len(),
            cache.display()
        );
        return Ok(inventory);
    }

    if !cache.exists() {
        warn!(
            "Inventory file {} not found; treating every accession as new",
            cache.display()
        );
        return Ok(HashSet::new());
    }

    let inventory = read_inventory_file(cache)?;
    info!("Inventory loaded: {} accessions", inventory.len());
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Accession;
    use crate::storage::{artifact_key, LocalArtifactStore};

    #[tokio::test]
    async fn test_refresh_writes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path().join("store"), "holdings");
        for id in ["0000950123-24-000002", "0000950123-24-000001"] {
            let acc = Accession::new(id, "1067983", "2024-03-31");
            store
                .upload(&artifact_key(store.prefix(), &acc), b"x")
                .await
                .unwrap();
        }

        let cache = dir.path().join("run/inventory.csv");
        let inventory = load_inventory(&store, &cache, true).await.unwrap();
        assert_eq!(inventory.len(), 2);

        let text = std::fs::read_to_string(&cache).unwrap();
        assert_eq!(
            text,
            "accession\n0000950123-24-000001\n0000950123-24-000002\n"
        );

        let cached = load_inventory(&store, &cache, false).await.unwrap();
        assert_eq!(cached, inventory);
    }

    #[tokio::test]
    async fn test_missing_cache_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path(), "holdings");
        let inventory = load_inventory(&store, &dir.path().join("none.csv"), false)
            .await
            .unwrap();
        assert!(inventory.is_empty());
    }
}
