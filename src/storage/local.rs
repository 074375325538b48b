//! Artifact store backed by a local directory.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{accession_from_key, ArtifactStore, StorageError};
use crate::models::AccessionId;

/// Stores artifacts as files under `root`, one file per destination key.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
    prefix: String,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>, prefix: &str) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path under the root, rejecting escapes.
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key.trim_start_matches('/'));
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn list_inventory(&self) -> Result<HashSet<AccessionId>, StorageError> {
        let base = if self.prefix.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&self.prefix)
        };

        let mut inventory = HashSet::new();
        if !tokio::fs::try_exists(&base)
            .await
            .map_err(|e| StorageError::io(&base, e))?
        {
            return Ok(inventory);
        }

        let mut pending = vec![base];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| StorageError::io(&dir, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::io(&dir, e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StorageError::io(&path, e))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Some(id) = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(accession_from_key)
                {
                    inventory.insert(id);
                }
            }
        }

        debug!("{} artifacts under {}", inventory.len(), self.root.display());
        Ok(inventory)
    }

    async fn upload(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }

        // Write then rename so readers never see a partial artifact.
        let tmp = path.with_extension("csv.partial");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StorageError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Accession;
    use crate::storage::artifact_key;

    #[tokio::test]
    async fn test_upload_download_and_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path(), "holdings");
        let acc = Accession::new("0000950123-24-000001", "1067983", "2024-03-31");
        let key = artifact_key(store.prefix(), &acc);

        store.upload(&key, b"a,b\n").await.unwrap();
        store.upload(&key, b"a,b\n1,2\n").await.unwrap();
        assert_eq!(store.download(&key).await.unwrap(), b"a,b\n1,2\n");

        let inventory = store.list_inventory().await.unwrap();
        assert_eq!(inventory.len(), 1);
        assert!(inventory.contains(&acc.id));
    }

    #[tokio::test]
    async fn test_missing_root_is_empty_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path().join("absent"), "holdings");
        assert!(store.list_inventory().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path(), "holdings");
        assert!(matches!(
            store.upload("../outside.csv", b"x").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.download("holdings/none.csv").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
