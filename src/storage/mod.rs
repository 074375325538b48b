//! Artifact persistence: the storage collaborator, artifact encoding, and
//! the inventory of accessions already persisted.

mod artifact;
mod inventory;
mod local;

pub use artifact::{
    accession_from_key, artifact_key, decode_artifact, encode_artifact, sha256_hex,
    ARTIFACT_COLUMNS,
};
pub use inventory::{load_inventory, read_inventory_file, write_inventory_file};
pub use local::LocalArtifactStore;

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{AccessionId, FailureKind};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid destination key: {0}")]
    InvalidKey(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Upload failed: {0}")]
    Upload(String),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> FailureKind {
        FailureKind::Persistence
    }

    /// Bad keys and missing artifacts will not change on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidKey(_) | Self::NotFound(_))
    }
}

/// Durable artifact storage.
///
/// One artifact per accession, addressed by a destination key under a fixed
/// prefix. Writes to the same key replace the previous bytes.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Accessions that already have a persisted artifact.
    async fn list_inventory(&self) -> Result<HashSet<AccessionId>, StorageError>;

    async fn upload(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Logical prefix all artifact keys live under.
    fn prefix(&self) -> &str;
}
