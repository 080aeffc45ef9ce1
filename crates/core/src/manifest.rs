//! Id-sequence manifest stored alongside each collection file.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::StorageError, models::RecordId, storage::file::write_file};

/// Counter state persisted next to a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionManifest {
    /// Next id the sequence hands out.
    pub next_id: RecordId,
    /// When the collection was last written.
    pub updated_at: Option<DateTime<Utc>>,
}

impl CollectionManifest {
    /// Manifest for a collection whose sequence continues at `next_id`.
    pub fn new(next_id: RecordId) -> Self {
        Self {
            next_id,
            updated_at: Some(Utc::now()),
        }
    }

    /// Load the manifest at `path`, returning `None` if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>, StorageError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path).map_err(|source| StorageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = serde_json::from_str(&contents).map_err(|source| StorageError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(manifest))
    }

    /// Persist the manifest to `path`.
    pub fn persist(&self, path: impl AsRef<Path>, atomic: bool) -> Result<(), StorageError> {
        let path = path.as_ref();
        let serialized = serde_json::to_vec_pretty(self).map_err(|source| StorageError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        write_file(path, &serialized, atomic)
    }
}

/// Manifest location for a collection file: `hoteles.json` becomes
/// `hoteles.manifest.json`.
pub fn manifest_path(collection_path: impl AsRef<Path>) -> PathBuf {
    collection_path.as_ref().with_extension("manifest.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn manifest_sits_next_to_collection() {
        let path = manifest_path("/data/hoteles.json");
        assert_eq!(path, PathBuf::from("/data/hoteles.manifest.json"));
    }

    #[test]
    fn missing_manifest_loads_as_none() -> anyhow::Result<()> {
        let dir = tempdir()?;
        assert!(CollectionManifest::load(dir.path().join("none.manifest.json"))?.is_none());
        Ok(())
    }

    #[test]
    fn persists_and_reloads() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("clientes.manifest.json");
        let manifest = CollectionManifest::new(7);
        manifest.persist(&path, true)?;
        assert_eq!(CollectionManifest::load(&path)?, Some(manifest));
        Ok(())
    }
}
