//! Storage layer for Quarry
//!
//! Content-addressed blob storage for original document text and structured
//! database access for documents and chunks.

pub mod blob;
pub mod database;

use crate::error::{QuarryError, Result};
use std::path::PathBuf;

pub use blob::BlobStore;
pub use database::{ChunkRecord, Database, DbPool, DbStats, DocumentRecord};

/// Storage manager that coordinates blob and database storage
pub struct StorageManager {
    pub blob_store: BlobStore,
    pub database: Database,
    base_path: PathBuf,
}

impl StorageManager {
    /// Create a new storage manager
    pub fn new(base_path: PathBuf, compression_threshold: usize) -> Result<Self> {
        let store = base_path.join("store");

        for dir in [
            store.clone(),
            store.join("vectors"),
            store.join("keywords"),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| QuarryError::Io {
                source: e,
                context: format!("Failed to create storage directory: {}", dir.display()),
            })?;
        }

        let blob_store = BlobStore::new(store.clone(), compression_threshold)?;

        let db_path = store.join("db.sqlite");
        let database = Database::new(&db_path)?;

        Ok(Self {
            blob_store,
            database,
            base_path,
        })
    }

    /// Root of internal, rebuildable data
    pub fn store_dir(&self) -> PathBuf {
        self.base_path.join("store")
    }

    /// Directory for vector index files
    pub fn vectors_dir(&self) -> PathBuf {
        self.store_dir().join("vectors")
    }

    /// Directory for the keyword index
    pub fn keywords_dir(&self) -> PathBuf {
        self.store_dir().join("keywords")
    }

    /// Get combined storage statistics
    pub fn stats(&self) -> Result<DbStats> {
        self.database.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storage_manager_creates_layout() {
        let temp = TempDir::new().unwrap();
        let storage = StorageManager::new(temp.path().to_path_buf(), 1024).unwrap();

        assert!(storage.store_dir().exists());
        assert!(storage.vectors_dir().exists());
        assert!(storage.keywords_dir().exists());
        assert!(storage.store_dir().join("db.sqlite").exists());
    }
}
