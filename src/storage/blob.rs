//! Content-addressed storage for original document text
//!
//! Documents are stored by BLAKE3 hash so re-ingesting identical text is
//! deduplicated, and chunk offsets always have a source to map back into.

use crate::error::{QuarryError, Result};
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Content-addressed blob storage
pub struct BlobStore {
    base_path: PathBuf,
    compression_threshold: usize,
}

impl BlobStore {
    /// Create a new blob store at the given base path
    pub fn new(base_path: PathBuf, compression_threshold: usize) -> Result<Self> {
        let blobs_dir = base_path.join("blobs");
        fs::create_dir_all(&blobs_dir).map_err(|e| QuarryError::Io {
            source: e,
            context: format!("Failed to create blobs directory: {}", blobs_dir.display()),
        })?;

        Ok(Self {
            base_path,
            compression_threshold,
        })
    }

    /// Write data to blob storage, returning (hash, was_compressed, was_new)
    pub fn write(&self, data: &[u8]) -> Result<(String, bool, bool)> {
        let hash = self.hash_data(data);

        let blob_path = self.blob_path(&hash);
        if blob_path.exists() {
            return Ok((hash, false, false));
        }

        let should_compress = data.len() >= self.compression_threshold;

        // Write to a temporary file first, then rename (atomic write)
        let temp_path = self.temp_path(&hash);
        let parent = temp_path
            .parent()
            .ok_or_else(|| QuarryError::Config("Invalid blob path".to_string()))?;
        fs::create_dir_all(parent).map_err(|e| QuarryError::Io {
            source: e,
            context: format!("Failed to create blob directory: {}", parent.display()),
        })?;

        let mut file = fs::File::create(&temp_path).map_err(|e| QuarryError::Io {
            source: e,
            context: format!("Failed to create temp blob file: {}", temp_path.display()),
        })?;

        if should_compress {
            let compressed = zstd::encode_all(data, 3).map_err(|e| QuarryError::Io {
                source: e,
                context: "Failed to compress blob data".to_string(),
            })?;
            file.write_all(&compressed).map_err(|e| QuarryError::Io {
                source: e,
                context: format!("Failed to write compressed blob: {}", temp_path.display()),
            })?;
        } else {
            file.write_all(data).map_err(|e| QuarryError::Io {
                source: e,
                context: format!("Failed to write blob data: {}", temp_path.display()),
            })?;
        }

        file.sync_all().map_err(|e| QuarryError::Io {
            source: e,
            context: format!("Failed to sync blob file: {}", temp_path.display()),
        })?;
        drop(file);

        fs::rename(&temp_path, &blob_path).map_err(|e| QuarryError::Io {
            source: e,
            context: format!(
                "Failed to rename temp blob to final location: {} -> {}",
                temp_path.display(),
                blob_path.display()
            ),
        })?;

        Ok((hash, should_compress, true))
    }

    /// Store a document's original text, returning its content hash
    pub fn write_text(&self, text: &str) -> Result<String> {
        let (hash, _, _) = self.write(text.as_bytes())?;
        Ok(hash)
    }

    /// Read data from blob storage
    pub fn read(&self, hash: &str) -> Result<Vec<u8>> {
        let blob_path = self.blob_path(hash);

        if !blob_path.exists() {
            return Err(QuarryError::Config(format!("Blob not found: {}", hash)));
        }

        let mut file = fs::File::open(&blob_path).map_err(|e| QuarryError::Io {
            source: e,
            context: format!("Failed to open blob file: {}", blob_path.display()),
        })?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).map_err(|e| QuarryError::Io {
            source: e,
            context: format!("Failed to read blob data: {}", blob_path.display()),
        })?;

        // Try to decompress (if it fails, assume it wasn't compressed)
        match zstd::decode_all(&data[..]) {
            Ok(decompressed) => Ok(decompressed),
            Err(_) => Ok(data),
        }
    }

    /// Read a document's original text back
    pub fn read_text(&self, hash: &str) -> Result<String> {
        let data = self.read(hash)?;
        String::from_utf8(data)
            .map_err(|e| QuarryError::Config(format!("Blob {} is not valid UTF-8: {}", hash, e)))
    }

    /// Check if a blob exists
    pub fn exists(&self, hash: &str) -> bool {
        self.blob_path(hash).exists()
    }

    /// Get the on-disk size of a blob
    pub fn size(&self, hash: &str) -> Result<u64> {
        let blob_path = self.blob_path(hash);
        let metadata = fs::metadata(&blob_path).map_err(|e| QuarryError::Io {
            source: e,
            context: format!("Failed to get blob metadata: {}", blob_path.display()),
        })?;
        Ok(metadata.len())
    }

    /// Hash data using BLAKE3
    fn hash_data(&self, data: &[u8]) -> String {
        let hash = blake3::hash(data);
        // Use 32 hex characters (16 bytes) for reasonable uniqueness
        format!("{:.32}", hash.to_hex())
    }

    /// Get the path for a blob given its hash
    /// Uses two-level sharding: blobs/ab/cd/abcdef123456...
    fn blob_path(&self, hash: &str) -> PathBuf {
        let shard1 = &hash[0..2];
        let shard2 = &hash[2..4];
        self.base_path
            .join("blobs")
            .join(shard1)
            .join(shard2)
            .join(hash)
    }

    fn temp_path(&self, hash: &str) -> PathBuf {
        let shard1 = &hash[0..2];
        let shard2 = &hash[2..4];
        self.base_path
            .join("blobs")
            .join(shard1)
            .join(shard2)
            .join(format!("{}.tmp", hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(temp.path().to_path_buf(), 1024).unwrap();

        let text = "A short document. It has two sentences.";
        let hash = store.write_text(text).unwrap();

        assert_eq!(hash.len(), 32);
        assert!(store.exists(&hash));
        assert_eq!(store.read_text(&hash).unwrap(), text);
    }

    #[test]
    fn test_identical_content_is_deduplicated() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(temp.path().to_path_buf(), 1024).unwrap();

        let (hash1, _, new1) = store.write(b"same content").unwrap();
        let (hash2, _, new2) = store.write(b"same content").unwrap();

        assert_eq!(hash1, hash2);
        assert!(new1);
        assert!(!new2);
    }

    #[test]
    fn test_large_text_is_compressed() {
        let temp = TempDir::new().unwrap();
        let store = BlobStore::new(temp.path().to_path_buf(), 1024).unwrap();

        let text = "Repeated sentence for compression. ".repeat(200);
        let (hash, compressed, _) = store.write(text.as_bytes()).unwrap();

        assert!(compressed);
        assert!(store.size(&hash).unwrap() < text.len() as u64);
        assert_eq!(store.read_text(&hash).unwrap(), text);
    }
}
