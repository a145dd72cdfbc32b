//! Configuration management for Quarry
//!
//! Handles loading, validation, and persistence of the engine configuration.
//! All scoring constants (fusion bonus, rerank weights, diversity cap) live
//! here as tunable defaults rather than hard-coded values.

use crate::error::{QuarryError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub segmenter: SegmenterConfig,
    pub embedding: EmbeddingConfig,
    pub indexing: IndexingConfig,
    pub retrieval: RetrievalConfig,
    pub fusion: FusionConfig,
    pub rerank: RerankConfig,
    pub cache: CacheConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Blobs at or above this size are zstd-compressed
    pub compression_threshold: usize,
}

/// Segmenter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Maximum chunk size in characters
    pub max_chunk_size: usize,
    /// Overlap prefix length in characters
    pub overlap_size: usize,
    /// Overlap is capped at this fraction of the previous chunk's length
    pub overlap_ratio: f32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 4000,
            overlap_size: 200,
            overlap_ratio: 0.15,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name (e.g., "all-MiniLM-L6-v2")
    pub model: String,
    /// Batch size for ingestion-time embedding
    pub batch_size: usize,
    /// Retries for transient provider failures
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries
    pub retry_base_delay_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            batch_size: 32,
            max_retries: 3,
            retry_base_delay_ms: 100,
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Vector dimension (must match embedding dimension)
    pub vector_dim: usize,
    /// HNSW construction parameter (higher = better recall, slower build)
    pub hnsw_ef_construction: usize,
    /// HNSW M parameter (number of connections per layer)
    pub hnsw_m: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            vector_dim: 384,
            hnsw_ef_construction: 200,
            hnsw_m: 16,
        }
    }
}

/// Retrieval orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Each strategy returns up to candidate_multiplier * top_k candidates
    pub candidate_multiplier: usize,
    /// Per-query bound on strategy execution time
    pub strategy_timeout_ms: u64,
    /// HNSW search parameter (higher = better recall, slower search)
    pub hnsw_ef_search: usize,
    /// Minimum token length for concept extraction
    pub min_concept_len: usize,
    /// Maximum number of concept terms per query
    pub max_concepts: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_multiplier: 2,
            strategy_timeout_ms: 5000,
            hnsw_ef_search: 50,
            min_concept_len: 5,
            max_concepts: 3,
        }
    }
}

/// Fusion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Multiplicative bonus per extra contributing strategy
    pub consensus_bonus: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            consensus_bonus: 0.1,
        }
    }
}

/// Reranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    pub similarity_weight: f32,
    pub quality_weight: f32,
    pub freshness_weight: f32,
    pub preference_weight: f32,
    /// Hard cap on entries per resource in the final list
    pub max_per_resource: usize,
    /// Diversity cap applies only above this result-set size
    pub min_results_for_diversity: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            similarity_weight: 0.4,
            quality_weight: 0.3,
            freshness_weight: 0.2,
            preference_weight: 0.1,
            max_per_resource: 3,
            min_results_for_diversity: 5,
        }
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    /// TTL for cached responses
    pub ttl_secs: u64,
    /// Bounded capacity; oldest entries are evicted first
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
            max_entries: 1024,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(QuarryError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| QuarryError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| QuarryError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| QuarryError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Build a default configuration rooted at the given data directory
    pub fn default_at(data_dir: PathBuf) -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir,
                compression_threshold: 1024,
            },
            segmenter: SegmenterConfig::default(),
            embedding: EmbeddingConfig::default(),
            indexing: IndexingConfig::default(),
            retrieval: RetrievalConfig::default(),
            fusion: FusionConfig::default(),
            rerank: RerankConfig::default(),
            cache: CacheConfig::default(),
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(data_dir) = std::env::var("QUARRY_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(model) = std::env::var("QUARRY_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Ok(timeout) = std::env::var("QUARRY_STRATEGY_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.retrieval.strategy_timeout_ms = ms;
            }
        }
        if let Ok(enabled) = std::env::var("QUARRY_CACHE_ENABLED") {
            self.cache.enabled = enabled == "1" || enabled.eq_ignore_ascii_case("true");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default_at(PathBuf::from("/tmp/quarry"));
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let config = Config::default_at(temp.path().join("data"));
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.segmenter.max_chunk_size, 4000);
        assert_eq!(loaded.segmenter.overlap_size, 200);
        assert_eq!(loaded.rerank.max_per_resource, 3);
        assert_eq!(loaded.cache.ttl_secs, 300);
    }

    #[test]
    fn test_missing_config_file() {
        let result = Config::load(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(QuarryError::ConfigNotFound { .. })));
    }
}
