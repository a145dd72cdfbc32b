//! Embedding and indexing
//!
//! The adapter boundary to the external providers:
//! - `EmbeddingProvider` converts text to fixed-length vectors (FastEmbed
//!   locally, or the deterministic hashing fallback)
//! - `VectorStore` answers approximate nearest-neighbor queries (HNSW)
//! - `KeywordStore` answers token-match queries (tantivy)
//!
//! Retry with backoff lives here, never inside strategy logic.

mod keyword_index;
mod provider;
mod vector_index;

pub use keyword_index::{KeywordIndexError, KeywordStore, TantivyKeywordIndex};
pub use provider::{
    EmbeddingError, EmbeddingProvider, FastEmbedProvider, HashingProvider, RetryingEmbedder,
};
pub use vector_index::{HnswVectorIndex, ResourceFilter, VectorHit, VectorIndexError, VectorStore};

use serde::{Deserialize, Serialize};

/// Payload stored alongside each indexed chunk
///
/// Both stores keep the full payload so query-time candidates hydrate
/// without a database round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Database row id of the chunk
    pub chunk_id: i64,
    /// Owning document id
    pub resource_id: String,
    /// Chunk text, including any overlap prefix
    pub content: String,
    /// Section title, if the chunk came from a titled section
    pub section_title: Option<String>,
    /// Unix timestamp of the chunk's creation (freshness signal)
    pub created_at: i64,
}
