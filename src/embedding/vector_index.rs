/// Vector store trait and HNSW implementation
use super::ChunkPayload;
use hnsw_rs::prelude::*;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}

/// A nearest-neighbor hit: id, raw distance, and the stored payload
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: u64,
    /// Distance as reported by the index (lower is closer); similarity
    /// conversion is the caller's concern
    pub distance: f32,
    pub payload: ChunkPayload,
}

/// Resource-level allow-list filter applied to payloads
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    pub resource_ids: Vec<String>,
}

impl ResourceFilter {
    pub fn matches(&self, payload: &ChunkPayload) -> bool {
        self.resource_ids.is_empty() || self.resource_ids.contains(&payload.resource_id)
    }
}

/// Contract for approximate nearest-neighbor stores
///
/// Stores (id, vector, payload) triples. Any real vector database can stand
/// behind this trait without the orchestrator changing.
pub trait VectorStore: Send + Sync {
    fn insert(&self, id: u64, vector: &[f32], payload: ChunkPayload)
        -> Result<(), VectorIndexError>;

    fn search(
        &self,
        query: &[f32],
        top_k: usize,
        ef_search: usize,
        filter: Option<&ResourceFilter>,
    ) -> Result<Vec<VectorHit>, VectorIndexError>;

    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// HNSW-backed vector store
///
/// Approximate nearest neighbor search over cosine distance. Payloads are
/// kept alongside the graph so hits hydrate without a database round-trip.
pub struct HnswVectorIndex {
    index: RwLock<Hnsw<'static, f32, DistCosine>>,
    payloads: RwLock<ahash::HashMap<u64, ChunkPayload>>,
    dimension: usize,
}

impl HnswVectorIndex {
    /// Create a new index
    ///
    /// # Arguments
    /// * `dimension` - Vector dimension (must match embedding dimension)
    /// * `ef_construction` - HNSW construction parameter (higher = better recall, slower build)
    /// * `m` - HNSW M parameter (number of connections per layer)
    pub fn new(dimension: usize, ef_construction: usize, m: usize) -> Self {
        let index = Hnsw::<f32, DistCosine>::new(
            m,
            dimension,
            ef_construction,
            200, // max_nb_connection
            DistCosine,
        );

        Self {
            index: RwLock::new(index),
            payloads: RwLock::new(ahash::HashMap::default()),
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

impl VectorStore for HnswVectorIndex {
    fn insert(
        &self,
        id: u64,
        vector: &[f32],
        payload: ChunkPayload,
    ) -> Result<(), VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let data = vector.to_vec();

        let index = self.index.write().unwrap();
        index.insert((&data, id as usize));
        drop(index);

        self.payloads.write().unwrap().insert(id, payload);

        Ok(())
    }

    fn search(
        &self,
        query: &[f32],
        top_k: usize,
        ef_search: usize,
        filter: Option<&ResourceFilter>,
    ) -> Result<Vec<VectorHit>, VectorIndexError> {
        if query.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        // Oversample when filtering so the allow-list still fills top_k
        let fetch = match filter {
            Some(_) => top_k * 4,
            None => top_k,
        };

        let index = self.index.read().unwrap();
        let neighbors = index.search(query, fetch, ef_search);
        drop(index);

        let payloads = self.payloads.read().unwrap();

        let mut hits = Vec::new();
        for neighbor in neighbors {
            let id = neighbor.d_id as u64;
            let Some(payload) = payloads.get(&id) else {
                continue;
            };

            if let Some(f) = filter {
                if !f.matches(payload) {
                    continue;
                }
            }

            hits.push(VectorHit {
                id,
                distance: neighbor.distance,
                payload: payload.clone(),
            });

            if hits.len() >= top_k {
                break;
            }
        }

        Ok(hits)
    }

    fn len(&self) -> u64 {
        self.payloads.read().unwrap().len() as u64
    }
}
