//! Ingestion pipeline
//!
//! Document text flows through: blob store (original text) → segmenter →
//! database (chunk rows, new generation) → embedding (batched) → vector and
//! keyword indexes. Chunks of one document are always processed in index
//! order; parallelism belongs across documents, never within one.

use crate::embedding::{ChunkPayload, KeywordStore, RetryingEmbedder, VectorStore};
use crate::error::Result;
use crate::segmenter::Segmenter;
use crate::storage::StorageManager;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one document ingestion
#[derive(Debug)]
pub struct IngestReport {
    pub document_id: String,
    pub chunks: usize,
    pub embedded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// Segments, persists, embeds, and indexes documents
pub struct IngestPipeline {
    segmenter: Segmenter,
    storage: Arc<StorageManager>,
    embedder: Arc<RetryingEmbedder>,
    vector_store: Arc<dyn VectorStore>,
    keyword_store: Arc<dyn KeywordStore>,
    batch_size: usize,
}

impl IngestPipeline {
    pub fn new(
        segmenter: Segmenter,
        storage: Arc<StorageManager>,
        embedder: Arc<RetryingEmbedder>,
        vector_store: Arc<dyn VectorStore>,
        keyword_store: Arc<dyn KeywordStore>,
        batch_size: usize,
    ) -> Self {
        Self {
            segmenter,
            storage,
            embedder,
            vector_store,
            keyword_store,
            batch_size,
        }
    }

    /// Ingest one document end to end.
    ///
    /// Re-ingesting replaces the document's previous chunk generation.
    /// Embedding failures are counted per batch and do not abort the
    /// ingest; the affected chunks simply stay unindexed.
    pub async fn ingest(&self, document_id: &str, title: &str, text: &str) -> Result<IngestReport> {
        let started = std::time::Instant::now();

        let content_hash = self.storage.blob_store.write_text(text)?;

        let mut chunks = self.segmenter.segment(text);
        for chunk in &mut chunks {
            chunk.vector_id = Some(uuid::Uuid::new_v4().to_string());
        }

        info!(
            document_id,
            chunks = chunks.len(),
            "segmented document for ingestion"
        );

        let records =
            self.storage
                .database
                .replace_document(document_id, title, &content_hash, &chunks)?;

        let mut embedded = 0usize;
        let mut failed = 0usize;

        for batch in records.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|r| r.content.clone()).collect();

            let vectors = match self.embedder.embed_batch(&texts).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    warn!(document_id, "embedding batch failed: {}", e);
                    failed += batch.len();
                    continue;
                }
            };

            for (record, vector) in batch.iter().zip(vectors.iter()) {
                let payload = ChunkPayload {
                    chunk_id: record.id,
                    resource_id: record.document_id.clone(),
                    content: record.content.clone(),
                    section_title: record.section_title.clone(),
                    created_at: record.created_at,
                };

                if let Err(e) = self.vector_store.insert(record.id as u64, vector, payload.clone())
                {
                    warn!(chunk_id = record.id, "vector insert failed: {}", e);
                    failed += 1;
                    continue;
                }

                if let Err(e) = self.keyword_store.insert(&payload) {
                    warn!(chunk_id = record.id, "keyword insert failed: {}", e);
                    failed += 1;
                    continue;
                }

                embedded += 1;
            }

            debug!(document_id, batch = batch.len(), "indexed batch");
        }

        self.keyword_store
            .commit()
            .map_err(|e| crate::error::QuarryError::Index(format!("keyword commit: {}", e)))?;

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            document_id,
            embedded, failed, duration_ms, "ingestion complete"
        );

        Ok(IngestReport {
            document_id: document_id.to_string(),
            chunks: records.len(),
            embedded,
            failed,
            duration_ms,
        })
    }
}
