/// Keyword store trait and tantivy implementation
use super::ChunkPayload;
use std::path::PathBuf;
use std::sync::Mutex;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeywordIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    TantivyError(#[from] TantivyError),

    #[error("Query parsing error: {0}")]
    QueryParseError(String),

    #[error("Payload decoding failed: {0}")]
    PayloadError(String),
}

/// Contract for keyword-searchable stores
///
/// Stores chunk payloads indexed by their text and returns payloads whose
/// text matches any of the given tokens. Scoring is the caller's concern;
/// the store is used for recall only.
pub trait KeywordStore: Send + Sync {
    fn insert(&self, payload: &ChunkPayload) -> Result<(), KeywordIndexError>;

    /// Make pending inserts visible to searches
    fn commit(&self) -> Result<(), KeywordIndexError>;

    /// Return payloads containing any of the tokens, best matches first
    fn search_any(
        &self,
        tokens: &[String],
        limit: usize,
    ) -> Result<Vec<ChunkPayload>, KeywordIndexError>;

    fn len(&self) -> u64;
}

/// Tantivy-backed keyword store
pub struct TantivyKeywordIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    id_field: Field,
    text_field: Field,
    payload_field: Field,
    #[allow(dead_code)]
    index_path: PathBuf,
}

impl TantivyKeywordIndex {
    /// Open an existing index at the path, or create a new one
    pub fn new(index_path: PathBuf) -> Result<Self, KeywordIndexError> {
        if index_path.exists() && index_path.join("meta.json").exists() {
            Self::load(index_path)
        } else {
            Self::create(index_path)
        }
    }

    fn create(index_path: PathBuf) -> Result<Self, KeywordIndexError> {
        std::fs::create_dir_all(&index_path)?;

        let mut schema_builder = Schema::builder();
        let _id_field = schema_builder.add_u64_field("id", INDEXED | STORED);
        let text_field = schema_builder.add_text_field("text", TEXT);
        let payload_field = schema_builder.add_text_field("payload", STORED);
        let schema = schema_builder.build();

        let index = Index::create_in_dir(&index_path, schema)
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        Self::open_parts(index, index_path)
    }

    fn load(index_path: PathBuf) -> Result<Self, KeywordIndexError> {
        if !index_path.exists() {
            return Err(KeywordIndexError::IndexNotFound(
                index_path.display().to_string(),
            ));
        }

        let index = Index::open_in_dir(&index_path)
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        Self::open_parts(index, index_path)
    }

    fn open_parts(index: Index, index_path: PathBuf) -> Result<Self, KeywordIndexError> {
        let schema = index.schema();

        let id_field = schema.get_field("id").map_err(|_| {
            KeywordIndexError::InitializationError("Missing 'id' field in schema".to_string())
        })?;
        let text_field = schema.get_field("text").map_err(|_| {
            KeywordIndexError::InitializationError("Missing 'text' field in schema".to_string())
        })?;
        let payload_field = schema.get_field("payload").map_err(|_| {
            KeywordIndexError::InitializationError("Missing 'payload' field in schema".to_string())
        })?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            id_field,
            text_field,
            payload_field,
            index_path,
        })
    }
}

impl KeywordStore for TantivyKeywordIndex {
    fn insert(&self, payload: &ChunkPayload) -> Result<(), KeywordIndexError> {
        let encoded = serde_json::to_string(payload)
            .map_err(|e| KeywordIndexError::PayloadError(e.to_string()))?;

        let document = doc!(
            self.id_field => payload.chunk_id as u64,
            self.text_field => payload.content.clone(),
            self.payload_field => encoded,
        );

        self.writer
            .lock()
            .unwrap()
            .add_document(document)
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;

        Ok(())
    }

    fn commit(&self) -> Result<(), KeywordIndexError> {
        self.writer
            .lock()
            .unwrap()
            .commit()
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;

        self.reader
            .reload()
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

        Ok(())
    }

    fn search_any(
        &self,
        tokens: &[String],
        limit: usize,
    ) -> Result<Vec<ChunkPayload>, KeywordIndexError> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();

        // The default query combinator is a disjunction, which is exactly
        // the "contains any keyword" contract
        let query_parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let query = query_parser
            .parse_query(&tokens.join(" "))
            .map_err(|e| KeywordIndexError::QueryParseError(e.to_string()))?;

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

        let mut results = Vec::new();
        for (_score, doc_address) in top_docs {
            let retrieved: tantivy::TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

            let encoded = retrieved
                .get_first(self.payload_field)
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    KeywordIndexError::SearchError("Missing payload field".to_string())
                })?;

            let payload: ChunkPayload = serde_json::from_str(encoded)
                .map_err(|e| KeywordIndexError::PayloadError(e.to_string()))?;

            results.push(payload);
        }

        Ok(results)
    }

    fn len(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}
