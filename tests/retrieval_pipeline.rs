//! End-to-end retrieval pipeline tests over in-process stores
//!
//! Uses the deterministic hashing embedder so no model download is needed.

use quarry::config::Config;
use quarry::embedding::{
    ChunkPayload, HashingProvider, HnswVectorIndex, KeywordIndexError, KeywordStore,
    RetryingEmbedder, TantivyKeywordIndex, VectorStore,
};
use quarry::ingest::IngestPipeline;
use quarry::retrieval::{
    ConceptStrategy, KeywordStrategy, RetrievalEngine, SearchMode, SearchQuery, Strategy,
    VectorStrategy,
};
use quarry::segmenter::Segmenter;
use quarry::storage::StorageManager;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const DIM: usize = 64;

struct Fixture {
    config: Config,
    storage: Arc<StorageManager>,
    embedder: Arc<RetryingEmbedder>,
    vector_store: Arc<HnswVectorIndex>,
    keyword_store: Arc<TantivyKeywordIndex>,
    _temp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let config = Config::default_at(temp.path().to_path_buf());

        let storage = Arc::new(
            StorageManager::new(temp.path().to_path_buf(), config.storage.compression_threshold)
                .unwrap(),
        );

        let provider = Arc::new(HashingProvider::new(DIM));
        let embedder = Arc::new(RetryingEmbedder::new(provider, 0, Duration::from_millis(1)));

        let vector_store = Arc::new(HnswVectorIndex::new(DIM, 200, 16));
        let keyword_store =
            Arc::new(TantivyKeywordIndex::new(storage.keywords_dir().join("index")).unwrap());

        Self {
            config,
            storage,
            embedder,
            vector_store,
            keyword_store,
            _temp: temp,
        }
    }

    fn pipeline(&self) -> IngestPipeline {
        IngestPipeline::new(
            Segmenter::new(self.config.segmenter.clone()),
            self.storage.clone(),
            self.embedder.clone(),
            self.vector_store.clone() as Arc<dyn VectorStore>,
            self.keyword_store.clone() as Arc<dyn KeywordStore>,
            self.config.embedding.batch_size,
        )
    }

    fn engine(&self) -> RetrievalEngine {
        let vector = VectorStrategy::new(
            self.embedder.clone(),
            self.vector_store.clone() as Arc<dyn VectorStore>,
            self.config.retrieval.hnsw_ef_search,
        );
        let keyword = KeywordStrategy::new(self.keyword_store.clone() as Arc<dyn KeywordStore>);
        let concept = ConceptStrategy::new(
            self.keyword_store.clone() as Arc<dyn KeywordStore>,
            self.config.retrieval.min_concept_len,
            self.config.retrieval.max_concepts,
        );

        RetrievalEngine::new(vector, keyword, concept, &self.config)
    }
}

#[tokio::test]
async fn ingest_then_search_end_to_end() {
    let fixture = Fixture::new();
    let pipeline = fixture.pipeline();

    pipeline
        .ingest(
            "listening-guide",
            "Listening Guide",
            "Active listening improves comprehension. Practice listening with podcasts daily. \
             Shadowing exercises sharpen the ear.",
        )
        .await
        .unwrap();
    pipeline
        .ingest(
            "grammar-notes",
            "Grammar Notes",
            "Grammar drills build structural accuracy. Conjugation tables reward repetition.",
        )
        .await
        .unwrap();

    let engine = fixture.engine();
    let response = engine
        .search(&SearchQuery::new("listening practice", 5))
        .await
        .unwrap();

    assert!(!response.degraded);
    assert!(!response.results.is_empty());
    assert_eq!(response.results[0].resource_id, "listening-guide");
    assert!(response.search_time_ms > 0.0);
}

#[tokio::test]
async fn keyword_only_corpus_match_gets_no_consensus_bonus() {
    let fixture = Fixture::new();
    let pipeline = fixture.pipeline();

    // A long chunk: its hashed embedding is diluted across many tokens, so
    // vector similarity lands below the 0.75 threshold while the keywords
    // still match exactly
    pipeline
        .ingest(
            "course-notes",
            "Course Notes",
            "The course covers listening skills among many other topics such as grammar, \
             vocabulary, pronunciation, writing, reading fluency, conversation tactics, \
             cultural context, and exam preparation strategies for several proficiency levels.",
        )
        .await
        .unwrap();

    // Raise the concept length bar so no query token qualifies as a concept
    let mut config = fixture.config.clone();
    config.retrieval.min_concept_len = 12;

    let vector = VectorStrategy::new(
        fixture.embedder.clone(),
        fixture.vector_store.clone() as Arc<dyn VectorStore>,
        config.retrieval.hnsw_ef_search,
    );
    let keyword = KeywordStrategy::new(fixture.keyword_store.clone() as Arc<dyn KeywordStore>);
    let concept = ConceptStrategy::new(
        fixture.keyword_store.clone() as Arc<dyn KeywordStore>,
        config.retrieval.min_concept_len,
        config.retrieval.max_concepts,
    );
    let engine = RetrievalEngine::new(vector, keyword, concept, &config);

    let mut query = SearchQuery::new("listening skills", 5);
    query.similarity_threshold = 0.75;

    let response = engine.search(&query).await.unwrap();

    assert!(!response.degraded);
    assert_eq!(response.results.len(), 1);

    let result = &response.results[0];
    assert_eq!(result.contributing_strategies.len(), 1);
    assert!(result.contributing_strategies.contains(&Strategy::Keyword));
    // Both keywords matched, no consensus bonus applied
    assert!((result.fused_score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn failing_keyword_backend_degrades_without_blocking() {
    struct FailingKeywordStore;

    impl KeywordStore for FailingKeywordStore {
        fn insert(&self, _payload: &ChunkPayload) -> Result<(), KeywordIndexError> {
            Err(KeywordIndexError::InsertError("down".to_string()))
        }

        fn commit(&self) -> Result<(), KeywordIndexError> {
            Ok(())
        }

        fn search_any(
            &self,
            _tokens: &[String],
            _limit: usize,
        ) -> Result<Vec<ChunkPayload>, KeywordIndexError> {
            Err(KeywordIndexError::SearchError("down".to_string()))
        }

        fn len(&self) -> u64 {
            0
        }
    }

    let fixture = Fixture::new();
    let pipeline = fixture.pipeline();

    pipeline
        .ingest(
            "listening-guide",
            "Listening Guide",
            "Daily listening practice with varied accents builds comprehension.",
        )
        .await
        .unwrap();

    let failing: Arc<dyn KeywordStore> = Arc::new(FailingKeywordStore);

    let vector = VectorStrategy::new(
        fixture.embedder.clone(),
        fixture.vector_store.clone() as Arc<dyn VectorStore>,
        fixture.config.retrieval.hnsw_ef_search,
    );
    let keyword = KeywordStrategy::new(failing.clone());
    let concept = ConceptStrategy::new(
        failing,
        fixture.config.retrieval.min_concept_len,
        fixture.config.retrieval.max_concepts,
    );
    let engine = RetrievalEngine::new(vector, keyword, concept, &fixture.config);

    let response = engine
        .search(&SearchQuery::new("listening practice", 5))
        .await
        .unwrap();

    assert!(response.degraded);
    assert!(response.failure_reason.is_none());
    assert!(!response.results.is_empty());
    assert!(response.results[0]
        .contributing_strategies
        .contains(&Strategy::Vector));
}

#[tokio::test]
async fn resource_filter_restricts_vector_results() {
    let fixture = Fixture::new();
    let pipeline = fixture.pipeline();

    pipeline
        .ingest("doc-a", "A", "Listening exercises for beginners and intermediates.")
        .await
        .unwrap();
    pipeline
        .ingest("doc-b", "B", "Listening exercises for advanced learners instead.")
        .await
        .unwrap();

    let engine = fixture.engine();

    let mut query = SearchQuery::new("listening exercises", 5);
    query.mode = SearchMode::Vector;
    query
        .filters
        .insert("resource_ids".to_string(), serde_json::json!(["doc-b"]));

    let response = engine.search(&query).await.unwrap();

    assert!(!response.results.is_empty());
    assert!(response.results.iter().all(|r| r.resource_id == "doc-b"));
}

#[tokio::test]
async fn hybrid_consensus_outranks_single_strategy() {
    let fixture = Fixture::new();
    let pipeline = fixture.pipeline();

    pipeline
        .ingest(
            "consensus-doc",
            "Consensus",
            "Listening skills improve with practice.",
        )
        .await
        .unwrap();

    let engine = fixture.engine();
    let response = engine
        .search(&SearchQuery::new("listening skills practice", 5))
        .await
        .unwrap();

    assert!(!response.results.is_empty());
    // The chunk matches by vector, keyword, and concept at once
    assert!(response.results[0].contributing_strategies.len() > 1);
}

#[tokio::test]
async fn resegmentation_is_reflected_in_storage() {
    let fixture = Fixture::new();
    let pipeline = fixture.pipeline();

    pipeline
        .ingest("doc-a", "A", "First version of the text.")
        .await
        .unwrap();
    pipeline
        .ingest("doc-a", "A", "Second version of the text entirely.")
        .await
        .unwrap();

    let chunks = fixture.storage.database.get_chunks("doc-a").unwrap();
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].content.contains("Second version"));

    let doc = fixture.storage.database.get_document("doc-a").unwrap().unwrap();
    assert_eq!(doc.generation, 2);
}
