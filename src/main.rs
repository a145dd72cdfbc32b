use quarry::cli::{Cli, Commands, ConfigAction};
use quarry::config::{Config, ConfigValidator};
use quarry::embedding::{
    EmbeddingProvider, FastEmbedProvider, HashingProvider, HnswVectorIndex, KeywordStore,
    RetryingEmbedder, TantivyKeywordIndex, VectorStore,
};
use quarry::error::{QuarryError, Result};
use quarry::ingest::IngestPipeline;
use quarry::retrieval::{
    ConceptStrategy, KeywordStrategy, RetrievalEngine, SearchMode, SearchQuery, VectorStrategy,
};
use quarry::segmenter::Segmenter;
use quarry::storage::StorageManager;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Ingest { paths } => cmd_ingest(cli.config, paths),
        Commands::Search {
            query,
            mode,
            top_k,
            threshold,
            no_rerank,
            resource,
            json,
        } => cmd_search(cli.config, query, mode, top_k, threshold, no_rerank, resource, json),
        Commands::Status => cmd_status(cli.config),
        Commands::Config { action } => cmd_config(cli.config, action),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("quarry={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn config_path(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path.unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quarry")
            .join("config.toml")
    })
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quarry")
}

fn load_config(cli_path: Option<PathBuf>) -> Result<Config> {
    let path = config_path(cli_path);
    if path.exists() {
        Config::load(&path)
    } else {
        Ok(Config::default_at(data_dir()))
    }
}

/// Shared setup for commands that need the full pipeline
struct Engine {
    config: Config,
    storage: Arc<StorageManager>,
    embedder: Arc<RetryingEmbedder>,
    vector_store: Arc<HnswVectorIndex>,
    keyword_store: Arc<TantivyKeywordIndex>,
}

impl Engine {
    fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(StorageManager::new(
            config.storage.data_dir.clone(),
            config.storage.compression_threshold,
        )?);

        let provider: Arc<dyn EmbeddingProvider> =
            match FastEmbedProvider::new(&config.embedding.model) {
                Ok(provider) => Arc::new(provider),
                Err(e) => {
                    tracing::warn!(
                        "embedding model unavailable ({}), falling back to hashing provider",
                        e
                    );
                    Arc::new(HashingProvider::new(config.indexing.vector_dim))
                }
            };

        let dimension = provider.dimension();
        let embedder = Arc::new(RetryingEmbedder::new(
            provider,
            config.embedding.max_retries,
            Duration::from_millis(config.embedding.retry_base_delay_ms),
        ));

        let vector_store = Arc::new(HnswVectorIndex::new(
            dimension,
            config.indexing.hnsw_ef_construction,
            config.indexing.hnsw_m,
        ));

        let keyword_store = Arc::new(
            TantivyKeywordIndex::new(storage.keywords_dir().join("index")).map_err(|e| {
                QuarryError::Index(format!("Failed to open keyword index: {}", e))
            })?,
        );

        Ok(Self {
            config,
            storage,
            embedder,
            vector_store,
            keyword_store,
        })
    }

    /// Rebuild the in-memory vector index from persisted chunks
    async fn rebuild_vector_index(&self) -> Result<()> {
        let records = self.storage.database.get_all_chunks()?;
        if records.is_empty() {
            return Ok(());
        }

        tracing::info!(chunks = records.len(), "rebuilding vector index");

        for batch in records.chunks(self.config.embedding.batch_size) {
            let texts: Vec<String> = batch.iter().map(|r| r.content.clone()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|e| QuarryError::ProviderUnavailable {
                    provider: "embedding".to_string(),
                    message: e.to_string(),
                })?;

            for (record, vector) in batch.iter().zip(vectors.iter()) {
                self.vector_store
                    .insert(
                        record.id as u64,
                        vector,
                        quarry::embedding::ChunkPayload {
                            chunk_id: record.id,
                            resource_id: record.document_id.clone(),
                            content: record.content.clone(),
                            section_title: record.section_title.clone(),
                            created_at: record.created_at,
                        },
                    )
                    .map_err(|e| QuarryError::Index(format!("vector insert: {}", e)))?;
            }
        }

        Ok(())
    }

    fn retrieval_engine(&self) -> RetrievalEngine {
        let vector = VectorStrategy::new(
            self.embedder.clone(),
            self.vector_store.clone() as Arc<dyn VectorStore>,
            self.config.retrieval.hnsw_ef_search,
        );
        let keyword =
            KeywordStrategy::new(self.keyword_store.clone() as Arc<dyn KeywordStore>);
        let concept = ConceptStrategy::new(
            self.keyword_store.clone() as Arc<dyn KeywordStore>,
            self.config.retrieval.min_concept_len,
            self.config.retrieval.max_concepts,
        );

        RetrievalEngine::new(vector, keyword, concept, &self.config)
    }
}

fn cmd_ingest(config: Option<PathBuf>, paths: Vec<PathBuf>) -> Result<()> {
    if paths.is_empty() {
        return Err(QuarryError::Config("No files to ingest".to_string()));
    }

    let engine = Engine::open(load_config(config)?)?;
    let runtime = runtime()?;

    let pipeline = IngestPipeline::new(
        Segmenter::new(engine.config.segmenter.clone()),
        engine.storage.clone(),
        engine.embedder.clone(),
        engine.vector_store.clone() as Arc<dyn VectorStore>,
        engine.keyword_store.clone() as Arc<dyn KeywordStore>,
        engine.config.embedding.batch_size,
    );

    runtime.block_on(async {
        for path in &paths {
            let text = std::fs::read_to_string(path).map_err(|e| QuarryError::Io {
                source: e,
                context: format!("Failed to read document: {}", path.display()),
            })?;

            let document_id = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());

            let report = pipeline.ingest(&document_id, &document_id, &text).await?;
            println!(
                "{}: {} chunks, {} indexed, {} failed ({}ms)",
                report.document_id, report.chunks, report.embedded, report.failed,
                report.duration_ms
            );
        }
        Ok(())
    })
}

#[allow(clippy::too_many_arguments)]
fn cmd_search(
    config: Option<PathBuf>,
    query_text: String,
    mode: String,
    top_k: usize,
    threshold: f32,
    no_rerank: bool,
    resource: Vec<String>,
    json: bool,
) -> Result<()> {
    let engine = Engine::open(load_config(config)?)?;
    let runtime = runtime()?;

    let mode = match mode.as_str() {
        "vector" => SearchMode::Vector,
        "keyword" => SearchMode::Keyword,
        "concept" => SearchMode::Concept,
        _ => SearchMode::Hybrid,
    };

    let mut query = SearchQuery::new(query_text, top_k);
    query.mode = mode;
    query.similarity_threshold = threshold;
    query.enable_rerank = !no_rerank;
    if !resource.is_empty() {
        query
            .filters
            .insert("resource_ids".to_string(), serde_json::json!(resource));
    }

    runtime.block_on(async {
        engine.rebuild_vector_index().await?;

        let retrieval = engine.retrieval_engine();
        let response = retrieval.search(&query).await?;

        if json {
            let rendered =
                serde_json::to_string_pretty(&response).map_err(|e| QuarryError::Json {
                    source: e,
                    context: "Failed to render search response".to_string(),
                })?;
            println!("{}", rendered);
            return Ok(());
        }

        if response.degraded {
            match &response.failure_reason {
                Some(reason) => println!("! {}", reason),
                None => println!("! degraded: some strategies failed"),
            }
        }

        if response.results.is_empty() {
            println!("No results ({:.1}ms)", response.search_time_ms);
            return Ok(());
        }

        println!(
            "{} results of {} found ({:.1}ms)\n",
            response.results.len(),
            response.total_found,
            response.search_time_ms
        );

        for result in &response.results {
            let strategies: Vec<&str> = result
                .contributing_strategies
                .iter()
                .map(|s| match s {
                    quarry::retrieval::Strategy::Vector => "vector",
                    quarry::retrieval::Strategy::Keyword => "keyword",
                    quarry::retrieval::Strategy::Concept => "concept",
                })
                .collect();

            println!(
                "{:>3}. [{:.3}] {} (chunk {}, via {})",
                result.rank,
                result.final_score,
                result.resource_id,
                result.chunk_id,
                strategies.join("+")
            );

            let excerpt = result.highlight.as_deref().unwrap_or_else(|| {
                let end = result
                    .content
                    .char_indices()
                    .nth(160)
                    .map(|(i, _)| i)
                    .unwrap_or(result.content.len());
                &result.content[..end]
            });
            println!("     {}\n", excerpt.replace('\n', " "));
        }

        Ok(())
    })
}

fn cmd_status(config: Option<PathBuf>) -> Result<()> {
    let config = load_config(config)?;
    let storage = StorageManager::new(
        config.storage.data_dir.clone(),
        config.storage.compression_threshold,
    )?;

    let stats = storage.stats()?;
    println!("Data directory: {}", config.storage.data_dir.display());
    println!("Documents:      {}", stats.document_count);
    println!("Chunks:         {}", stats.chunk_count);
    println!("Content size:   {} bytes", stats.total_content_size);

    Ok(())
}

fn cmd_config(cli_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    let path = config_path(cli_path);

    match action {
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                return Err(QuarryError::Config(format!(
                    "Config already exists at {} (use --force to overwrite)",
                    path.display()
                )));
            }
            let config = Config::default_at(data_dir());
            config.save(&path)?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Show => {
            let config = load_config(Some(path))?;
            let rendered = toml::to_string_pretty(&config)?;
            println!("{}", rendered);
        }
        ConfigAction::Validate => {
            let config = Config::load(&path)?;
            ConfigValidator::validate(&config)?;
            println!("Configuration is valid");
        }
    }

    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| QuarryError::Io {
        source: e,
        context: "Failed to start async runtime".to_string(),
    })
}
