/// Embedding provider trait and implementations
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Embedding provider unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    /// Transient failures are worth retrying at the adapter boundary
    pub fn is_transient(&self) -> bool {
        matches!(self, EmbeddingError::Unavailable(_))
    }
}

/// Trait for text-embedding providers
///
/// Converts text into fixed-length vectors. Implementations must be safe to
/// call concurrently and must report a fixed dimensionality.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for multiple texts (batched for efficiency)
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// FastEmbed provider for local embedding generation
///
/// Models are downloaded on demand to `~/.cache/huggingface/` on first use;
/// the default all-MiniLM-L6-v2 model is ~90MB with 384 dimensions.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Create a new FastEmbed provider with the specified model
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let (embedding_model, dimension) = match model_name {
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
            "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
            "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
            _ => {
                return Err(EmbeddingError::InitializationError(format!(
                    "Unsupported model: {}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                    model_name
                )));
            }
        };

        tracing::info!(
            "Initializing embedding model: {} ({}D, downloaded if not cached)",
            model_name,
            dimension
        );

        let init_options = InitOptions::new(embedding_model).with_show_download_progress(true);

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }

    /// Create provider with default model (all-MiniLM-L6-v2)
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new("all-MiniLM-L6-v2")
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let embeddings = self
            .model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::GenerationError("No embeddings generated".to_string()))?;

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Deterministic hashing-based provider
///
/// Maps tokens into buckets of a fixed-size vector and normalizes. No model
/// download, no network, stable across runs. Used by tests and available as
/// an offline fallback; similarity quality is far below a learned model.
pub struct HashingProvider {
    dimension: usize,
}

impl HashingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl EmbeddingProvider for HashingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in text.split_whitespace() {
            let normalized: String = token
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if normalized.is_empty() {
                continue;
            }

            use std::hash::{Hash, Hasher};
            let mut hasher = ahash::AHasher::default();
            normalized.hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        Ok(vector)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hashing"
    }
}

/// Retry wrapper over an embedding provider
///
/// Transient provider failures are retried with exponential backoff here,
/// at the adapter boundary, so strategy logic never contains retry loops.
pub struct RetryingEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    max_retries: u32,
    base_delay: Duration,
}

impl RetryingEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
        }
    }

    pub fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut attempt = 0;
        loop {
            match self.inner.embed(text) {
                Ok(vector) => return Ok(vector),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.base_delay * 2u32.pow(attempt);
                    tracing::warn!(
                        "Embedding attempt {} failed, retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut attempt = 0;
        loop {
            match self.inner.embed_batch(texts) {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.base_delay * 2u32.pow(attempt);
                    tracing::warn!(
                        "Batch embedding attempt {} failed, retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_hashing_provider_is_deterministic() {
        let provider = HashingProvider::new(64);

        let a = provider.embed("listening skills practice").unwrap();
        let b = provider.embed("listening skills practice").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_hashing_provider_normalizes() {
        let provider = HashingProvider::new(64);
        let v = provider.embed("one two three").unwrap();

        let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_provider_rejects_empty() {
        let provider = HashingProvider::new(64);
        assert!(provider.embed("").is_err());
    }

    #[test]
    fn test_similar_text_closer_than_unrelated() {
        let provider = HashingProvider::new(256);

        let a = provider.embed("listening comprehension exercises").unwrap();
        let b = provider.embed("listening comprehension drills").unwrap();
        let c = provider.embed("quarterly revenue forecast").unwrap();

        let dot = |x: &[f32], y: &[f32]| -> f32 { x.iter().zip(y).map(|(a, b)| a * b).sum() };
        assert!(dot(&a, &b) > dot(&a, &c));
    }

    /// Provider that fails transiently a fixed number of times
    struct FlakyProvider {
        failures: AtomicU32,
        inner: HashingProvider,
    }

    impl EmbeddingProvider for FlakyProvider {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| {
                if f > 0 {
                    Some(f - 1)
                } else {
                    None
                }
            }).is_ok()
            {
                return Err(EmbeddingError::Unavailable("simulated outage".to_string()));
            }
            self.inner.embed(text)
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let flaky = Arc::new(FlakyProvider {
            failures: AtomicU32::new(2),
            inner: HashingProvider::new(32),
        });
        let retrier = RetryingEmbedder::new(flaky, 3, Duration::from_millis(1));

        let result = retrier.embed("recovers eventually").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let flaky = Arc::new(FlakyProvider {
            failures: AtomicU32::new(10),
            inner: HashingProvider::new(32),
        });
        let retrier = RetryingEmbedder::new(flaky, 2, Duration::from_millis(1));

        let result = retrier.embed("never succeeds").await;
        assert!(matches!(result, Err(EmbeddingError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_invalid_input_is_not_retried() {
        let provider = Arc::new(HashingProvider::new(32));
        let retrier = RetryingEmbedder::new(provider, 5, Duration::from_millis(1));

        let result = retrier.embed("").await;
        assert!(matches!(result, Err(EmbeddingError::InvalidInput(_))));
    }
}
