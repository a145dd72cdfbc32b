use crate::config::Config;
use crate::error::{QuarryError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_segmenter(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_indexing(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_fusion(config, &mut errors);
        Self::validate_rerank(config, &mut errors);
        Self::validate_cache(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(QuarryError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_segmenter(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.segmenter.max_chunk_size == 0 {
            errors.push(ValidationError::new(
                "segmenter.max_chunk_size",
                "Max chunk size must be greater than 0",
            ));
        }

        if config.segmenter.overlap_size >= config.segmenter.max_chunk_size {
            errors.push(ValidationError::new(
                "segmenter.overlap_size",
                "Overlap size must be smaller than max chunk size",
            ));
        }

        let ratio = config.segmenter.overlap_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            errors.push(ValidationError::new(
                "segmenter.overlap_ratio",
                format!("Overlap ratio must be in [0, 1], got {}", ratio),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }
    }

    fn validate_indexing(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.indexing.vector_dim == 0 {
            errors.push(ValidationError::new(
                "indexing.vector_dim",
                "Vector dimension must be greater than 0",
            ));
        }

        if config.indexing.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_m",
                "HNSW M parameter must be greater than 0",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.candidate_multiplier == 0 {
            errors.push(ValidationError::new(
                "retrieval.candidate_multiplier",
                "Candidate multiplier must be at least 1",
            ));
        }

        if config.retrieval.strategy_timeout_ms == 0 {
            errors.push(ValidationError::new(
                "retrieval.strategy_timeout_ms",
                "Strategy timeout must be greater than 0",
            ));
        }
    }

    fn validate_fusion(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.fusion.consensus_bonus < 0.0 {
            errors.push(ValidationError::new(
                "fusion.consensus_bonus",
                "Consensus bonus cannot be negative",
            ));
        }
    }

    fn validate_rerank(config: &Config, errors: &mut Vec<ValidationError>) {
        let weights = [
            ("rerank.similarity_weight", config.rerank.similarity_weight),
            ("rerank.quality_weight", config.rerank.quality_weight),
            ("rerank.freshness_weight", config.rerank.freshness_weight),
            ("rerank.preference_weight", config.rerank.preference_weight),
        ];

        for (path, weight) in weights {
            if weight < 0.0 {
                errors.push(ValidationError::new(path, "Weight cannot be negative"));
            }
        }

        let sum: f32 = weights.iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > 0.001 {
            errors.push(ValidationError::new(
                "rerank",
                format!("Rerank weights must sum to 1.0, got {}", sum),
            ));
        }

        if config.rerank.max_per_resource == 0 {
            errors.push(ValidationError::new(
                "rerank.max_per_resource",
                "Per-resource cap must be at least 1",
            ));
        }
    }

    fn validate_cache(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.cache.enabled && config.cache.ttl_secs == 0 {
            errors.push(ValidationError::new(
                "cache.ttl_secs",
                "Cache TTL must be greater than 0 when the cache is enabled",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn valid_config() -> Config {
        Config::default_at(PathBuf::from("/tmp/quarry"))
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(ConfigValidator::validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = valid_config();
        config.segmenter.max_chunk_size = 0;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_overlap_larger_than_chunk_rejected() {
        let mut config = valid_config();
        config.segmenter.overlap_size = config.segmenter.max_chunk_size;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_rerank_weights_must_sum_to_one() {
        let mut config = valid_config();
        config.rerank.similarity_weight = 0.9;
        let result = ConfigValidator::validate(&config);
        assert!(result.is_err());

        if let Err(QuarryError::ConfigValidation { errors }) = result {
            assert!(errors.iter().any(|e| e.path == "rerank"));
        }
    }

    #[test]
    fn test_multiple_errors_collected() {
        let mut config = valid_config();
        config.segmenter.max_chunk_size = 0;
        config.embedding.batch_size = 0;
        config.indexing.vector_dim = 0;

        match ConfigValidator::validate(&config) {
            Err(QuarryError::ConfigValidation { errors }) => {
                assert!(errors.len() >= 3);
            }
            _ => panic!("Expected validation failure"),
        }
    }
}
