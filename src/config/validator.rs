use crate::config::{Config, SCHEMA_VERSION};
use crate::embedding::fastembed_dimension;
use crate::error::{DocqaError, Result, ValidationError};
use crate::index::Metric;
use crate::retrieval::PromptTemplate;

const EMBEDDING_PROVIDERS: [&str; 2] = ["fastembed", "ollama"];
const LLM_PROVIDERS: [&str; 3] = ["openrouter", "openai", "ollama"];
const SEARCH_STRATEGIES: [&str; 2] = ["exact", "hnsw"];
const SOURCE_EXTENSIONS: [&str; 4] = ["pdf", "md", "markdown", "txt"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem found
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_corpus(config, &mut errors);
        Self::validate_chunking(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_index(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_prompt(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DocqaError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_corpus(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.corpus.source_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "corpus.source_dir",
                "Source directory cannot be empty",
            ));
        }

        if config.corpus.extensions.is_empty() {
            errors.push(ValidationError::new(
                "corpus.extensions",
                "At least one file extension is required",
            ));
        }
        for ext in &config.corpus.extensions {
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            if !SOURCE_EXTENSIONS.contains(&ext.as_str()) {
                errors.push(ValidationError::new(
                    "corpus.extensions",
                    format!(
                        "Unsupported extension '{}', expected one of {:?}",
                        ext, SOURCE_EXTENSIONS
                    ),
                ));
            }
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        let chunking = &config.chunking;
        if chunking.max_size == 0 {
            errors.push(ValidationError::new(
                "chunking.max_size",
                "Chunk size must be greater than 0",
            ));
        } else if chunking.overlap >= chunking.max_size {
            errors.push(ValidationError::new(
                "chunking.overlap",
                format!(
                    "Overlap ({}) must be smaller than max_size ({})",
                    chunking.overlap, chunking.max_size
                ),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let embedding = &config.embedding;

        if !EMBEDDING_PROVIDERS.contains(&embedding.provider.as_str()) {
            errors.push(ValidationError::new(
                "embedding.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    EMBEDDING_PROVIDERS, embedding.provider
                ),
            ));
        }

        if embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Dimension must be greater than 0",
            ));
        } else if embedding.provider == "fastembed" {
            match fastembed_dimension(&embedding.model) {
                Some(known) if known != embedding.dimension => {
                    errors.push(ValidationError::new(
                        "embedding.dimension",
                        format!(
                            "Model '{}' produces {} dimensions, configured {}",
                            embedding.model, known, embedding.dimension
                        ),
                    ));
                }
                Some(_) => {}
                None if !embedding.model.is_empty() => {
                    errors.push(ValidationError::new(
                        "embedding.model",
                        format!(
                            "Unsupported FastEmbed model '{}'. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                            embedding.model
                        ),
                    ));
                }
                None => {}
            }
        }

        if embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if embedding.concurrency == 0 {
            errors.push(ValidationError::new(
                "embedding.concurrency",
                "Concurrency must be greater than 0",
            ));
        }

        if embedding.provider == "ollama" && !is_http_url(&embedding.endpoint) {
            errors.push(ValidationError::new(
                "embedding.endpoint",
                format!("Endpoint must be an http(s) URL, got '{}'", embedding.endpoint),
            ));
        }
    }

    fn validate_index(config: &Config, errors: &mut Vec<ValidationError>) {
        let index = &config.index;

        if index.path.as_os_str().is_empty() {
            errors.push(ValidationError::new("index.path", "Index path cannot be empty"));
        }

        if let Err(message) = index.metric.parse::<Metric>() {
            errors.push(ValidationError::new("index.metric", message));
        }

        if !SEARCH_STRATEGIES.contains(&index.strategy.as_str()) {
            errors.push(ValidationError::new(
                "index.strategy",
                format!(
                    "Strategy must be one of {:?}, got '{}'",
                    SEARCH_STRATEGIES, index.strategy
                ),
            ));
        }

        if index.strategy == "hnsw" {
            for (key, value) in [
                ("index.hnsw_m", index.hnsw_m),
                ("index.hnsw_ef_construction", index.hnsw_ef_construction),
                ("index.hnsw_ef_search", index.hnsw_ef_search),
            ] {
                if value == 0 {
                    errors.push(ValidationError::new(key, "Must be greater than 0"));
                }
            }
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.k == 0 {
            errors.push(ValidationError::new(
                "retrieval.k",
                "k must be greater than 0",
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        // A missing API key is not an error: retrieval still works and
        // generation reports that no model is configured.
        let llm = &config.llm;

        let temp = llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        if !LLM_PROVIDERS.contains(&llm.provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    LLM_PROVIDERS, llm.provider
                ),
            ));
        }

        if llm.enabled {
            if llm.model.is_empty() {
                errors.push(ValidationError::new("llm.model", "Model name cannot be empty"));
            }
            if !is_http_url(&llm.endpoint) {
                errors.push(ValidationError::new(
                    "llm.endpoint",
                    format!("Endpoint must be an http(s) URL, got '{}'", llm.endpoint),
                ));
            }
            if llm.timeout_secs == 0 {
                errors.push(ValidationError::new(
                    "llm.timeout_secs",
                    "Timeout must be greater than 0",
                ));
            }
            if llm.max_tokens == 0 {
                errors.push(ValidationError::new(
                    "llm.max_tokens",
                    "max_tokens must be greater than 0",
                ));
            }
        }
    }

    fn validate_prompt(config: &Config, errors: &mut Vec<ValidationError>) {
        if let Err(e) = PromptTemplate::parse(&config.prompt.template) {
            errors.push(ValidationError::new("prompt.template", e.to_string()));
        }
    }
}

fn is_http_url(s: &str) -> bool {
    let s = s.trim();
    s.starts_with("http://") || s.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_paths(config: &Config) -> Vec<String> {
        match ConfigValidator::validate(config) {
            Ok(()) => Vec::new(),
            Err(DocqaError::ConfigValidation { errors }) => {
                errors.into_iter().map(|e| e.path).collect()
            }
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = Config::default();
        config.chunking.overlap = 1000;
        assert_eq!(error_paths(&config), vec!["chunking.overlap"]);
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = Config::default();
        config.retrieval.k = 0;
        config.index.metric = "manhattan".to_string();
        config.prompt.template = "Just {question}".to_string();
        config.embedding.provider = "word2vec".to_string();

        let paths = error_paths(&config);
        assert_eq!(
            paths,
            vec![
                "embedding.provider",
                "index.metric",
                "retrieval.k",
                "prompt.template"
            ]
        );
    }

    #[test]
    fn test_hnsw_params_checked_only_for_hnsw() {
        let mut config = Config::default();
        config.index.hnsw_m = 0;
        assert!(ConfigValidator::validate(&config).is_ok());

        config.index.strategy = "hnsw".to_string();
        assert_eq!(error_paths(&config), vec!["index.hnsw_m"]);
    }

    #[test]
    fn test_fastembed_model_dimension_must_match() {
        let mut config = Config::default();
        config.embedding.model = "bge-base-en-v1.5".to_string();
        assert_eq!(error_paths(&config), vec!["embedding.dimension"]);

        config.embedding.dimension = 768;
        assert!(ConfigValidator::validate(&config).is_ok());

        config.embedding.model = "word2vec".to_string();
        assert_eq!(error_paths(&config), vec!["embedding.model"]);
    }

    #[test]
    fn test_ollama_dimension_is_trusted() {
        let mut config = Config::default();
        config.embedding.provider = "ollama".to_string();
        config.embedding.model = "nomic-embed-text".to_string();
        config.embedding.dimension = 768;
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_extensions() {
        let mut config = Config::default();
        config.corpus.extensions = vec![".MD".to_string(), "docx".to_string()];
        assert_eq!(error_paths(&config), vec!["corpus.extensions"]);
    }

    #[test]
    fn test_disabled_llm_skips_endpoint_check() {
        let mut config = Config::default();
        config.llm.endpoint = String::new();
        assert_eq!(error_paths(&config), vec!["llm.endpoint"]);

        config.llm.enabled = false;
        assert!(ConfigValidator::validate(&config).is_ok());
    }
}
