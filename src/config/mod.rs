//! Configuration management for docqa
//!
//! Configuration is a TOML file with one section per pipeline concern, named
//! profiles that override a handful of keys, and `DOCQA_SECTION__KEY`
//! environment overrides applied on top.

use crate::chunker::Chunker;
use crate::embedding::EmbeddingProvider;
use crate::error::{DocqaError, Result};
use crate::index::{HnswParams, IndexExpectation, IndexOptions, Metric, SearchStrategy};
use crate::retrieval::{PromptTemplate, QuerySettings, DEFAULT_TEMPLATE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";
const ENV_PREFIX: &str = "DOCQA_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub corpus: CorpusConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
    pub prompt: PromptConfig,
    pub profiles: HashMap<String, ProfileOverrides>,
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

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            created_at: current_timestamp(),
            last_modified: current_timestamp(),
        }
    }
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Where source documents live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub source_dir: PathBuf,
    /// File extensions to ingest, without the dot
    pub extensions: Vec<String>,
    pub recursive: bool,
    /// `pdftotext` executable used for PDF extraction
    pub pdftotext: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("data"),
            extensions: vec!["pdf".to_string(), "md".to_string(), "txt".to_string()],
            recursive: true,
            pdftotext: PathBuf::from("pdftotext"),
        }
    }
}

/// Chunk size limits, in characters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            overlap: 200,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "fastembed" (local ONNX) or "ollama"
    pub provider: String,
    pub model: String,
    /// Ollama base URL
    pub endpoint: String,
    /// Expected vector length (checked against every response)
    pub dimension: usize,
    pub batch_size: usize,
    /// Batches in flight at once
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "fastembed".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            dimension: 384,
            batch_size: 32,
            concurrency: 4,
            timeout_secs: 30,
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub path: PathBuf,
    /// "cosine" or "l2"
    pub metric: String,
    /// "exact" or "hnsw"
    pub strategy: String,
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("index"),
            metric: "cosine".to_string(),
            strategy: "exact".to_string(),
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 64,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks retrieved per question
    pub k: usize,
    /// Separator between chunks in the context block
    pub delimiter: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 3,
            delimiter: "\n\n".to_string(),
        }
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    /// "openrouter", "openai" or "ollama"
    pub provider: String,
    pub model: String,
    /// API base URL (OpenAI-compatible) or Ollama base URL
    pub endpoint: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "openrouter".to_string(),
            model: "meta-llama/llama-3-8b-instruct:free".to_string(),
            endpoint: "https://openrouter.ai/api/v1".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            temperature: 0.0,
            max_tokens: 512,
            timeout_secs: 60,
        }
    }
}

/// Prompt configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Must contain `{context}` and `{question}` exactly once each
    pub template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dimension: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_k: Option<usize>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let config = Self::read(path)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Resolve the configuration the CLI runs with
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used if present; otherwise built-in defaults apply.
    pub fn resolve(path: Option<&Path>, profile: Option<&str>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = Self::default_path()?;
                if !default.exists() {
                    tracing::warn!(
                        "No configuration at {}, using defaults (run `docqa config init` to create one)",
                        default.display()
                    );
                    let mut config = Config::default();
                    config.apply_env_overrides();
                    if let Some(profile) = profile {
                        config.apply_profile(profile)?;
                    }
                    ConfigValidator::validate(&config)?;
                    return Ok(config);
                }
                default
            }
        };

        match profile {
            Some(profile) => Self::load_with_profile(&path, profile),
            None => Self::load(&path),
        }
    }

    /// Parse the file and apply environment overrides, without validating
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DocqaError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocqaError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| DocqaError::Config(format!("Unknown profile '{}'", profile)))?;

        if let Some(provider) = overrides.embedding_provider {
            self.embedding.provider = provider;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(dimension) = overrides.embedding_dimension {
            self.embedding.dimension = dimension;
        }
        if let Some(enabled) = overrides.llm_enabled {
            self.llm.enabled = enabled;
        }
        if let Some(provider) = overrides.llm_provider {
            self.llm.provider = provider;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(endpoint) = overrides.llm_endpoint {
            self.llm.endpoint = endpoint;
        }
        if let Some(strategy) = overrides.index_strategy {
            self.index.strategy = strategy;
        }
        if let Some(k) = overrides.retrieval_k {
            self.retrieval.k = k;
        }
        tracing::debug!("Applied profile '{}'", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: DOCQA_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "CORPUS__SOURCE_DIR" => self.corpus.source_dir = PathBuf::from(value),
            "CORPUS__RECURSIVE" => self.corpus.recursive = parse_value(path, value)?,
            "CHUNKING__MAX_SIZE" => self.chunking.max_size = parse_value(path, value)?,
            "CHUNKING__OVERLAP" => self.chunking.overlap = parse_value(path, value)?,
            "EMBEDDING__PROVIDER" => self.embedding.provider = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__ENDPOINT" => self.embedding.endpoint = value.to_string(),
            "EMBEDDING__DIMENSION" => self.embedding.dimension = parse_value(path, value)?,
            "EMBEDDING__BATCH_SIZE" => self.embedding.batch_size = parse_value(path, value)?,
            "EMBEDDING__CONCURRENCY" => self.embedding.concurrency = parse_value(path, value)?,
            "INDEX__PATH" => self.index.path = PathBuf::from(value),
            "INDEX__METRIC" => self.index.metric = value.to_string(),
            "INDEX__STRATEGY" => self.index.strategy = value.to_string(),
            "RETRIEVAL__K" => self.retrieval.k = parse_value(path, value)?,
            "LLM__ENABLED" => self.llm.enabled = parse_value(path, value)?,
            "LLM__PROVIDER" => self.llm.provider = value.to_string(),
            "LLM__MODEL" => self.llm.model = value.to_string(),
            "LLM__ENDPOINT" => self.llm.endpoint = value.to_string(),
            "LLM__API_KEY_ENV" => self.llm.api_key_env = value.to_string(),
            "LLM__TEMPERATURE" => self.llm.temperature = parse_value(path, value)?,
            "LLM__TIMEOUT_SECS" => self.llm.timeout_secs = parse_value(path, value)?,
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DocqaError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("docqa").join("config.toml"))
    }

    pub fn metric(&self) -> Result<Metric> {
        self.index
            .metric
            .parse()
            .map_err(|message| DocqaError::InvalidConfigValue {
                path: "index.metric".to_string(),
                message,
            })
    }

    pub fn search_strategy(&self) -> Result<SearchStrategy> {
        match self.index.strategy.as_str() {
            "exact" => Ok(SearchStrategy::Exact),
            "hnsw" => Ok(SearchStrategy::Hnsw(HnswParams {
                m: self.index.hnsw_m,
                ef_construction: self.index.hnsw_ef_construction,
                ef_search: self.index.hnsw_ef_search,
            })),
            other => Err(DocqaError::InvalidConfigValue {
                path: "index.strategy".to_string(),
                message: format!("expected 'exact' or 'hnsw', got '{}'", other),
            }),
        }
    }

    /// Build-time index options for the configured embedding model
    pub fn index_options(&self) -> Result<IndexOptions> {
        Ok(IndexOptions {
            metric: self.metric()?,
            strategy: self.search_strategy()?,
            embedding_model: Some(self.embedding.model.clone()),
        })
    }

    /// What a loaded index must match to be queried with this configuration
    pub fn index_expectation(&self) -> Result<IndexExpectation> {
        Ok(IndexExpectation {
            dimension: Some(self.embedding.dimension),
            metric: Some(self.metric()?),
            embedding_model: Some(self.embedding.model.clone()),
        })
    }

    /// Like `index_expectation`, but the dimension and model come from the
    /// embedder that will embed queries
    pub fn index_expectation_for(
        &self,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<IndexExpectation> {
        Ok(IndexExpectation {
            dimension: Some(embedder.dimension()),
            embedding_model: Some(embedder.model_name().to_string()),
            ..self.index_expectation()?
        })
    }

    pub fn chunker(&self) -> Result<Chunker> {
        Chunker::new(self.chunking.max_size, self.chunking.overlap).map_err(|e| {
            DocqaError::InvalidConfigValue {
                path: "chunking".to_string(),
                message: e.to_string(),
            }
        })
    }

    pub fn prompt_template(&self) -> Result<PromptTemplate> {
        PromptTemplate::parse(&self.prompt.template).map_err(|e| DocqaError::InvalidConfigValue {
            path: "prompt.template".to_string(),
            message: e.to_string(),
        })
    }

    pub fn query_settings(&self) -> QuerySettings {
        QuerySettings {
            k: self.retrieval.k,
            delimiter: self.retrieval.delimiter.clone(),
            generation_timeout: Duration::from_secs(self.llm.timeout_secs),
        }
    }
}

fn parse_value<T: FromStr>(path: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| DocqaError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(
            "local".to_string(),
            ProfileOverrides {
                llm_provider: Some("ollama".to_string()),
                llm_model: Some("llama3.2".to_string()),
                llm_endpoint: Some("http://localhost:11434".to_string()),
                ..ProfileOverrides::default()
            },
        );
        profiles.insert(
            "retrieval-only".to_string(),
            ProfileOverrides {
                llm_enabled: Some(false),
                ..ProfileOverrides::default()
            },
        );

        Self {
            meta: MetaConfig::default(),
            corpus: CorpusConfig::default(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            retrieval: RetrievalConfig::default(),
            llm: LlmConfig::default(),
            prompt: PromptConfig::default(),
            profiles,
        }
    }
}
