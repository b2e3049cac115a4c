use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::index::IndexError;
use crate::ingest::IngestError;
use crate::llm::GenerationError;
use crate::loader::LoadError;
use crate::retrieval::QueryError;

/// Main error type for docqa
#[derive(Error, Debug)]
pub enum DocqaError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Ingestion run aborted
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Query aborted before an answer could be attempted
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Vector index construction, persistence or load failure
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Loader setup failure
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Embedding backend failure outside a pipeline
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// LLM backend failure outside a pipeline
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for docqa operations
pub type Result<T> = std::result::Result<T, DocqaError>;
