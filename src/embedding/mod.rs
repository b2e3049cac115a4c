//! Embedding generation
//!
//! - EmbeddingProvider trait for abstraction
//! - FastEmbedProvider for local embedding (all-MiniLM-L6-v2, 384-dim)
//! - OllamaEmbedder for models served by a local Ollama
//! - BatchEmbedder for concurrent, order-preserving batch embedding
mod batch;
mod provider;

pub use batch::{BatchEmbedError, BatchEmbedder};
pub use provider::{
    fastembed_dimension, EmbeddingError, EmbeddingProvider, FastEmbedProvider, OllamaEmbedder,
};

use crate::config::EmbeddingConfig;
use std::sync::Arc;
use std::time::Duration;

/// Resolve the configured backend once, at startup
pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.provider.as_str() {
        "fastembed" => Ok(Arc::new(FastEmbedProvider::new(&config.model)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(
            &config.endpoint,
            &config.model,
            config.dimension,
            Duration::from_secs(config.timeout_secs),
        )?)),
        other => Err(EmbeddingError::InitializationError(format!(
            "Unknown embedding provider '{}'",
            other
        ))),
    }
}
