//! Language model clients
//!
//! - `LlmClient` trait: one prompt in, one completion out
//! - `OllamaClient` for a local Ollama (`/api/generate`)
//! - `OpenAiClient` for OpenAI-compatible APIs (OpenAI, OpenRouter)

mod ollama;
mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Generation failures
///
/// These never abort a query; they are reported alongside the retrieved
/// context.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("No language model configured: {0}")]
    NotConfigured(String),

    #[error("Generation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected HTTP status {status} from {url}: {snippet}")]
    HttpStatus {
        status: u16,
        url: String,
        snippet: String,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Model returned an empty completion")]
    EmptyCompletion,
}

/// Trait for language model backends
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete `prompt`, returning the raw completion text
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    fn model_name(&self) -> &str;
}

/// Resolve the configured backend
///
/// Returns `Ok(None)` when generation is disabled or the provider's API key
/// is not set; queries then report `NotConfigured` instead of an answer.
pub fn from_config(config: &LlmConfig) -> Result<Option<Arc<dyn LlmClient>>, GenerationError> {
    if !config.enabled {
        info!("LLM generation disabled in configuration");
        return Ok(None);
    }

    let timeout = Duration::from_secs(config.timeout_secs);
    match config.provider.as_str() {
        "ollama" => {
            let client = OllamaClient::new(
                &config.endpoint,
                &config.model,
                config.temperature,
                config.max_tokens,
                timeout,
            )?;
            Ok(Some(Arc::new(client)))
        }
        "openai" | "openrouter" => {
            let api_key = match std::env::var(&config.api_key_env) {
                Ok(key) if !key.trim().is_empty() => key,
                _ => {
                    warn!(
                        "{} is not set; answers will not be generated",
                        config.api_key_env
                    );
                    return Ok(None);
                }
            };
            let client = OpenAiClient::new(
                &config.endpoint,
                &config.model,
                &api_key,
                config.temperature,
                config.max_tokens,
                timeout,
            )?;
            Ok(Some(Arc::new(client)))
        }
        other => Err(GenerationError::NotConfigured(format!(
            "unknown LLM provider '{}'",
            other
        ))),
    }
}

/// Short snippet of an error response body
pub(crate) fn snippet(body: &str) -> String {
    body.chars().take(240).collect()
}
