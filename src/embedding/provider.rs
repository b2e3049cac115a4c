/// Embedding provider trait and its backends
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding count mismatch: sent {sent} texts, got {received} vectors")]
    CountMismatch { sent: usize, received: usize },
}

/// Trait for embedding providers
///
/// Implementations must be stable: the same text yields the same vector for
/// the lifetime of the provider. `embed_batch` returns exactly one vector per
/// input, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for multiple texts
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// FastEmbed provider for local embedding generation
///
/// Uses all-MiniLM-L6-v2 model (384 dimensions) by default.
/// Inference runs on the blocking thread pool.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

/// Model, output dimension and download size (MB) for a supported FastEmbed model
fn fastembed_model(model_name: &str) -> Option<(EmbeddingModel, usize, usize)> {
    match model_name {
        "all-MiniLM-L6-v2" | "all-minilm-l6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
            Some((EmbeddingModel::AllMiniLML6V2, 384, 90))
        }
        "bge-small-en-v1.5" => Some((EmbeddingModel::BGESmallENV15, 384, 130)),
        "bge-base-en-v1.5" => Some((EmbeddingModel::BGEBaseENV15, 768, 440)),
        _ => None,
    }
}

/// Output dimension of a FastEmbed model, without loading it
pub fn fastembed_dimension(model_name: &str) -> Option<usize> {
    fastembed_model(model_name).map(|(_, dimension, _)| dimension)
}

impl FastEmbedProvider {
    /// Create a new FastEmbed provider with the specified model
    ///
    /// **Important**: Models are downloaded on-demand to `~/.cache/huggingface/`
    /// on first use.
    /// - all-MiniLM-L6-v2: 90MB (384 dims) - recommended for most use cases
    /// - bge-small-en-v1.5: 130MB (384 dims) - better accuracy
    /// - bge-base-en-v1.5: 440MB (768 dims) - highest accuracy
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let (embedding_model, dimension, model_size_mb) =
            fastembed_model(model_name).ok_or_else(|| {
                EmbeddingError::InitializationError(format!(
                    "Unsupported model: {}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                    model_name
                ))
            })?;

        tracing::info!(
            "Initializing embedding model: {} ({}D, ~{}MB download if not cached)",
            model_name,
            dimension,
            model_size_mb
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

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::GenerationError("No embeddings generated".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Dropping empty texts would shift every later vector onto the wrong chunk
        if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput(format!(
                "Empty text at batch position {}",
                pos
            )));
        }

        let model = Arc::clone(&self.model);
        let batch = texts.to_vec();
        let embeddings = tokio::task::spawn_blocking(move || model.embed(batch, None))
            .await
            .map_err(|e| EmbeddingError::GenerationError(format!("Embedding task failed: {}", e)))?
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        check_batch(texts.len(), self.dimension, &embeddings)?;
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Ollama embeddings provider (`POST {endpoint}/api/embeddings`)
///
/// Ollama embeds one prompt per request; batches are sent sequentially and
/// parallelism comes from the batch embedder above this layer.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model_name: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingsResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    /// Create a provider for `model` served at `endpoint`
    ///
    /// # Arguments
    /// * `endpoint` - Base URL, e.g. `http://localhost:11434`
    /// * `model` - Ollama embedding model tag, e.g. `nomic-embed-text`
    /// * `dimension` - Expected vector length; responses are checked against it
    /// * `timeout` - Per-request timeout
    pub fn new(
        endpoint: &str,
        model: &str,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let endpoint = endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(EmbeddingError::InitializationError(format!(
                "Invalid Ollama endpoint: {}",
                endpoint
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            client,
            url: format!("{}/api/embeddings", endpoint.trim_end_matches('/')),
            model_name: model.to_string(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let body = OllamaEmbeddingsRequest {
            model: &self.model_name,
            prompt: text,
        };

        tracing::debug!("POST {}", self.url);
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::GenerationError(format!("transport error: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let snippet: String = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(240)
                .collect();
            return Err(EmbeddingError::GenerationError(format!(
                "HTTP {} from {}: {}",
                status, self.url, snippet
            )));
        }

        let out: OllamaEmbeddingsResponse = resp
            .json()
            .await
            .map_err(|e| EmbeddingError::GenerationError(format!("decode error: {}", e)))?;

        if out.embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: out.embedding.len(),
            });
        }
        Ok(out.embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
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

/// Verify a backend returned one vector of the right size per input
pub(crate) fn check_batch(
    sent: usize,
    dimension: usize,
    embeddings: &[Vec<f32>],
) -> Result<(), EmbeddingError> {
    if embeddings.len() != sent {
        return Err(EmbeddingError::CountMismatch {
            sent,
            received: embeddings.len(),
        });
    }
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dimension,
            actual: bad.len(),
        });
    }
    Ok(())
}
