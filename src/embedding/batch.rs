/// Concurrent, order-preserving batch embedding
use super::{EmbeddingError, EmbeddingProvider};
use futures::stream::{self, StreamExt};
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// A batch failed; no partial result is returned
#[derive(Error, Debug)]
#[error("Embedding batch {batch} (items {range:?}) failed: {source}")]
pub struct BatchEmbedError {
    /// Index of the failing batch
    pub batch: usize,
    /// Positions of the batch's items in the input
    pub range: Range<usize>,
    #[source]
    pub source: EmbeddingError,
}

/// Batch embedder
///
/// Splits input into batches of `batch_size` and keeps up to
/// `max_concurrent` batches in flight. Results are written back by batch
/// index, so output order always matches input order.
pub struct BatchEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_concurrent: usize,
}

impl BatchEmbedder {
    /// Create a new batch embedder
    ///
    /// # Arguments
    /// * `provider` - Embedding provider
    /// * `batch_size` - Number of texts per provider call
    /// * `max_concurrent` - Maximum concurrent provider calls
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize, max_concurrent: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed every text, returning one vector per text in input order
    pub async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BatchEmbedError> {
        let start = std::time::Instant::now();
        let batches: Vec<Range<usize>> = (0..texts.len())
            .step_by(self.batch_size)
            .map(|lo| lo..(lo + self.batch_size).min(texts.len()))
            .collect();

        info!(
            "Embedding {} texts in {} batches (concurrency {})",
            texts.len(),
            batches.len(),
            self.max_concurrent
        );

        let mut results: Vec<Option<Vec<Vec<f32>>>> = vec![None; batches.len()];

        let mut in_flight = stream::iter(batches.iter().cloned().enumerate())
            .map(|(batch, range)| {
                let provider = Arc::clone(&self.provider);
                async move {
                    let outcome = provider.embed_batch(&texts[range.clone()]).await;
                    (batch, range, outcome)
                }
            })
            .buffer_unordered(self.max_concurrent);

        while let Some((batch, range, outcome)) = in_flight.next().await {
            let vectors = outcome
                .and_then(|vectors| {
                    super::provider::check_batch(range.len(), self.provider.dimension(), &vectors)
                        .map(|_| vectors)
                })
                .map_err(|source| BatchEmbedError {
                    batch,
                    range: range.clone(),
                    source,
                })?;
            debug!("Embedded batch {} ({} items)", batch, vectors.len());
            results[batch] = Some(vectors);
        }

        let embeddings: Vec<Vec<f32>> = results.into_iter().flatten().flatten().collect();

        info!(
            "Embedding complete: {} vectors in {}ms",
            embeddings.len(),
            start.elapsed().as_millis()
        );
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Encodes the text's length; later batches answer first
    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![text.len() as f32, 1.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let delay = 40u64.saturating_sub(texts[0].len() as u64 * 4);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            let mut out = Vec::new();
            for text in texts {
                if text == "boom" {
                    return Err(EmbeddingError::GenerationError("backend down".to_string()));
                }
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "length"
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (1..=n).map(|i| "x".repeat(i)).collect()
    }

    #[tokio::test]
    async fn test_preserves_input_order() {
        let embedder = BatchEmbedder::new(Arc::new(LengthEmbedder), 2, 4);
        let input = texts(9);

        let vectors = embedder.embed_all(&input).await.unwrap();
        assert_eq!(vectors.len(), 9);
        for (i, v) in vectors.iter().enumerate() {
            assert_eq!(v[0], (i + 1) as f32);
        }
    }

    #[tokio::test]
    async fn test_empty_input() {
        let embedder = BatchEmbedder::new(Arc::new(LengthEmbedder), 8, 2);
        assert!(embedder.embed_all(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_names_batch() {
        let embedder = BatchEmbedder::new(Arc::new(LengthEmbedder), 3, 2);
        let mut input = texts(7);
        input[4] = "boom".to_string();

        let err = embedder.embed_all(&input).await.unwrap_err();
        assert_eq!(err.batch, 1);
        assert_eq!(err.range, 3..6);
    }
}
