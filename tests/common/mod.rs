//! Deterministic test doubles for the embedding and LLM seams
#![allow(dead_code)]

use async_trait::async_trait;
use docqa::embedding::{EmbeddingError, EmbeddingProvider};
use docqa::llm::{GenerationError, LlmClient};
use std::sync::Mutex;
use std::time::Duration;

pub const DIM: usize = 64;

/// Bag-of-words embedder: each lowercase word bumps one hashed bucket
///
/// Texts sharing vocabulary score high under cosine similarity, which is
/// enough to make retrieval results predictable.
pub struct HashEmbedder {
    /// Any text containing this marker fails to embed
    pub poison: Option<String>,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self { poison: None }
    }

    pub fn poisoned(marker: &str) -> Self {
        Self {
            poison: Some(marker.to_string()),
        }
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = blake3::hash(word.to_lowercase().as_bytes());
            let bucket = u64::from_le_bytes(hash.as_bytes()[..8].try_into().unwrap()) as usize % DIM;
            v[bucket] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if let Some(marker) = &self.poison {
            if text.contains(marker.as_str()) {
                return Err(EmbeddingError::GenerationError("model crashed".to_string()));
            }
        }
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "hash-bow"
    }
}

/// LLM double that records prompts and replies with a fixed answer
pub struct ScriptedLlm {
    reply: String,
    delay: Duration,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            reply: "too late".to_string(),
            delay,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.reply.clone())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub const HANDBOOK: &str = "Construction Packages\n\n\
The Essential package starts at 1851 rupees per square foot and uses standard steel.\n\n\
The Premier package costs 1995 rupees per square foot and includes branded fittings.\n\n\
Payments\n\n\
Payments follow an escrow-based model. Funds are released to the contractor only after \
each construction stage passes inspection.";

pub const FAQ: &str = "Frequently asked questions\n\n\
Quality checks: every site goes through 445 quality checkpoints before handover.\n\n\
Maintenance: the zero cost maintenance program covers plumbing and electrical repairs \
for the first year.";
