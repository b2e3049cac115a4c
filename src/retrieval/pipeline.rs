//! Query pipeline
//!
//! EmbedQuery -> Search(k) -> AssembleContext -> BuildPrompt -> Generate -> ParseAnswer
//!
//! Only the first two stages can fail the query. Generation problems are
//! carried in the outcome next to the retrieved context.

use super::{assemble_context, PromptTemplate, Provenance, ScoredChunk};
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::index::{IndexError, IndexHandle};
use crate::llm::{GenerationError, LlmClient};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    EmbedQuery,
    Search,
    AssembleContext,
    BuildPrompt,
    Generate,
    ParseAnswer,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryStage::EmbedQuery => "embed-query",
            QueryStage::Search => "search",
            QueryStage::AssembleContext => "assemble-context",
            QueryStage::BuildPrompt => "build-prompt",
            QueryStage::Generate => "generate",
            QueryStage::ParseAnswer => "parse-answer",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Question cannot be empty")]
    EmptyQuestion,

    #[error("Query failed at {stage}: {source}")]
    Embedding {
        stage: QueryStage,
        #[source]
        source: EmbeddingError,
    },

    #[error("Query failed at {stage}: {source}")]
    Index {
        stage: QueryStage,
        #[source]
        source: IndexError,
    },
}

/// Tunables that do not change between queries
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySettings {
    /// Chunks retrieved per question
    pub k: usize,
    /// Joins chunk texts into the context block
    pub delimiter: String,
    /// Upper bound on a single generation call
    pub generation_timeout: Duration,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            k: 3,
            delimiter: "\n\n".to_string(),
            generation_timeout: Duration::from_secs(60),
        }
    }
}

/// Everything a query produced
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub question: String,
    /// Retrieved chunks, best first
    pub retrieved: Vec<ScoredChunk>,
    pub context: String,
    pub citations: Vec<Provenance>,
    pub prompt: String,
    /// Trimmed answer, or why there is none
    pub generation: Result<String, GenerationError>,
}

impl QueryOutcome {
    pub fn answer(&self) -> Option<&str> {
        self.generation.as_deref().ok()
    }
}

pub struct QueryPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<IndexHandle>,
    llm: Option<Arc<dyn LlmClient>>,
    template: PromptTemplate,
    settings: QuerySettings,
}

impl QueryPipeline {
    /// Create a query pipeline
    ///
    /// # Arguments
    /// * `embedder` - Must be the model the index was built with
    /// * `index` - Live index; reloads through the handle are picked up by the next query
    /// * `llm` - `None` runs retrieval only and reports `NotConfigured`
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<IndexHandle>,
        llm: Option<Arc<dyn LlmClient>>,
        template: PromptTemplate,
        settings: QuerySettings,
    ) -> Self {
        Self {
            embedder,
            index,
            llm,
            template,
            settings,
        }
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn index(&self) -> &Arc<IndexHandle> {
        &self.index
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    /// Embed the question and return the `k` most similar chunks
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<ScoredChunk>, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::EmptyQuestion);
        }

        let vector = self
            .embedder
            .embed(question)
            .await
            .map_err(|source| QueryError::Embedding {
                stage: QueryStage::EmbedQuery,
                source,
            })?;

        let index = self.index.current();
        let hits = index.query(&vector, k).map_err(|source| QueryError::Index {
            stage: QueryStage::Search,
            source,
        })?;

        debug!("Retrieved {} chunks from index {}", hits.len(), index.build_id());
        Ok(hits.into_iter().map(ScoredChunk::from_hit).collect())
    }

    /// Answer with the configured `k`
    pub async fn ask(&self, question: &str) -> Result<QueryOutcome, QueryError> {
        self.ask_with_k(question, self.settings.k).await
    }

    /// Run the full pipeline
    pub async fn ask_with_k(&self, question: &str, k: usize) -> Result<QueryOutcome, QueryError> {
        let start = std::time::Instant::now();
        let retrieved = self.retrieve(question, k).await?;
        if retrieved.is_empty() {
            warn!("No context retrieved; the index is empty");
        }

        let context = assemble_context(&retrieved, &self.settings.delimiter);
        let prompt = self.template.render(&context.text, question.trim());
        let generation = self.generate(&prompt).await;

        match &generation {
            Ok(answer) => info!(
                "Answered in {}ms ({} chunks, {} answer chars)",
                start.elapsed().as_millis(),
                retrieved.len(),
                answer.chars().count()
            ),
            Err(e) => warn!("{} stage did not produce an answer: {}", QueryStage::Generate, e),
        }

        Ok(QueryOutcome {
            question: question.trim().to_string(),
            retrieved,
            context: context.text,
            citations: context.citations,
            prompt,
            generation,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let Some(llm) = &self.llm else {
            return Err(GenerationError::NotConfigured(
                "enable [llm] and set its API key to generate answers".to_string(),
            ));
        };

        let timeout = self.settings.generation_timeout;
        debug!("Generating with {} (timeout {:?})", llm.model_name(), timeout);
        let raw = tokio::time::timeout(timeout, llm.generate(prompt))
            .await
            .map_err(|_| GenerationError::Timeout(timeout))??;

        parse_answer(&raw)
    }
}

/// Trim the completion; an empty answer is an error
pub fn parse_answer(raw: &str) -> Result<String, GenerationError> {
    let answer = raw.trim();
    if answer.is_empty() {
        return Err(GenerationError::EmptyCompletion);
    }
    Ok(answer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("  Paris.\n").unwrap(), "Paris.");
        assert_eq!(parse_answer(" \n\t"), Err(GenerationError::EmptyCompletion));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(QueryStage::EmbedQuery.to_string(), "embed-query");
        assert_eq!(QueryStage::Search.to_string(), "search");

        let err = QueryError::Index {
            stage: QueryStage::Search,
            source: IndexError::EmptyInput,
        };
        assert!(err.to_string().starts_with("Query failed at search"));
    }
}
