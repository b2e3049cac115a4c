//! Retrieval and answer generation
//!
//! This module turns a question into retrieved context and, when a language
//! model is configured, an answer grounded in that context.

mod context;
mod pipeline;
mod prompt;
mod provenance;

pub use context::{assemble_context, AssembledContext};
pub use pipeline::{
    parse_answer, QueryError, QueryOutcome, QueryPipeline, QuerySettings, QueryStage,
};
pub use prompt::{PromptError, PromptTemplate, CONTEXT_SLOT, DEFAULT_TEMPLATE, QUESTION_SLOT};
pub use provenance::{Provenance, ScoredChunk};
