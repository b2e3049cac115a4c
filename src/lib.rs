//! docqa - Question answering over a private document corpus
//!
//! Documents are split into bounded, overlapping chunks, embedded, and stored
//! in a persistent vector index. Questions are answered by retrieving the
//! most similar chunks and handing them to a language model as context.

pub mod chunker;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod retrieval;

pub use error::{DocqaError, Result};
