//! Ingestion pipeline
//!
//! Load -> Chunk -> Embed -> Build -> Persist
//!
//! Each stage consumes the whole output of the previous one. A source that
//! fails to load is skipped and reported; any other failure aborts the run
//! and leaves the previously persisted index untouched.

use crate::chunker::Chunker;
use crate::document::{Chunk, Document};
use crate::embedding::{BatchEmbedder, EmbeddingError};
use crate::index::{IndexError, IndexOptions, VectorIndex};
use crate::loader::{discover_sources, Loader};
use serde::Serialize;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Discover,
    Load,
    Chunk,
    Embed,
    Build,
    Persist,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStage::Discover => "discover",
            IngestStage::Load => "load",
            IngestStage::Chunk => "chunk",
            IngestStage::Embed => "embed",
            IngestStage::Build => "build",
            IngestStage::Persist => "persist",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Ingestion failed at {stage}: cannot list {path}: {source}")]
    Discover {
        stage: IngestStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Ingestion failed at {stage}: no chunks produced ({documents} documents loaded, {failed} sources failed); add readable files to the source directory"
    )]
    EmptyCorpus {
        stage: IngestStage,
        documents: usize,
        failed: usize,
    },

    #[error(
        "Ingestion failed at {stage}: batch {batch} (chunks {range:?}, starting at {first_chunk}): {source}"
    )]
    Embedding {
        stage: IngestStage,
        batch: usize,
        range: Range<usize>,
        /// Locator of the first chunk in the failing batch
        first_chunk: String,
        #[source]
        source: EmbeddingError,
    },

    #[error("Ingestion failed at {stage}: {source}")]
    Index {
        stage: IngestStage,
        #[source]
        source: IndexError,
    },
}

/// A source skipped during the load stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub sources_seen: usize,
    pub documents_loaded: usize,
    pub sources_failed: Vec<SourceFailure>,
    pub chunks: usize,
    pub dimension: usize,
    pub build_id: Uuid,
    pub duration_ms: u64,
    pub index_path: PathBuf,
}

pub struct IngestPipeline {
    loader: Arc<dyn Loader>,
    chunker: Chunker,
    embedder: BatchEmbedder,
    options: IndexOptions,
}

impl IngestPipeline {
    /// Create an ingestion pipeline
    ///
    /// The embedding model name is recorded in the index unless `options`
    /// already names one.
    pub fn new(
        loader: Arc<dyn Loader>,
        chunker: Chunker,
        embedder: BatchEmbedder,
        mut options: IndexOptions,
    ) -> Self {
        if options.embedding_model.is_none() {
            options.embedding_model = Some(embedder.provider().model_name().to_string());
        }
        Self {
            loader,
            chunker,
            embedder,
            options,
        }
    }

    /// Discover sources under `source_dir` and ingest them into `index_dir`
    pub async fn run_dir(
        &self,
        source_dir: &Path,
        extensions: &[String],
        recursive: bool,
        index_dir: &Path,
    ) -> Result<IngestReport, IngestError> {
        let sources =
            discover_sources(source_dir, extensions, recursive).map_err(|source| {
                IngestError::Discover {
                    stage: IngestStage::Discover,
                    path: source_dir.to_path_buf(),
                    source,
                }
            })?;
        info!(
            "Discovered {} sources in {}",
            sources.len(),
            source_dir.display()
        );
        self.run(&sources, index_dir).await
    }

    /// Ingest `sources` and replace the index at `index_dir`
    pub async fn run(&self, sources: &[PathBuf], index_dir: &Path) -> Result<IngestReport, IngestError> {
        let start = Instant::now();

        // Load
        let (documents, sources_failed) = self.load(sources);
        info!(
            "[{}] {} documents from {} sources ({} failed)",
            IngestStage::Load,
            documents.len(),
            sources.len(),
            sources_failed.len()
        );

        // Chunk
        let chunks: Vec<Chunk> = self
            .chunker
            .split_all(&documents)
            .into_iter()
            .filter(|c| !c.text.trim().is_empty())
            .collect();
        if chunks.is_empty() {
            return Err(IngestError::EmptyCorpus {
                stage: IngestStage::Chunk,
                documents: documents.len(),
                failed: sources_failed.len(),
            });
        }
        info!(
            "[{}] {} chunks (max {} chars, overlap {})",
            IngestStage::Chunk,
            chunks.len(),
            self.chunker.max_size(),
            self.chunker.overlap()
        );

        // Embed
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_all(&texts).await.map_err(|e| {
            IngestError::Embedding {
                stage: IngestStage::Embed,
                batch: e.batch,
                first_chunk: chunks
                    .get(e.range.start)
                    .map(Chunk::locator)
                    .unwrap_or_default(),
                range: e.range,
                source: e.source,
            }
        })?;
        info!("[{}] {} vectors", IngestStage::Embed, vectors.len());

        // Build
        let items: Vec<(Vec<f32>, Chunk)> = vectors.into_iter().zip(chunks).collect();
        let index = VectorIndex::build(items, &self.options).map_err(|source| IngestError::Index {
            stage: IngestStage::Build,
            source,
        })?;

        // Persist
        index.persist(index_dir).map_err(|source| IngestError::Index {
            stage: IngestStage::Persist,
            source,
        })?;

        let report = IngestReport {
            sources_seen: sources.len(),
            documents_loaded: documents.len(),
            sources_failed,
            chunks: index.len(),
            dimension: index.dimension(),
            build_id: index.build_id(),
            duration_ms: start.elapsed().as_millis() as u64,
            index_path: index_dir.to_path_buf(),
        };
        info!(
            "Ingestion complete: {} chunks from {} documents in {}ms",
            report.chunks, report.documents_loaded, report.duration_ms
        );
        Ok(report)
    }

    fn load(&self, sources: &[PathBuf]) -> (Vec<Document>, Vec<SourceFailure>) {
        let mut documents = Vec::new();
        let mut failures = Vec::new();

        for path in sources {
            match self.loader.load(path) {
                Ok(docs) => {
                    debug!("Loaded {} ({} documents)", path.display(), docs.len());
                    documents.extend(docs);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    failures.push(SourceFailure {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        (documents, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_stage() {
        let err = IngestError::EmptyCorpus {
            stage: IngestStage::Chunk,
            documents: 0,
            failed: 2,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Ingestion failed at chunk"));
        assert!(msg.contains("2 sources failed"));
    }

    #[test]
    fn test_embedding_error_message() {
        let err = IngestError::Embedding {
            stage: IngestStage::Embed,
            batch: 2,
            range: 64..96,
            first_chunk: "data/a.md#0@0..1000".to_string(),
            source: EmbeddingError::GenerationError("backend down".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("batch 2"));
        assert!(msg.contains("data/a.md#0@0..1000"));
        assert!(msg.contains("backend down"));
    }
}
