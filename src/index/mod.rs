//! Vector index over chunk embeddings
//!
//! Architecture:
//! - `VectorIndex` holds one entry per chunk in a dense array (entry id = position)
//! - Exact brute-force scan is the reference search; HNSW (`hnsw_rs`) is an
//!   optional candidate generator whose hits are re-scored exactly
//! - Persistence is a manifest plus a zstd-compressed, BLAKE3-checksummed
//!   entries file, committed by atomic rename
//! - `IndexHandle` lets a server swap in a freshly loaded index atomically

mod ann;
mod handle;
mod persist;
mod vector_index;

pub use handle::IndexHandle;
pub use persist::{IndexManifest, FORMAT_VERSION, MANIFEST_FILE};
pub use vector_index::{IndexEntry, SearchHit, VectorIndex};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Cannot build an index from zero entries")]
    EmptyInput,

    #[error("Vectors must have at least one dimension")]
    ZeroDimension,

    #[error("Dimension mismatch for {subject}: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        subject: String,
    },

    #[error("Vector for entry {entry_id} contains NaN or infinite values")]
    NonFiniteVector { entry_id: usize },

    #[error("No index found at {path}; run `docqa ingest` to build one")]
    IndexNotFound { path: PathBuf },

    #[error("Incompatible index at {path}: {reason}")]
    IncompatibleIndex { path: PathBuf, reason: String },

    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Similarity metric, fixed when the index is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity, score in [-1, 1]
    Cosine,
    /// Euclidean distance, reported as `1 / (1 + distance)`
    L2,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cosine => write!(f, "cosine"),
            Metric::L2 => write!(f, "l2"),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "l2" | "euclidean" => Ok(Metric::L2),
            other => Err(format!("expected 'cosine' or 'l2', got '{}'", other)),
        }
    }
}

/// HNSW tuning parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HnswParams {
    /// Connections per layer
    pub m: usize,
    /// Construction beam width (higher = better recall, slower build)
    pub ef_construction: usize,
    /// Search beam width (higher = better recall, slower search)
    pub ef_search: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 64,
        }
    }
}

/// How candidates are found at query time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchStrategy {
    /// Score every entry
    #[default]
    Exact,
    /// Approximate candidates from an HNSW graph, then exact re-scoring
    Hnsw(HnswParams),
}

/// Build-time options
#[derive(Debug, Clone, PartialEq)]
pub struct IndexOptions {
    pub metric: Metric,
    pub strategy: SearchStrategy,
    /// Recorded in the manifest so a later query can refuse a different model
    pub embedding_model: Option<String>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            metric: Metric::Cosine,
            strategy: SearchStrategy::Exact,
            embedding_model: None,
        }
    }
}

/// What a caller requires of a persisted index
///
/// Unset fields are not checked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexExpectation {
    pub dimension: Option<usize>,
    pub metric: Option<Metric>,
    pub embedding_model: Option<String>,
}

/// Cosine similarity, 0.0 when either vector has zero length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a = norm(a);
    let mag_b = norm(b);
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

pub(crate) fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
