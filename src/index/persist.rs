//! Index persistence
//!
//! Layout of an index directory:
//! - `manifest.json`: format version, dimension, metric, build metadata and
//!   the BLAKE3 checksum of the entries payload
//! - `entries-<build_id>.json.zst`: zstd-compressed JSON array of
//!   `{vector, chunk}` in entry-id order
//!
//! The entries file is written first, then the manifest is renamed into
//! place. A reader therefore sees either the previous build or the new one,
//! never a mix.

use super::vector_index::{validate_vector, VectorIndex};
use super::{IndexError, IndexExpectation, Metric, SearchStrategy};
use crate::document::Chunk;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const FORMAT_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";
const ENTRIES_PREFIX: &str = "entries-";
const ENTRIES_SUFFIX: &str = ".json.zst";
const ZSTD_LEVEL: i32 = 3;

/// Index metadata, stored next to the entries file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub dimension: usize,
    pub metric: Metric,
    pub entry_count: usize,
    pub entries_file: String,
    /// BLAKE3 hex digest of the uncompressed entries payload
    pub checksum: String,
    pub build_id: Uuid,
    pub embedding_model: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl IndexManifest {
    /// Read the manifest of the index at `dir`
    pub fn read(dir: &Path) -> Result<Self, IndexError> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(IndexError::IndexNotFound {
                path: dir.to_path_buf(),
            });
        }

        let raw = fs::read_to_string(&path).map_err(|e| IndexError::Io {
            source: e,
            context: format!("Failed to read manifest: {}", path.display()),
        })?;

        let manifest: IndexManifest =
            serde_json::from_str(&raw).map_err(|e| IndexError::IncompatibleIndex {
                path: dir.to_path_buf(),
                reason: format!("unreadable manifest: {}", e),
            })?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(IndexError::IncompatibleIndex {
                path: dir.to_path_buf(),
                reason: format!(
                    "format version {} (this build reads version {})",
                    manifest.format_version, FORMAT_VERSION
                ),
            });
        }

        Ok(manifest)
    }

    fn check(&self, dir: &Path, expect: &IndexExpectation) -> Result<(), IndexError> {
        let incompatible = |reason: String| IndexError::IncompatibleIndex {
            path: dir.to_path_buf(),
            reason,
        };

        if let Some(dimension) = expect.dimension {
            if dimension != self.dimension {
                return Err(incompatible(format!(
                    "index has {} dimensions, embedder produces {}",
                    self.dimension, dimension
                )));
            }
        }
        if let Some(metric) = expect.metric {
            if metric != self.metric {
                return Err(incompatible(format!(
                    "index uses {} metric, configuration asks for {}",
                    self.metric, metric
                )));
            }
        }
        if let (Some(wanted), Some(built_with)) = (&expect.embedding_model, &self.embedding_model) {
            if wanted != built_with {
                return Err(incompatible(format!(
                    "index was built with embedding model '{}', configuration uses '{}'",
                    built_with, wanted
                )));
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct StoredEntryRef<'a> {
    vector: &'a [f32],
    chunk: &'a Chunk,
}

#[derive(Deserialize)]
struct StoredEntry {
    vector: Vec<f32>,
    chunk: Chunk,
}

impl VectorIndex {
    /// Persist to `dir`, replacing any previous build there
    pub fn persist(&self, dir: &Path) -> Result<IndexManifest, IndexError> {
        fs::create_dir_all(dir).map_err(|e| IndexError::Io {
            source: e,
            context: format!("Failed to create index directory: {}", dir.display()),
        })?;

        let stored: Vec<StoredEntryRef<'_>> = self
            .entries()
            .iter()
            .map(|e| StoredEntryRef {
                vector: &e.vector,
                chunk: &e.chunk,
            })
            .collect();
        let payload = serde_json::to_vec(&stored)
            .map_err(|e| IndexError::SerializationError(e.to_string()))?;
        let checksum = blake3::hash(&payload).to_hex().to_string();
        let compressed = zstd::encode_all(&payload[..], ZSTD_LEVEL).map_err(|e| IndexError::Io {
            source: e,
            context: "Failed to compress index entries".to_string(),
        })?;

        let entries_file = format!("{}{}{}", ENTRIES_PREFIX, self.build_id(), ENTRIES_SUFFIX);
        write_atomic(&dir.join(&entries_file), &compressed)?;

        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            dimension: self.dimension(),
            metric: self.metric(),
            entry_count: self.len(),
            entries_file,
            checksum,
            build_id: self.build_id(),
            embedding_model: self.embedding_model().map(str::to_string),
            created_at: self.created_at(),
        };
        let manifest_json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| IndexError::SerializationError(e.to_string()))?;
        write_atomic(&dir.join(MANIFEST_FILE), &manifest_json)?;

        remove_stale_entries(dir, &manifest.entries_file);

        info!(
            "Persisted index {} ({} entries, {} bytes compressed) to {}",
            manifest.build_id,
            manifest.entry_count,
            compressed.len(),
            dir.display()
        );
        Ok(manifest)
    }

    /// Load the index at `dir` for exact search, without compatibility checks
    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        Self::load_with(dir, SearchStrategy::Exact, &IndexExpectation::default())
    }

    /// Load the index at `dir`
    ///
    /// A missing manifest is `IndexNotFound`; a manifest that cannot be read
    /// or does not meet `expect` is `IncompatibleIndex`. A missing, empty or
    /// corrupted entries payload loads as an empty index, which answers every
    /// query with no hits.
    pub fn load_with(
        dir: &Path,
        strategy: SearchStrategy,
        expect: &IndexExpectation,
    ) -> Result<Self, IndexError> {
        let manifest = IndexManifest::read(dir)?;
        manifest.check(dir, expect)?;

        let items = match read_entries(dir, &manifest) {
            Ok(items) => items,
            Err(reason) => {
                warn!(
                    "Index entries at {} are unusable ({}); loading as an empty index",
                    dir.display(),
                    reason
                );
                Vec::new()
            }
        };

        debug!(
            "Loaded index {} with {} entries from {}",
            manifest.build_id,
            items.len(),
            dir.display()
        );

        Ok(Self::assemble(
            items,
            manifest.dimension,
            manifest.metric,
            strategy,
            manifest.build_id,
            manifest.embedding_model,
            manifest.created_at,
        ))
    }
}

/// Decode and verify the entries payload, describing any problem as text
fn read_entries(dir: &Path, manifest: &IndexManifest) -> Result<Vec<(Vec<f32>, Chunk)>, String> {
    let path = dir.join(&manifest.entries_file);
    let compressed =
        fs::read(&path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    if compressed.is_empty() {
        return Err(format!("{} is empty", path.display()));
    }

    let payload =
        zstd::decode_all(&compressed[..]).map_err(|e| format!("decompression failed: {}", e))?;

    let checksum = blake3::hash(&payload).to_hex().to_string();
    if checksum != manifest.checksum {
        return Err(format!(
            "checksum mismatch (manifest {}, payload {})",
            manifest.checksum, checksum
        ));
    }

    let stored: Vec<StoredEntry> =
        serde_json::from_slice(&payload).map_err(|e| format!("decode failed: {}", e))?;
    if stored.len() != manifest.entry_count {
        return Err(format!(
            "manifest lists {} entries, payload holds {}",
            manifest.entry_count,
            stored.len()
        ));
    }

    let mut items = Vec::with_capacity(stored.len());
    for (entry_id, entry) in stored.into_iter().enumerate() {
        validate_vector(entry_id, &entry.vector, manifest.dimension).map_err(|e| e.to_string())?;
        items.push((entry.vector, entry.chunk));
    }
    Ok(items)
}

/// Write to a temp file, fsync, then rename over `path`
fn write_atomic(path: &Path, data: &[u8]) -> Result<(), IndexError> {
    let temp_path = temp_path(path);

    let mut file = fs::File::create(&temp_path).map_err(|e| IndexError::Io {
        source: e,
        context: format!("Failed to create temp file: {}", temp_path.display()),
    })?;
    file.write_all(data).map_err(|e| IndexError::Io {
        source: e,
        context: format!("Failed to write: {}", temp_path.display()),
    })?;
    file.sync_all().map_err(|e| IndexError::Io {
        source: e,
        context: format!("Failed to sync: {}", temp_path.display()),
    })?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| IndexError::Io {
        source: e,
        context: format!(
            "Failed to rename {} -> {}",
            temp_path.display(),
            path.display()
        ),
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Best effort: a leftover file only wastes disk space
fn remove_stale_entries(dir: &Path, keep: &str) {
    let Ok(listing) = fs::read_dir(dir) else {
        return;
    };
    for entry in listing.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name != keep && name.starts_with(ENTRIES_PREFIX) && name.ends_with(ENTRIES_SUFFIX) {
            if let Err(e) = fs::remove_file(entry.path()) {
                warn!("Failed to remove stale index file {}: {}", name, e);
            } else {
                debug!("Removed stale index file {}", name);
            }
        }
    }
}
