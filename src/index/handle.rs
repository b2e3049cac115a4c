/// Atomically swappable reference to the live index
use super::{IndexError, IndexExpectation, SearchStrategy, VectorIndex};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Shared handle to the index currently serving queries
///
/// Queries take a snapshot with `current()` and keep using it even if a
/// reload swaps in a new build mid-query.
pub struct IndexHandle {
    current: RwLock<Arc<VectorIndex>>,
}

impl IndexHandle {
    pub fn new(index: VectorIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    /// Snapshot of the live index
    pub fn current(&self) -> Arc<VectorIndex> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the live index, returning the previous one
    pub fn swap(&self, index: VectorIndex) -> Arc<VectorIndex> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, Arc::new(index))
    }

    /// Load the index at `dir` and swap it in
    ///
    /// On error the live index is left untouched.
    pub fn reload(
        &self,
        dir: &Path,
        strategy: SearchStrategy,
        expect: &IndexExpectation,
    ) -> Result<Arc<VectorIndex>, IndexError> {
        let fresh = VectorIndex::load_with(dir, strategy, expect)?;
        info!(
            "Reloaded index {} ({} entries)",
            fresh.build_id(),
            fresh.len()
        );
        self.swap(fresh);
        Ok(self.current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;
    use crate::index::IndexOptions;
    use tempfile::TempDir;

    fn index_of(n: usize) -> VectorIndex {
        let items = (0..n)
            .map(|i| {
                let chunk = Chunk {
                    source_id: "a.txt".to_string(),
                    ordinal: 0,
                    start_offset: i,
                    end_offset: i + 1,
                    text: format!("{}", i),
                };
                (vec![1.0, i as f32], chunk)
            })
            .collect();
        VectorIndex::build(items, &IndexOptions::default()).unwrap()
    }

    #[test]
    fn test_snapshot_survives_swap() {
        let handle = IndexHandle::new(index_of(2));
        let before = handle.current();

        handle.swap(index_of(5));
        assert_eq!(before.len(), 2);
        assert_eq!(handle.current().len(), 5);
    }

    #[test]
    fn test_reload_failure_keeps_live_index() {
        let temp = TempDir::new().unwrap();
        let handle = IndexHandle::new(index_of(3));
        let id = handle.current().build_id();

        let result = handle.reload(temp.path(), SearchStrategy::Exact, &IndexExpectation::default());
        assert!(matches!(result, Err(IndexError::IndexNotFound { .. })));
        assert_eq!(handle.current().build_id(), id);

        let rebuilt = index_of(4);
        rebuilt.persist(temp.path()).unwrap();
        let live = handle
            .reload(temp.path(), SearchStrategy::Exact, &IndexExpectation::default())
            .unwrap();
        assert_eq!(live.build_id(), rebuilt.build_id());
        assert_eq!(live.len(), 4);
    }
}
