/// In-memory vector index with exact and HNSW-assisted search
use super::ann::AnnGraph;
use super::{norm, IndexError, IndexOptions, Metric, SearchStrategy};
use crate::document::Chunk;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::{debug, info};
use uuid::Uuid;

/// One indexed chunk and its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Position in the index, assigned at build time
    pub entry_id: usize,
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

/// A single query result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub entry_id: usize,
    /// Higher is more similar
    pub score: f32,
    pub chunk: Chunk,
}

/// Immutable vector index
///
/// Entries are never mutated after build; readers can share an index behind
/// an `Arc` without locking.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    metric: Metric,
    strategy: SearchStrategy,
    entries: Vec<IndexEntry>,
    norms: Vec<f32>,
    ann: Option<AnnGraph>,
    build_id: Uuid,
    embedding_model: Option<String>,
    created_at: DateTime<Utc>,
}

impl VectorIndex {
    /// Build an index from `(vector, chunk)` pairs
    ///
    /// The first vector fixes the dimension. Every vector must match it and
    /// contain only finite values.
    pub fn build(
        items: Vec<(Vec<f32>, Chunk)>,
        options: &IndexOptions,
    ) -> Result<Self, IndexError> {
        let dimension = match items.first() {
            None => return Err(IndexError::EmptyInput),
            Some((v, _)) if v.is_empty() => return Err(IndexError::ZeroDimension),
            Some((v, _)) => v.len(),
        };

        for (entry_id, (vector, _)) in items.iter().enumerate() {
            validate_vector(entry_id, vector, dimension)?;
        }

        let index = Self::assemble(
            items,
            dimension,
            options.metric,
            options.strategy,
            Uuid::new_v4(),
            options.embedding_model.clone(),
            Utc::now(),
        );

        info!(
            "Built {} index: {} entries, {} dimensions ({:?})",
            index.metric,
            index.len(),
            index.dimension,
            index.strategy
        );
        Ok(index)
    }

    /// Assemble an index from already-validated parts
    pub(crate) fn assemble(
        items: Vec<(Vec<f32>, Chunk)>,
        dimension: usize,
        metric: Metric,
        strategy: SearchStrategy,
        build_id: Uuid,
        embedding_model: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let entries: Vec<IndexEntry> = items
            .into_iter()
            .enumerate()
            .map(|(entry_id, (vector, chunk))| IndexEntry {
                entry_id,
                vector,
                chunk,
            })
            .collect();

        let norms = entries.iter().map(|e| norm(&e.vector)).collect();

        let ann = match strategy {
            SearchStrategy::Hnsw(params) if !entries.is_empty() => Some(AnnGraph::build(
                metric,
                &params,
                entries.iter().map(|e| e.vector.as_slice()),
            )),
            _ => None,
        };

        Self {
            dimension,
            metric,
            strategy,
            entries,
            norms,
            ann,
            build_id,
            embedding_model,
            created_at,
        }
    }

    /// Return the `k` entries most similar to `query`, best first
    ///
    /// Ties are broken by ascending entry id, so results are deterministic.
    /// Fewer than `k` hits are returned when the index is smaller than `k`.
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
                subject: "query vector".to_string(),
            });
        }
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_norm = norm(query);
        let scored: Vec<(usize, f32)> = match (&self.ann, self.strategy) {
            (Some(graph), SearchStrategy::Hnsw(params)) => graph
                .candidates(query, k, params.ef_search)
                .into_iter()
                .filter(|&id| id < self.entries.len())
                .map(|id| (id, self.score(query, query_norm, id)))
                .collect(),
            _ => (0..self.entries.len())
                .map(|id| (id, self.score(query, query_norm, id)))
                .collect(),
        };

        let hits: Vec<SearchHit> = top_k(scored, k)
            .into_iter()
            .map(|(id, score)| SearchHit {
                entry_id: id,
                score,
                chunk: self.entries[id].chunk.clone(),
            })
            .collect();

        debug!("Query returned {} hits (k={})", hits.len(), k);
        Ok(hits)
    }

    fn score(&self, query: &[f32], query_norm: f32, id: usize) -> f32 {
        let vector = &self.entries[id].vector;
        match self.metric {
            Metric::Cosine => {
                let entry_norm = self.norms[id];
                if query_norm == 0.0 || entry_norm == 0.0 {
                    return 0.0;
                }
                let dot: f32 = query.iter().zip(vector).map(|(a, b)| a * b).sum();
                dot / (query_norm * entry_norm)
            }
            Metric::L2 => {
                let distance = query
                    .iter()
                    .zip(vector)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + distance)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn strategy(&self) -> SearchStrategy {
        self.strategy
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn build_id(&self) -> Uuid {
        self.build_id
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

pub(crate) fn validate_vector(
    entry_id: usize,
    vector: &[f32],
    dimension: usize,
) -> Result<(), IndexError> {
    if vector.len() != dimension {
        return Err(IndexError::DimensionMismatch {
            expected: dimension,
            actual: vector.len(),
            subject: format!("entry {}", entry_id),
        });
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(IndexError::NonFiniteVector { entry_id });
    }
    Ok(())
}

/// Score descending, then entry id ascending
fn by_rank(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

fn top_k(mut scored: Vec<(usize, f32)>, k: usize) -> Vec<(usize, f32)> {
    if scored.len() > k {
        scored.select_nth_unstable_by(k - 1, by_rank);
        scored.truncate(k);
    }
    scored.sort_by(by_rank);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::HnswParams;

    fn chunk(n: usize) -> Chunk {
        Chunk {
            source_id: "doc.txt".to_string(),
            ordinal: 0,
            start_offset: n * 10,
            end_offset: n * 10 + 10,
            text: format!("chunk {}", n),
        }
    }

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    /// Deterministic pseudo-random vectors (LCG)
    fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                (0..dim)
                    .map(|_| {
                        state = state
                            .wrapping_mul(6364136223846793005)
                            .wrapping_add(1442695040888963407);
                        ((state >> 33) as f32 / (1u64 << 31) as f32) - 0.5
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_query_returns_top_k_in_order() {
        let items: Vec<_> = (0..5).map(|i| (unit(384, i), chunk(i))).collect();
        let index = VectorIndex::build(items, &IndexOptions::default()).unwrap();
        assert_eq!(index.len(), 5);
        assert_eq!(index.dimension(), 384);

        let mut query = vec![0.0; 384];
        query[2] = 1.0;
        query[4] = 0.5;
        query[0] = 0.25;

        let hits = index.query(&query, 3).unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.entry_id).collect();
        assert_eq!(ids, vec![2, 4, 0]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(hits[0].chunk.text, "chunk 2");
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let items: Vec<_> = (0..5).map(|i| (unit(384, i), chunk(i))).collect();
        let index = VectorIndex::build(items, &IndexOptions::default()).unwrap();

        let err = index.query(&vec![0.1; 128], 3).unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch { expected: 384, actual: 128, .. }
        ));
    }

    #[test]
    fn test_build_rejects_empty_and_ragged() {
        assert!(matches!(
            VectorIndex::build(Vec::new(), &IndexOptions::default()),
            Err(IndexError::EmptyInput)
        ));

        let ragged = vec![(vec![1.0, 0.0], chunk(0)), (vec![1.0, 0.0, 0.0], chunk(1))];
        assert!(matches!(
            VectorIndex::build(ragged, &IndexOptions::default()),
            Err(IndexError::DimensionMismatch { expected: 2, actual: 3, .. })
        ));

        let nan = vec![(vec![1.0, 0.0], chunk(0)), (vec![f32::NAN, 0.0], chunk(1))];
        assert!(matches!(
            VectorIndex::build(nan, &IndexOptions::default()),
            Err(IndexError::NonFiniteVector { entry_id: 1 })
        ));

        assert!(matches!(
            VectorIndex::build(vec![(Vec::new(), chunk(0))], &IndexOptions::default()),
            Err(IndexError::ZeroDimension)
        ));
    }

    #[test]
    fn test_k_larger_than_index_and_zero_k() {
        let items: Vec<_> = (0..3).map(|i| (unit(4, i), chunk(i))).collect();
        let index = VectorIndex::build(items, &IndexOptions::default()).unwrap();

        assert_eq!(index.query(&unit(4, 0), 10).unwrap().len(), 3);
        assert!(index.query(&unit(4, 0), 0).unwrap().is_empty());
    }

    #[test]
    fn test_ties_break_by_entry_id() {
        let items: Vec<_> = (0..6).map(|i| (vec![1.0, 1.0], chunk(i))).collect();
        let index = VectorIndex::build(items, &IndexOptions::default()).unwrap();

        let hits = index.query(&[1.0, 1.0], 4).unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.entry_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let items = vec![(vec![0.0, 0.0], chunk(0)), (vec![1.0, 0.0], chunk(1))];
        let index = VectorIndex::build(items, &IndexOptions::default()).unwrap();

        let hits = index.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].entry_id, 1);
        assert_eq!(hits[1].score, 0.0);

        let hits = index.query(&[0.0, 0.0], 2).unwrap();
        assert!(hits.iter().all(|h| h.score == 0.0));
    }

    #[test]
    fn test_l2_metric() {
        let items = vec![
            (vec![0.0, 0.0], chunk(0)),
            (vec![3.0, 4.0], chunk(1)),
            (vec![1.0, 0.0], chunk(2)),
        ];
        let options = IndexOptions {
            metric: Metric::L2,
            ..IndexOptions::default()
        };
        let index = VectorIndex::build(items, &options).unwrap();

        let hits = index.query(&[0.0, 0.0], 3).unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.entry_id).collect();
        assert_eq!(ids, vec![0, 2, 1]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[2].score - 1.0 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_hnsw_recall_against_exact() {
        let vectors = random_vectors(500, 32, 7);
        let items: Vec<_> = vectors
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, v)| (v, chunk(i)))
            .collect();

        let exact = VectorIndex::build(items.clone(), &IndexOptions::default()).unwrap();
        let approx = VectorIndex::build(
            items,
            &IndexOptions {
                strategy: SearchStrategy::Hnsw(HnswParams::default()),
                ..IndexOptions::default()
            },
        )
        .unwrap();

        let queries = random_vectors(20, 32, 99);
        let mut found = 0;
        for q in &queries {
            let truth: Vec<usize> = exact.query(q, 10).unwrap().iter().map(|h| h.entry_id).collect();
            let got = approx.query(q, 10).unwrap();
            assert!(got.windows(2).all(|w| w[0].score >= w[1].score));
            found += got.iter().filter(|h| truth.contains(&h.entry_id)).count();
        }

        let recall = found as f32 / (queries.len() * 10) as f32;
        assert!(recall >= 0.9, "recall@10 was {}", recall);
    }

    #[test]
    fn test_hnsw_scores_match_exact() {
        let vectors = random_vectors(50, 8, 3);
        let items: Vec<_> = vectors
            .into_iter()
            .enumerate()
            .map(|(i, v)| (v, chunk(i)))
            .collect();
        let exact = VectorIndex::build(items.clone(), &IndexOptions::default()).unwrap();
        let approx = VectorIndex::build(
            items,
            &IndexOptions {
                strategy: SearchStrategy::Hnsw(HnswParams::default()),
                ..IndexOptions::default()
            },
        )
        .unwrap();

        let q = &exact.entries()[7].vector.clone();
        let top_exact = &exact.query(q, 1).unwrap()[0];
        let top_approx = &approx.query(q, 1).unwrap()[0];
        assert_eq!(top_exact.entry_id, 7);
        assert_eq!(top_approx.entry_id, 7);
        assert_eq!(top_exact.score, top_approx.score);
    }
}
