/// HNSW candidate generation
use super::{HnswParams, Metric};
use hnsw_rs::prelude::*;
use std::fmt;

/// hnsw_rs caps the layer count at 16
const MAX_LAYER: usize = 16;

/// HNSW graph over the index vectors, keyed by entry id
pub(crate) enum AnnGraph {
    Cosine(Hnsw<'static, f32, DistCosine>),
    L2(Hnsw<'static, f32, DistL2>),
}

impl AnnGraph {
    /// Insert every vector in entry-id order
    pub(crate) fn build<'a>(
        metric: Metric,
        params: &HnswParams,
        vectors: impl ExactSizeIterator<Item = &'a [f32]>,
    ) -> Self {
        let capacity = vectors.len().max(1);
        let m = params.m.max(2);

        let graph = match metric {
            Metric::Cosine => AnnGraph::Cosine(Hnsw::<f32, DistCosine>::new(
                m,
                capacity,
                MAX_LAYER,
                params.ef_construction,
                DistCosine,
            )),
            Metric::L2 => AnnGraph::L2(Hnsw::<f32, DistL2>::new(
                m,
                capacity,
                MAX_LAYER,
                params.ef_construction,
                DistL2,
            )),
        };

        for (id, vector) in vectors.enumerate() {
            match &graph {
                AnnGraph::Cosine(hnsw) => hnsw.insert((vector, id)),
                AnnGraph::L2(hnsw) => hnsw.insert((vector, id)),
            }
        }

        graph
    }

    /// Entry ids of the approximate `k` nearest neighbours
    pub(crate) fn candidates(&self, query: &[f32], k: usize, ef_search: usize) -> Vec<usize> {
        let ef = ef_search.max(k);
        let neighbours = match self {
            AnnGraph::Cosine(hnsw) => hnsw.search(query, k, ef),
            AnnGraph::L2(hnsw) => hnsw.search(query, k, ef),
        };
        neighbours.into_iter().map(|n| n.d_id).collect()
    }
}

impl fmt::Debug for AnnGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnGraph::Cosine(_) => write!(f, "AnnGraph::Cosine"),
            AnnGraph::L2(_) => write!(f, "AnnGraph::L2"),
        }
    }
}
