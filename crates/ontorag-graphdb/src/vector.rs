//! Chunk embedding index.
//!
//! Vectors are stored normalized, so L2 order equals cosine order. Small
//! collections are scanned exactly; larger ones go through an HNSW graph that
//! is rebuilt lazily after inserts and then re-scored exactly.

use crate::GraphDbError;
use hnsw_rs::prelude::{DistL2, Hnsw};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Below this many vectors an exact scan is used.
pub const EXACT_SCAN_LIMIT: usize = 2048;

const HNSW_M: usize = 16;
const HNSW_EF_CONSTRUCTION: usize = 200;
const HNSW_EF_SEARCH: usize = 64;

#[derive(Default, Serialize, Deserialize)]
pub struct VectorIndex {
    /// Fixed by the first insert; every later vector must match.
    dim: Option<usize>,
    /// Node ids aligned with `vectors`.
    ids: Vec<u32>,
    vectors: Vec<Vec<f32>>,
    #[serde(skip)]
    ann: Mutex<Option<Arc<Hnsw<'static, f32, DistL2>>>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn check_dim(&self, actual: usize) -> Result<(), GraphDbError> {
        match self.dim {
            Some(expected) if expected != actual => {
                Err(GraphDbError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    pub fn insert(&mut self, node: u32, vector: &[f32]) -> Result<(), GraphDbError> {
        if vector.is_empty() {
            return Err(GraphDbError::EmptyEmbedding);
        }
        self.check_dim(vector.len())?;
        self.dim = Some(vector.len());
        self.ids.push(node);
        self.vectors.push(normalized(vector));
        *self.ann.get_mut() = None;
        Ok(())
    }

    /// The `k` nearest nodes by cosine similarity, best first. Ties break on
    /// node id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>, GraphDbError> {
        if k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }
        self.check_dim(query.len())?;
        let q = normalized(query);

        let candidates: Vec<usize> = if self.ids.len() <= EXACT_SCAN_LIMIT {
            (0..self.ids.len()).collect()
        } else {
            let ann = self.ann_index();
            let want = k.saturating_mul(4).clamp(k, self.ids.len());
            ann.search(&q, want, HNSW_EF_SEARCH.max(want))
                .into_iter()
                .map(|n| n.d_id)
                .filter(|idx| *idx < self.ids.len())
                .collect()
        };

        let mut scored: Vec<(u32, f32)> = candidates
            .into_iter()
            .map(|idx| (self.ids[idx], dot(&q, &self.vectors[idx])))
            .collect();
        scored.sort_by(|(ia, sa), (ib, sb)| sb.total_cmp(sa).then_with(|| ia.cmp(ib)));
        scored.truncate(k);
        Ok(scored)
    }

    fn ann_index(&self) -> Arc<Hnsw<'static, f32, DistL2>> {
        let mut guard = self.ann.lock();
        if let Some(ann) = guard.as_ref() {
            return ann.clone();
        }
        let nb_elem = self.vectors.len();
        let max_layer = 16.min((nb_elem as f32).ln().trunc() as usize).max(1);
        let hnsw = Hnsw::<f32, DistL2>::new(HNSW_M, nb_elem, max_layer, HNSW_EF_CONSTRUCTION, DistL2 {});
        for (i, v) in self.vectors.iter().enumerate() {
            hnsw.insert((&v[..], i));
        }
        tracing::debug!(points = nb_elem, "built chunk ANN index");
        let ann = Arc::new(hnsw);
        *guard = Some(ann.clone());
        ann
    }
}

fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_is_fixed_by_first_insert() {
        let mut index = VectorIndex::new();
        index.insert(0, &[1.0, 0.0]).unwrap();
        let err = index.insert(1, &[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            GraphDbError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[test]
    fn exact_search_orders_by_cosine() {
        let mut index = VectorIndex::new();
        index.insert(10, &[1.0, 0.0]).unwrap();
        index.insert(11, &[0.0, 1.0]).unwrap();
        index.insert(12, &[2.0, 1.0]).unwrap();
        let hits = index.search(&[1.0, 0.1], 2).unwrap();
        assert_eq!(hits.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![10, 12]);
        assert!(hits[0].1 >= hits[1].1);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = VectorIndex::new();
        assert!(index.search(&[1.0, 2.0], 5).unwrap().is_empty());
    }

    #[test]
    fn ann_path_finds_exact_match() {
        let mut index = VectorIndex::new();
        let dim = 8;
        let point = |i: u32| -> Vec<f32> {
            (0..dim)
                .map(|j| ((i as f32 + 1.0) * (j as f32 + 1.0) * 0.37).sin())
                .collect()
        };
        for i in 0..(EXACT_SCAN_LIMIT as u32 + 100) {
            index.insert(i, &point(i)).unwrap();
        }
        let q = point(777);
        let hits = index.search(&q, 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert!((hits[0].1 - 1.0).abs() < 1e-4, "best hit {:?}", hits[0]);
        assert!(hits.windows(2).all(|w| w[0].1 >= w[1].1));
    }
}
