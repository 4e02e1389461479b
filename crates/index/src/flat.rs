use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::matrix::EmbeddingMatrix;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Exact nearest-neighbour search by squared Euclidean distance over every
/// stored vector. Append-only; a changed corpus means a rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatL2Index {
    vectors: EmbeddingMatrix,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Result<Self> {
        Ok(Self {
            vectors: EmbeddingMatrix::new(dimension)?,
        })
    }

    pub fn from_matrix(vectors: EmbeddingMatrix) -> Self {
        Self { vectors }
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        self.vectors.push(vector)
    }

    pub fn dimension(&self) -> usize {
        self.vectors.dimension()
    }

    pub fn len(&self) -> usize {
        self.vectors.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vectors(&self) -> &EmbeddingMatrix {
        &self.vectors
    }

    /// The `k` closest rows in ascending distance; equal distances keep
    /// insertion order. Asking for more rows than stored returns all of them.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.len(),
            });
        }
        let mut neighbors: Vec<Neighbor> = self
            .vectors
            .iter_rows()
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: squared_l2(query, row),
            })
            .collect();
        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        neighbors.truncate(k);
        Ok(neighbors)
    }
}

#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    let mut sum0 = 0.0f32;
    let mut sum1 = 0.0f32;
    let chunks = a.chunks_exact(2);
    let remainder = chunks.remainder();
    for (x, y) in chunks.zip(b.chunks_exact(2)) {
        let d0 = x[0] - y[0];
        let d1 = x[1] - y[1];
        sum0 += d0 * d0;
        sum1 += d1 * d1;
    }
    if let (Some(x), Some(y)) = (remainder.first(), b.get(a.len() - remainder.len())) {
        let d = x - y;
        sum0 += d * d;
    }
    sum0 + sum1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> FlatL2Index {
        let mut index = FlatL2Index::new(2).unwrap();
        for vector in [[0.0, 0.0], [3.0, 4.0], [1.0, 0.0], [0.0, 1.0], [10.0, 10.0]] {
            index.add(&vector).unwrap();
        }
        index
    }

    #[test]
    fn squared_distance_handles_odd_lengths() {
        assert_eq!(squared_l2(&[1.0, 2.0, 3.0], &[1.0, 0.0, 0.0]), 13.0);
        assert_eq!(squared_l2(&[3.0, 4.0], &[0.0, 0.0]), 25.0);
    }

    #[test]
    fn search_orders_by_distance_then_position() {
        let index = corpus();
        let hits = index.search(&[0.0, 0.0], 4).unwrap();
        let positions: Vec<usize> = hits.iter().map(|n| n.position).collect();
        // rows 2 and 3 are equidistant from the origin
        assert_eq!(positions, vec![0, 2, 3, 1]);
        assert_eq!(hits[3].distance, 25.0);
    }

    #[test]
    fn oversized_k_returns_whole_corpus() {
        let index = corpus();
        let hits = index.search(&[9.0, 9.0], 50).unwrap();
        assert_eq!(hits.len(), index.len());
        assert_eq!(hits[0].position, 4);
    }

    #[test]
    fn query_dimension_must_match() {
        let index = corpus();
        assert!(matches!(
            index.search(&[1.0, 2.0, 3.0], 1),
            Err(IndexError::DimensionMismatch { .. })
        ));
    }
}
