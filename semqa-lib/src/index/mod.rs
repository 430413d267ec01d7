//! Similarity search over stored question vectors
//!
//! # Ranking
//!
//! Entries are ranked by cosine similarity, highest first. Equal scores are
//! broken by ascending store index, so exact search is fully deterministic.
//! Any future approximate index implements the same [`VectorIndex`] trait;
//! callers may rely on the ordering rule but not on which near-ties an
//! approximate backend happens to find.
//!
//! # Usage
//!
//! ```ignore
//! use semqa_lib::index::{FlatIndex, VectorIndex};
//!
//! let index = FlatIndex::new(&store);
//! let hits = index.search(&query_embedding, 3)?;
//! ```

use std::cmp::Ordering;

use crate::Result;

/// A ranked match: position in the store plus similarity score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Index into the store's vectors and answer pool
    pub index: usize,
    /// Cosine similarity, in [-1, 1]
    pub score: f32,
}

/// Ranking order: `Less` means `a` ranks before `b`.
pub fn rank_order(a: &Hit, b: &Hit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.index.cmp(&b.index))
}

/// Trait for similarity search backends
pub trait VectorIndex: Send + Sync {
    /// Search for the stored vectors most similar to `query`
    ///
    /// # Returns
    /// At most `top_k` hits in ranking order. Fails with
    /// `DimensionMismatch` if `query` does not have the index dimension and
    /// with `InvalidInput` if `top_k` is zero.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Hit>>;

    /// Vector dimension this index accepts
    fn dimension(&self) -> usize;

    /// Number of indexed vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compute cosine similarity between two vectors.
///
/// Accumulates in f64. Returns a value in [-1, 1]; returns 0 when either
/// vector has zero norm. Identical non-zero vectors score exactly 1.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");

    let norm_a = dot(a, a);
    let norm_b = dot(b, b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let sim = dot(a, b) / (norm_a * norm_b).sqrt();
    if !sim.is_finite() {
        return 0.0;
    }

    // clamp rounding overshoot, and fold -0.0 into 0.0 for stable ordering
    let sim = sim.clamp(-1.0, 1.0) as f32;
    if sim == 0.0 {
        0.0
    } else {
        sim
    }
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

mod flat;

pub use flat::*;
