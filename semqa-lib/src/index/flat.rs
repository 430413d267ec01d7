use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::index::{cosine_similarity, rank_order, Hit, VectorIndex};
use crate::store::EmbeddingStore;
use crate::{Error, Result};

/// Exact linear-scan index over an [`EmbeddingStore`].
///
/// Scores every stored vector (O(n·d)) and keeps the best `top_k` in a
/// bounded heap. Borrows the store, so a search always sees one consistent
/// store version.
pub struct FlatIndex<'a> {
    store: &'a EmbeddingStore,
}

impl<'a> FlatIndex<'a> {
    #[must_use]
    pub fn new(store: &'a EmbeddingStore) -> Self {
        Self { store }
    }
}

/// Heap entry ordered so that `Greater` means "ranks higher"
struct Ranked(Hit);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        rank_order(&other.0, &self.0)
    }
}

impl VectorIndex for FlatIndex<'_> {
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Hit>> {
        let dimension = self.store.dimension();
        if query.len() != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }
        if top_k == 0 {
            return Err(Error::InvalidInput("top_k must be positive".to_string()));
        }

        let k = top_k.min(self.store.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        // min-heap of the best k so far; the root is the weakest kept hit
        let mut heap = BinaryHeap::with_capacity(k + 1);
        for (index, vector) in self.store.vectors().enumerate() {
            let hit = Hit {
                index,
                score: cosine_similarity(query, vector),
            };
            heap.push(Reverse(Ranked(hit)));
            if heap.len() > k {
                heap.pop();
            }
        }

        // ascending Reverse order is descending rank
        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(Ranked(hit))| hit)
            .collect())
    }

    fn dimension(&self) -> usize {
        self.store.dimension()
    }

    fn len(&self) -> usize {
        self.store.len()
    }
}
