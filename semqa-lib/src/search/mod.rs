//! High-level retrieval interface
//!
//! Combines the encoder, the current embedding store and similarity search
//! into a single question answering API.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use semqa_lib::search::Retriever;
//!
//! let retriever = Retriever::new(Arc::new(encoder));
//! retriever.load("semqa-store")?;
//! for answer in retriever.answer("Where is GIKI?", 3)? {
//!     println!("{answer}");
//! }
//!
//! // Later: rebuild from fresh facts without disturbing readers
//! retriever.rebuild(&facts, "semqa-store", 32)?;
//! ```
//!
//! # Concurrency
//!
//! The current store sits behind an `Arc` that queries clone on entry, so a
//! query runs to completion against the version it started with even if a
//! rebuild swaps in a new one meanwhile. Only one store swap (rebuild, load
//! or install) runs at a time; overlapping calls fail with
//! [`Error::RebuildInProgress`].

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::corpus::{build_corpus, split_pairs, FactDocument};
use crate::embed::Encoder;
use crate::index::{FlatIndex, VectorIndex};
use crate::store::EmbeddingStore;
use crate::{Error, Result};

/// One candidate answer with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct RankedAnswer {
    /// Answer text, verbatim from the answer pool
    pub answer: String,
    /// Cosine similarity between the query and the matched question
    pub score: f32,
    /// Position in the answer pool
    pub index: usize,
}

impl fmt::Display for RankedAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.4}] {}", self.score, self.answer)
    }
}

/// Question answering over the current embedding store.
pub struct Retriever {
    encoder: Arc<dyn Encoder>,
    current: RwLock<Option<Arc<EmbeddingStore>>>,
    rebuild_guard: Mutex<()>,
}

impl Retriever {
    /// Create a retriever with no store loaded.
    #[must_use]
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        Self {
            encoder,
            current: RwLock::new(None),
            rebuild_guard: Mutex::new(()),
        }
    }

    /// Rank stored answers against `query`.
    ///
    /// Fails with [`Error::StoreNotLoaded`] if no store was ever installed;
    /// an empty store yields an empty list instead.
    pub fn answer(&self, query: &str, top_k: usize) -> Result<Vec<RankedAnswer>> {
        let store = self.current().ok_or(Error::StoreNotLoaded)?;
        let started = Instant::now();

        let embedding = self.encoder.encode(query)?;
        let hits = FlatIndex::new(&store).search(&embedding, top_k)?;

        // hits index into the same store, which has one answer per vector
        let pool = store.answers();
        let answers: Vec<RankedAnswer> = hits
            .into_iter()
            .map(|hit| RankedAnswer {
                answer: pool[hit.index].clone(),
                score: hit.score,
                index: hit.index,
            })
            .collect();

        debug!(
            top_k,
            results = answers.len(),
            best = answers.first().map(|a| a.score),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answered query"
        );
        Ok(answers)
    }

    /// The store queries currently run against, if any.
    pub fn current(&self) -> Option<Arc<EmbeddingStore>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    /// Make `store` the current store.
    ///
    /// The store must have been produced with an encoder of the same
    /// dimension as this retriever's. Fails with
    /// [`Error::RebuildInProgress`] while a rebuild is running.
    pub fn install(&self, store: EmbeddingStore) -> Result<Arc<EmbeddingStore>> {
        let _guard = self.swap_guard()?;
        self.swap_in(store)
    }

    fn swap_in(&self, store: EmbeddingStore) -> Result<Arc<EmbeddingStore>> {
        let expected = self.encoder.dimension();
        if store.dimension() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: store.dimension(),
            });
        }
        if store.model() != self.encoder.model_name() {
            warn!(
                store_model = store.model(),
                encoder_model = self.encoder.model_name(),
                "store was built with a different encoder model"
            );
        }

        let store = Arc::new(store);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&store));
        info!(
            count = store.len(),
            state = ?store.state(),
            created_at = %store.created_at(),
            "installed embedding store"
        );
        Ok(store)
    }

    /// Load the persisted store under `base` and make it current.
    ///
    /// Rejected with [`Error::RebuildInProgress`] while a rebuild is running,
    /// so an older generation never replaces the one the rebuild installs.
    pub fn load(&self, base: impl AsRef<Path>) -> Result<Arc<EmbeddingStore>> {
        let _guard = self.swap_guard()?;
        let store = EmbeddingStore::load(base)?;
        self.swap_in(store)
    }

    /// Regenerate the store from `facts`, persist it under `base`, then make
    /// it current.
    ///
    /// On any failure the current store and the previously persisted
    /// generation stay as they were.
    pub fn rebuild(
        &self,
        facts: &FactDocument,
        base: impl AsRef<Path>,
        batch_size: usize,
    ) -> Result<Arc<EmbeddingStore>> {
        let _guard = self.swap_guard()?;
        let started = Instant::now();

        let pairs = build_corpus(facts);
        let (questions, answers) = split_pairs(&pairs);
        info!(pairs = pairs.len(), "rebuilding embedding store");

        let mut store = EmbeddingStore::build(self.encoder.as_ref(), &questions, answers, batch_size)?;
        store.persist(base)?;
        let store = self.swap_in(store)?;

        info!(
            count = store.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rebuild complete"
        );
        Ok(store)
    }

    /// Exclusive right to replace the current store.
    fn swap_guard(&self) -> Result<MutexGuard<'_, ()>> {
        match self.rebuild_guard.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => {
                warn!("rejected store swap: a rebuild is running");
                Err(Error::RebuildInProgress)
            }
            // a panicked rebuild never installed anything
            Err(TryLockError::Poisoned(e)) => Ok(e.into_inner()),
        }
    }
}
