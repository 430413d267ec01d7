//! Embedding storage
//!
//! An [`EmbeddingStore`] holds the question vectors and the index-aligned
//! answer pool for one corpus version. It is built wholesale from a corpus,
//! persisted atomically, and read-only afterwards.
//!
//! # Lifecycle
//!
//! ```text
//! build() -> Built -> persist() -> Persisted
//!                                      |
//!                     load() -> Loaded <+
//! ```
//!
//! # On-disk layout
//!
//! ```text
//! <base>/CURRENT            name of the live generation
//! <base>/LOCK               present while a writer is persisting
//! <base>/gen-<id>/meta.json     {schema_version, dimension, count, created_at, model}
//! <base>/gen-<id>/answers.json  answer pool, index-aligned with the vectors
//! <base>/gen-<id>/vectors.f32   count * dimension little-endian f32, row-major
//! ```
//!
//! A new generation is fully written and synced before `CURRENT` is
//! replaced by rename, so a crash mid-persist leaves the previous generation
//! authoritative. The replaced generation is kept until the next persist so
//! concurrent readers never lose the files they resolved. One writer at a
//! time holds `LOCK`; others fail with [`Error::RebuildInProgress`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embed::Encoder;
use crate::{Error, Result};

/// Current persisted schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Where a store came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Built in memory, not yet written
    Built,
    /// Built and written to disk
    Persisted,
    /// Read back from disk
    Loaded,
}

/// Metadata record persisted alongside the vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreMetadata {
    pub schema_version: u32,
    pub dimension: usize,
    pub count: usize,
    pub created_at: DateTime<Utc>,
    /// Encoder model the vectors were produced with
    pub model: String,
}

/// Question vectors and answer pool for one corpus version.
///
/// Invariant: `vectors.len() == count * dimension`, `answers.len() == count`,
/// `dimension > 0`, and every component is finite.
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    meta: StoreMetadata,
    vectors: Vec<f32>,
    answers: Vec<String>,
    state: StoreState,
}

impl EmbeddingStore {
    /// Encode `questions` and pair them with `answers`.
    ///
    /// Questions are sent to the encoder `batch_size` at a time. The first
    /// failing batch aborts the build; nothing partial is returned.
    pub fn build(
        encoder: &dyn Encoder,
        questions: &[&str],
        answers: Vec<String>,
        batch_size: usize,
    ) -> Result<Self> {
        if questions.len() != answers.len() {
            return Err(Error::InvalidInput(format!(
                "{} questions but {} answers",
                questions.len(),
                answers.len()
            )));
        }
        if batch_size == 0 {
            return Err(Error::InvalidInput("batch size must be positive".to_string()));
        }
        let dimension = encoder.dimension();
        if dimension == 0 {
            return Err(Error::InvalidInput(format!(
                "encoder {} reports dimension 0",
                encoder.model_name()
            )));
        }

        let mut vectors = Vec::with_capacity(questions.len() * dimension);
        for (n, batch) in questions.chunks(batch_size).enumerate() {
            debug!(batch = n, size = batch.len(), "encoding questions");
            let encoded = encoder.encode_batch(batch)?;
            if encoded.len() != batch.len() {
                return Err(Error::encoding(
                    batch[0],
                    format!("encoder returned {} vectors for {} texts", encoded.len(), batch.len()),
                ));
            }
            for (text, vector) in batch.iter().zip(encoded) {
                if vector.len() != dimension {
                    return Err(Error::encoding(
                        *text,
                        format!("expected {dimension} dimensions, got {}", vector.len()),
                    ));
                }
                if vector.iter().any(|x| !x.is_finite()) {
                    return Err(Error::encoding(*text, "vector has non-finite components"));
                }
                vectors.extend_from_slice(&vector);
            }
        }

        let meta = StoreMetadata {
            schema_version: SCHEMA_VERSION,
            dimension,
            count: answers.len(),
            created_at: Utc::now(),
            model: encoder.model_name().to_string(),
        };
        info!(count = meta.count, dimension, model = %meta.model, "built embedding store");

        Ok(Self {
            meta,
            vectors,
            answers,
            state: StoreState::Built,
        })
    }

    /// Write this store as a new generation under `base` and make it current.
    ///
    /// Returns the generation directory. Fails with
    /// [`Error::RebuildInProgress`] while another writer holds the directory.
    pub fn persist(&mut self, base: impl AsRef<Path>) -> Result<PathBuf> {
        let base = base.as_ref();
        let generation = disk::write_generation(base, &self.meta, &self.vectors, &self.answers)?;
        self.state = StoreState::Persisted;
        info!(path = %generation.display(), count = self.meta.count, "persisted embedding store");
        Ok(generation)
    }

    /// Load the current generation under `base`.
    ///
    /// Fails with [`Error::StoreCorrupt`] when the artifacts disagree with
    /// each other or with the metadata.
    pub fn load(base: impl AsRef<Path>) -> Result<Self> {
        let base = base.as_ref();
        let (meta, vectors, answers) = disk::read_generation(base)?;
        info!(
            path = %base.display(),
            count = meta.count,
            dimension = meta.dimension,
            created_at = %meta.created_at,
            "loaded embedding store"
        );
        Ok(Self {
            meta,
            vectors,
            answers,
            state: StoreState::Loaded,
        })
    }

    /// Read only the metadata of the current generation under `base`.
    pub fn read_metadata(base: impl AsRef<Path>) -> Result<StoreMetadata> {
        disk::read_metadata(base.as_ref())
    }

    pub fn metadata(&self) -> &StoreMetadata {
        &self.meta
    }

    pub fn dimension(&self) -> usize {
        self.meta.dimension
    }

    /// Number of stored question/answer entries
    pub fn len(&self) -> usize {
        self.meta.count
    }

    pub fn is_empty(&self) -> bool {
        self.meta.count == 0
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.meta.created_at
    }

    pub fn model(&self) -> &str {
        &self.meta.model
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    /// Question vector at `index`
    pub fn vector(&self, index: usize) -> Option<&[f32]> {
        let dim = self.meta.dimension;
        let start = index.checked_mul(dim)?;
        self.vectors.get(start..start.checked_add(dim)?)
    }

    /// All question vectors in index order
    pub fn vectors(&self) -> std::slice::ChunksExact<'_, f32> {
        self.vectors.chunks_exact(self.meta.dimension)
    }

    /// Answer text at `index`
    pub fn answer(&self, index: usize) -> Option<&str> {
        self.answers.get(index).map(String::as_str)
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }
}

mod disk;

#[cfg(test)]
pub(crate) mod testing {
    use super::EmbeddingStore;
    use crate::embed::testing::StubEncoder;

    /// Build a store whose question `i` has vector `rows[i]` and answer "answer i".
    pub fn store_of(dimension: usize, rows: &[Vec<f32>]) -> EmbeddingStore {
        let questions: Vec<String> = (0..rows.len()).map(|i| format!("question {i}")).collect();
        let encoder = rows
            .iter()
            .zip(&questions)
            .fold(StubEncoder::new(dimension), |enc, (row, q)| enc.with(q, row.clone()));

        let refs: Vec<&str> = questions.iter().map(String::as_str).collect();
        let answers = (0..rows.len()).map(|i| format!("answer {i}")).collect();
        EmbeddingStore::build(&encoder, &refs, answers, 16).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::testing::StubEncoder;

    fn encoder() -> StubEncoder {
        StubEncoder::new(3)
            .with("What is GIKI?", vec![1.0, 0.0, 0.0])
            .with("Where is GIKI?", vec![0.0, 1.0, 0.0])
            .with("When was GIKI founded?", vec![0.1, -3.4e-20, f32::MIN_POSITIVE])
    }

    fn questions() -> Vec<&'static str> {
        vec!["What is GIKI?", "Where is GIKI?", "When was GIKI founded?"]
    }

    fn answers() -> Vec<String> {
        vec![
            "GIKI is an engineering institute.".to_string(),
            "Topi, Khyber Pakhtunkhwa.".to_string(),
            "1993.".to_string(),
        ]
    }

    #[test]
    fn test_build() {
        let store = EmbeddingStore::build(&encoder(), &questions(), answers(), 32).unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.dimension(), 3);
        assert_eq!(store.state(), StoreState::Built);
        assert_eq!(store.model(), "stub");
        assert_eq!(store.vector(1), Some(&[0.0, 1.0, 0.0][..]));
        assert_eq!(store.vector(3), None);
        assert_eq!(store.answer(0), Some("GIKI is an engineering institute."));
        assert_eq!(store.vectors().count(), 3);
    }

    #[test]
    fn test_build_batches() {
        let encoder = encoder();
        EmbeddingStore::build(&encoder, &questions(), answers(), 2).unwrap();
        assert_eq!(encoder.calls(), 2);
    }

    #[test]
    fn test_build_empty_corpus() {
        let encoder = encoder();
        let store = EmbeddingStore::build(&encoder, &[], Vec::new(), 8).unwrap();

        assert!(store.is_empty());
        assert_eq!(store.dimension(), 3);
        assert_eq!(store.vectors().count(), 0);
        assert_eq!(encoder.calls(), 0);
    }

    #[test]
    fn test_build_fails_fast_on_encoding_error() {
        let encoder = encoder();
        let questions = vec!["What is GIKI?", "unknown question", "Where is GIKI?"];
        let answers = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let err = EmbeddingStore::build(&encoder, &questions, answers, 1).unwrap_err();
        assert!(matches!(err, Error::Encoding { ref text, .. } if text == "unknown question"));
        // the third batch is never attempted
        assert_eq!(encoder.calls(), 2);
    }

    #[test]
    fn test_build_rejects_wrong_dimension() {
        let encoder = StubEncoder::new(3).with("short", vec![1.0, 0.0]);
        let err = EmbeddingStore::build(&encoder, &["short"], vec!["a".to_string()], 4).unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }

    #[test]
    fn test_build_rejects_non_finite() {
        let encoder = StubEncoder::new(2).with("nan", vec![f32::NAN, 0.0]);
        let err = EmbeddingStore::build(&encoder, &["nan"], vec!["a".to_string()], 4).unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }

    #[test]
    fn test_build_rejects_misaligned_input() {
        let err = EmbeddingStore::build(&encoder(), &questions(), vec!["one".to_string()], 4).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = EmbeddingStore::build(&encoder(), &questions(), answers(), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_persist_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut built = EmbeddingStore::build(&encoder(), &questions(), answers(), 32).unwrap();
        built.persist(dir.path()).unwrap();
        assert_eq!(built.state(), StoreState::Persisted);

        let loaded = EmbeddingStore::load(dir.path()).unwrap();
        assert_eq!(loaded.state(), StoreState::Loaded);
        assert_eq!(loaded.metadata(), built.metadata());
        assert_eq!(loaded.answers(), built.answers());

        // bit-identical, not just approximately equal
        let bits = |s: &EmbeddingStore| -> Vec<u32> {
            s.vectors().flatten().map(|x| x.to_bits()).collect()
        };
        assert_eq!(bits(&loaded), bits(&built));
    }

    #[test]
    fn test_round_trip_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut built = EmbeddingStore::build(&encoder(), &[], Vec::new(), 32).unwrap();
        built.persist(dir.path()).unwrap();

        let loaded = EmbeddingStore::load(dir.path()).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.dimension(), 3);
    }

    #[test]
    fn test_read_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mut built = EmbeddingStore::build(&encoder(), &questions(), answers(), 32).unwrap();
        built.persist(dir.path()).unwrap();

        let meta = EmbeddingStore::read_metadata(dir.path()).unwrap();
        assert_eq!(meta.count, 3);
        assert_eq!(meta.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_load_without_store() {
        let dir = tempfile::tempdir().unwrap();
        let err = EmbeddingStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }
}
