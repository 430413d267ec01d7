//! Text embedding
//!
//! The engine only needs a deterministic text -> vector mapping with a fixed
//! dimension. [`FastEmbedEncoder`] provides one with local ONNX models via
//! the fastembed crate; anything else implementing [`Encoder`] can be
//! injected instead.
//!
//! # Usage
//!
//! ```ignore
//! use semqa_lib::embed::{Encoder, EncoderModel, FastEmbedEncoder};
//!
//! let encoder = FastEmbedEncoder::new(EncoderModel::AllMiniLmL6V2)?;
//!
//! // Encode stored questions (batched)
//! let vectors = encoder.encode_batch(&["What is GIKI?", "Where is GIKI?"])?;
//!
//! // Encode a query
//! let query = encoder.encode("tell me about giki")?;
//! ```

use crate::{Error, Result};

/// A vector embedding - fixed size array of floats
pub type Embedding = Vec<f32>;

/// Trait for text encoders
///
/// Implementations are shared read-only between the store builder and any
/// number of concurrent queries, so every method takes `&self`.
pub trait Encoder: Send + Sync {
    /// Encode multiple texts
    ///
    /// Returns one vector per input, in input order. A failure anywhere in
    /// the batch fails the whole call.
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Encode a single text
    fn encode(&self, text: &str) -> Result<Embedding> {
        self.encode_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::encoding(text, "encoder returned no embeddings"))
    }

    /// Returns the embedding dimension
    fn dimension(&self) -> usize;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

mod onnx;
pub use onnx::*;
