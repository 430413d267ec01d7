//! semqa - semantic question answering over a fixed answer pool
//!
//! # Architecture
//!
//! ```text
//! Facts -> Corpus -> Encoder -> EmbeddingStore --persist--> disk
//!                                      |                      |
//! Query -> Encoder -> Index <----------+<-------load----------+
//!                       |
//!                 RankedAnswers
//! ```
//!
//! Answers are always returned verbatim from the pool; nothing is generated.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use semqa_lib::{
//!     corpus::FactDocument,
//!     embed::{EncoderModel, FastEmbedEncoder},
//!     search::Retriever,
//! };
//!
//! let encoder = Arc::new(FastEmbedEncoder::new(EncoderModel::AllMiniLmL6V2)?);
//! let retriever = Retriever::new(encoder);
//!
//! // Build, persist and install a store from structured facts
//! let facts = FactDocument::from_path("facts.json")?;
//! retriever.rebuild(&facts, "semqa-store", 32)?;
//!
//! // Query
//! let answers = retriever.answer("Where is GIKI?", 3)?;
//! ```

pub mod config;
pub mod corpus;
pub mod embed;
pub mod error;
pub mod index;
pub mod search;
pub mod store;

pub use error::{Error, Result};
