use std::fmt;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::embed::{Embedding, Encoder};
use crate::{Error, Result};

/// Sentence embedding models that can back a [`FastEmbedEncoder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncoderModel {
    /// sentence-transformers/all-MiniLM-L6-v2, 384 dimensions
    #[default]
    #[serde(rename = "all-minilm-l6-v2")]
    AllMiniLmL6V2,
    /// BAAI/bge-small-en-v1.5, 384 dimensions
    #[serde(rename = "bge-small-en-v1.5")]
    BgeSmallEnV15,
    /// BAAI/bge-base-en-v1.5, 768 dimensions
    #[serde(rename = "bge-base-en-v1.5")]
    BgeBaseEnV15,
}

impl EncoderModel {
    /// Hugging Face identifier of the model
    pub fn name(self) -> &'static str {
        match self {
            Self::AllMiniLmL6V2 => "sentence-transformers/all-MiniLM-L6-v2",
            Self::BgeSmallEnV15 => "BAAI/bge-small-en-v1.5",
            Self::BgeBaseEnV15 => "BAAI/bge-base-en-v1.5",
        }
    }

    pub fn dimension(self) -> usize {
        match self {
            Self::AllMiniLmL6V2 | Self::BgeSmallEnV15 => 384,
            Self::BgeBaseEnV15 => 768,
        }
    }

    fn to_fastembed(self) -> EmbeddingModel {
        match self {
            Self::AllMiniLmL6V2 => EmbeddingModel::AllMiniLML6V2,
            Self::BgeSmallEnV15 => EmbeddingModel::BGESmallENV15,
            Self::BgeBaseEnV15 => EmbeddingModel::BGEBaseENV15,
        }
    }
}

impl fmt::Display for EncoderModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Local sentence encoder using fastembed's ONNX inference.
///
/// Questions and queries go through the same path with no instruction
/// prefix: queries are compared against stored questions, not passages.
pub struct FastEmbedEncoder {
    model: Mutex<TextEmbedding>,
    kind: EncoderModel,
}

impl FastEmbedEncoder {
    /// Create a new encoder for `kind`.
    ///
    /// Downloads the model on first use.
    pub fn new(kind: EncoderModel) -> Result<Self> {
        info!(model = kind.name(), "loading embedding model");
        let opts = InitOptions::new(kind.to_fastembed()).with_show_download_progress(true);

        TextEmbedding::try_new(opts)
            .map(|model| Self {
                model: Mutex::new(model),
                kind,
            })
            .map_err(|e| Error::encoding(kind.name(), e))
    }
}

impl Encoder for FastEmbedEncoder {
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let first = texts.first().copied().unwrap_or_default();
        let mut model = self
            .model
            .lock()
            .map_err(|_| Error::encoding(first, "embedding model lock poisoned"))?;

        let embeddings = model
            .embed(texts, None)
            .map_err(|e| Error::encoding(first, e))?;

        if embeddings.len() != texts.len() {
            return Err(Error::encoding(
                first,
                format!(
                    "model returned {} embeddings for {} texts",
                    embeddings.len(),
                    texts.len()
                ),
            ));
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.kind.dimension()
    }

    fn model_name(&self) -> &str {
        self.kind.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_names_parse_from_config_strings() {
        let kind: EncoderModel = serde_json::from_str("\"bge-base-en-v1.5\"").unwrap();
        assert_eq!(kind, EncoderModel::BgeBaseEnV15);
        assert_eq!(kind.dimension(), 768);
        assert_eq!(EncoderModel::default().dimension(), 384);
    }

    #[test]
    #[ignore] // Requires model download, run with: cargo test -- --ignored
    fn test_similar_questions_score_closer() {
        let encoder = FastEmbedEncoder::new(EncoderModel::AllMiniLmL6V2).unwrap();

        let vectors = encoder
            .encode_batch(&["Where is GIKI?", "What is the location of GIKI?", "Who won the match?"])
            .unwrap();
        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|v| v.len() == encoder.dimension()));

        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&vectors[0], &vectors[1]) > dot(&vectors[0], &vectors[2]));
    }
}
