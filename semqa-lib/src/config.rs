//! Runtime configuration
//!
//! Read from a TOML file; every key is optional and falls back to the
//! defaults below.
//!
//! ```toml
//! store_dir = "semqa-store"
//! model = "all-minilm-l6-v2"
//! batch_size = 32
//! top_k = 3
//! min_score = 0.35
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embed::EncoderModel;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding persisted store generations
    pub store_dir: PathBuf,
    /// Embedding model used to encode questions and queries
    pub model: EncoderModel,
    /// Questions per encoder call while building
    pub batch_size: usize,
    /// Answers returned per query
    pub top_k: usize,
    /// Scores below this are reported as "no confident answer"
    pub min_score: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("semqa-store"),
            model: EncoderModel::default(),
            batch_size: 32,
            top_k: 3,
            min_score: 0.35,
        }
    }
}

impl Config {
    /// Parse a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    /// Parse `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be positive".to_string()));
        }
        if self.top_k == 0 {
            return Err(Error::Config("top_k must be positive".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.min_score) {
            return Err(Error::Config(format!(
                "min_score {} is outside [-1, 1]",
                self.min_score
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_missing_keys() {
        let config: Config = toml::from_str("top_k = 5").unwrap();
        assert_eq!(config.top_k, 5);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.model, EncoderModel::AllMiniLmL6V2);
        assert_eq!(config.store_dir, PathBuf::from("semqa-store"));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("semqa.toml");
        std::fs::write(
            &path,
            "store_dir = \"/var/lib/semqa\"\nmodel = \"bge-small-en-v1.5\"\nmin_score = 0.5\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.store_dir, PathBuf::from("/var/lib/semqa"));
        assert_eq!(config.model, EncoderModel::BgeSmallEnV15);
        assert_eq!(config.min_score, 0.5);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("semqa.toml");

        for body in ["batch_size = 0", "top_k = 0", "min_score = 1.5", "unknown = 1", "model = \"gpt\""] {
            std::fs::write(&path, body).unwrap();
            assert!(matches!(Config::load(&path), Err(Error::Config(_))), "{body}");
        }
    }
}
