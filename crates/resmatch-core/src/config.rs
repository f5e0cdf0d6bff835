use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MatchError, Result};

/// Top-level configuration for resmatch.
///
/// Loaded from `~/.resmatch/config.toml` by default. Every section falls back
/// to its defaults when missing from the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub explain: ExplainConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl MatchConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MatchConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the catalog cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.index.dimension == 0 {
            return Err(MatchError::Config(
                "index.dimension must be greater than zero".to_string(),
            ));
        }
        if self.search.max_top_k == 0 {
            return Err(MatchError::Config(
                "search.max_top_k must be greater than zero".to_string(),
            ));
        }
        if self.embedding.max_tokens == 0 {
            return Err(MatchError::Config(
                "embedding.max_tokens must be greater than zero".to_string(),
            ));
        }
        if self.index.vector_snapshot == self.index.metadata_snapshot {
            return Err(MatchError::Config(
                "index.vector_snapshot and index.metadata_snapshot must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute path of the vector snapshot inside `data_dir`.
    pub fn vector_snapshot_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.index.vector_snapshot)
    }

    /// Absolute path of the metadata snapshot inside `data_dir`.
    pub fn metadata_snapshot_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.index.metadata_snapshot)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the vector and metadata snapshots.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// API server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.resmatch/data".to_string(),
            log_level: "info".to_string(),
            port: 8000,
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Embedding dimension, fixed for the life of the index.
    pub dimension: usize,
    /// File name of the binary vector snapshot.
    pub vector_snapshot: String,
    /// File name of the CSV metadata snapshot.
    pub metadata_snapshot: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            vector_snapshot: "resume_index.bin".to_string(),
            metadata_snapshot: "resumes_metadata.csv".to_string(),
        }
    }
}

/// Embedding model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Directory with `model.onnx` and `tokenizer.json`. Without it the
    /// built-in hashing embedder is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<String>,
    /// Tokens kept per input; longer texts are truncated.
    pub max_tokens: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            max_tokens: 256,
        }
    }
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of candidates returned when the request does not say.
    pub default_top_k: usize,
    /// Upper bound on requested candidates.
    pub max_top_k: usize,
    /// Characters of resume text included in each match-text result.
    pub snippet_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 50,
            snippet_chars: 300,
        }
    }
}

/// Candidate explanation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    /// Attach an explanation to every match-text result.
    pub enabled: bool,
    /// Resume text beyond this many characters is ignored when explaining.
    pub max_candidate_chars: usize,
    /// Maximum keywords listed per explanation section.
    pub max_keywords: usize,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_candidate_chars: 1500,
            max_keywords: 8,
        }
    }
}

/// Upload ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Label recorded as `predicted_role` for uploaded resumes.
    pub uploaded_label: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            uploaded_label: "Uploaded".to_string(),
        }
    }
}
