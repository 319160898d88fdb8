use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{EngramError, Result};
use crate::memory::retrieval::ScoringWeights;

/// Main configuration structure for Engram
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngramConfig {
    /// Record store configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Retrieval scoring configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Compression/eviction configuration
    #[serde(default)]
    pub compression: CompressionConfig,
}

impl EngramConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngramError::Config(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        let config: EngramConfig = toml::from_str(&content)
            .map_err(|e| EngramError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, or from the first default location that
    /// exists, or fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default_paths = [
            dirs::home_dir().map(|h| h.join(".engram").join("config.toml")),
            dirs::config_dir().map(|c| c.join("engram").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ];

        for candidate in default_paths.iter().flatten() {
            if candidate.exists() {
                tracing::info!("loading config from {}", candidate.display());
                return Self::load(candidate);
            }
        }

        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        self.retrieval.weights().validate()?;
        if self.storage.dimension == 0 {
            return Err(EngramError::Config(
                "embedding dimension must be nonzero".to_string(),
            ));
        }
        if self.compression.inactivity_days <= 0 {
            return Err(EngramError::Config(
                "inactivity window must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Record store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base directory for the database file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Embedding dimension, fixed at store creation
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("engram.db")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            dimension: default_dimension(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".engram"))
        .unwrap_or_else(|| PathBuf::from(".engram"))
}

fn default_dimension() -> usize {
    384
}

/// Retrieval scoring configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Weight of vector similarity in the composite score
    #[serde(default = "default_similarity_weight")]
    pub similarity_weight: f32,
    /// Weight of recency in the composite score
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f32,
    /// Weight of stored importance in the composite score
    #[serde(default = "default_importance_weight")]
    pub importance_weight: f32,
}

impl RetrievalConfig {
    pub fn weights(&self) -> ScoringWeights {
        ScoringWeights {
            similarity: self.similarity_weight,
            recency: self.recency_weight,
            importance: self.importance_weight,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_weight: default_similarity_weight(),
            recency_weight: default_recency_weight(),
            importance_weight: default_importance_weight(),
        }
    }
}

fn default_similarity_weight() -> f32 {
    0.6
}

fn default_recency_weight() -> f32 {
    0.2
}

fn default_importance_weight() -> f32 {
    0.2
}

/// Compression/eviction configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CompressionConfig {
    /// Days without access after which a record becomes an eviction
    /// candidate
    #[serde(default = "default_inactivity_days")]
    pub inactivity_days: i64,
    /// Importance threshold used when none is supplied
    #[serde(default = "default_threshold")]
    pub default_threshold: f32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            inactivity_days: default_inactivity_days(),
            default_threshold: default_threshold(),
        }
    }
}

fn default_inactivity_days() -> i64 {
    30
}

fn default_threshold() -> f32 {
    0.8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngramConfig::default();
        assert_eq!(config.storage.dimension, 384);
        assert_eq!(config.retrieval.similarity_weight, 0.6);
        assert_eq!(config.retrieval.recency_weight, 0.2);
        assert_eq!(config.retrieval.importance_weight, 0.2);
        assert_eq!(config.compression.inactivity_days, 30);
        assert_eq!(config.compression.default_threshold, 0.8);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: EngramConfig = toml::from_str(
            r#"
            [storage]
            dimension = 8

            [retrieval]
            similarity_weight = 0.5
            recency_weight = 0.3
            importance_weight = 0.2
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.dimension, 8);
        assert_eq!(config.retrieval.similarity_weight, 0.5);
        assert_eq!(config.compression.inactivity_days, 30);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_unbalanced_weights() {
        let config: EngramConfig = toml::from_str(
            r#"
            [retrieval]
            similarity_weight = 0.9
            recency_weight = 0.9
            importance_weight = 0.9
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_dimension() {
        let config: EngramConfig = toml::from_str("[storage]\ndimension = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_db_path_is_under_data_dir() {
        let config = StorageConfig {
            data_dir: PathBuf::from("/tmp/engram-test"),
            dimension: 384,
        };
        assert_eq!(config.db_path(), PathBuf::from("/tmp/engram-test/engram.db"));
    }
}
