// Configuration record consumed by the core. Loading it from files/env/CLI
// args is an external concern (out of scope here); this module only defines
// the validated nested-struct shape and the validation step itself.

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Local,
    Cloud,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub backend: String,
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub local: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyConfig {
    pub block_external_calls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub bm25_weight: f32,
    pub vector_weight: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            bm25_weight: 0.3,
            vector_weight: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub languages: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub include_documents: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            exclude_patterns: Vec::new(),
            include_documents: true,
        }
    }
}

/// Top-level configuration record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mode: Mode,
    pub vector_store: VectorStoreConfig,
    pub embedding: EmbeddingConfig,
    pub privacy: PrivacyConfig,
    pub search: SearchConfig,
    pub indexing: IndexingConfig,
}

impl Config {
    /// Validate cross-field invariants. The core never loads config itself;
    /// callers pass a record that must pass this check before being used to
    /// construct an `IndexingService`.
    pub fn validate(&self) -> Result<()> {
        let sum = self.search.bm25_weight + self.search.vector_weight;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(IndexError::ConfigValidation {
                message: format!(
                    "search.bm25_weight + search.vector_weight must sum to 1.0, got {}",
                    sum
                ),
            });
        }

        if self.privacy.block_external_calls && self.mode == Mode::Cloud {
            return Err(IndexError::ConfigValidation {
                message: "cloud mode conflicts with privacy.block_external_calls".to_string(),
            });
        }

        if self.privacy.block_external_calls && !self.embedding.local {
            return Err(IndexError::ConfigValidation {
                message: "embedding.local must be true when privacy.block_external_calls is set"
                    .to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            mode: Mode::Local,
            vector_store: VectorStoreConfig {
                backend: "memory".to_string(),
                config: serde_json::json!({}),
            },
            embedding: EmbeddingConfig {
                provider: "null".to_string(),
                model: "null-hash-384".to_string(),
                api_key: None,
                local: true,
            },
            privacy: PrivacyConfig {
                block_external_calls: false,
            },
            search: SearchConfig::default(),
            indexing: IndexingConfig::default(),
        }
    }

    #[test]
    fn default_weights_validate() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn mismatched_weights_rejected() {
        let mut cfg = base_config();
        cfg.search.bm25_weight = 0.5;
        cfg.search.vector_weight = 0.6;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn blocked_external_calls_requires_local_embedder() {
        let mut cfg = base_config();
        cfg.privacy.block_external_calls = true;
        cfg.embedding.local = false;
        assert!(cfg.validate().is_err());
    }
}
