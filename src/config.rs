//! Application configuration
//!
//! Defaults in code, optionally overridden by an `arbor.toml` at the root
//! and then by environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Directory (under the root) holding the index database.
pub const DATA_DIR: &str = ".arbor";
pub const DB_FILE: &str = "index.db";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArborConfig {
    pub db_path: Option<PathBuf>,
    pub exclude: Vec<String>,
    pub workers: Option<usize>,
    pub batch_size: Option<usize>,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "openai" or "local"; defaults to local when no API key is available.
    pub provider: Option<String>,
    pub model: Option<String>,
    pub dimension: Option<usize>,
    pub api_base: Option<String>,
    /// Env var holding the API key.
    pub api_key_env: Option<String>,
}

impl ArborConfig {
    /// Load `arbor.toml` from the root if present, then apply environment
    /// overrides. A missing file is not an error.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        // .env files are a convenience, never a requirement.
        let _ = dotenvy::dotenv();

        let path = root.join("arbor.toml");
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("read {}", path.display()))?;
            toml::from_str(&raw).with_context(|| format!("parse {}", path.display()))?
        } else {
            ArborConfig::default()
        };

        if let Ok(db_path) = std::env::var("ARBOR_DB_PATH") {
            config.db_path = Some(PathBuf::from(db_path));
        }
        if let Ok(base) = std::env::var("ARBOR_API_BASE") {
            config.embedding.api_base = Some(base);
        }
        Ok(config)
    }

    pub fn db_path(&self, root: &Path) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| root.join(DATA_DIR).join(DB_FILE))
    }

    /// The configured API key, if any.
    pub fn api_key(&self) -> Option<String> {
        let var = self
            .embedding
            .api_key_env
            .clone()
            .unwrap_or_else(|| "ARBOR_API_KEY".to_string());
        std::env::var(&var)
            .ok()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.is_empty())
    }
}
