use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use finlens_core::{FinError, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG: &str = "finlens.toml";
pub const DEFAULT_STORAGE_DIR: &str = "data";
pub const DEFAULT_DB_FILE: &str = "financial_data.sqlite";
pub const DEFAULT_INDEX_BASE: &str = "vector_index";
pub const DEFAULT_HASH_DIMENSIONS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Hash,
    OpenAi,
}

impl EmbeddingProvider {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "hash" => Some(Self::Hash),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default)]
    pub provider: EmbeddingProvider,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hash,
            model: None,
            dimensions: DEFAULT_HASH_DIMENSIONS,
        }
    }
}

fn default_dimensions() -> usize {
    DEFAULT_HASH_DIMENSIONS
}

#[derive(Debug, Clone, Deserialize)]
pub struct FinlensConfig {
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub index_path: Option<PathBuf>,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STORAGE_DIR)
}

impl Default for FinlensConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            db_path: None,
            index_path: None,
            embedding: EmbeddingSettings::default(),
        }
    }
}

impl FinlensConfig {
    /// Reads `path` if it exists (defaults otherwise), then applies
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)?;
            toml::from_str(&contents)
                .map_err(|e| FinError::Other(format!("invalid config {}: {e}", path.display())))?
        } else {
            Self::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = env::var("FINLENS_STORAGE_DIR") {
            self.storage_dir = PathBuf::from(dir);
        }
        if let Ok(db) = env::var("FINLENS_DB_PATH") {
            self.db_path = Some(PathBuf::from(db));
        }
        if let Ok(index) = env::var("FINLENS_INDEX_PATH") {
            self.index_path = Some(PathBuf::from(index));
        }
        if let Ok(provider) = env::var("EMBEDDING_PROVIDER") {
            self.embedding.provider = EmbeddingProvider::from_str(&provider).ok_or_else(|| {
                FinError::Other(format!("unknown embedding provider {provider}"))
            })?;
        }
        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            self.embedding.model = Some(model);
        }
        if let Some(dims) = env::var("HASH_EMBED_DIMENSIONS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            self.embedding.dimensions = dims;
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.storage_dir.join(DEFAULT_DB_FILE))
    }

    /// Base path shared by the `.idx` and `.meta` artifacts.
    pub fn index_base(&self) -> PathBuf {
        self.index_path
            .clone()
            .unwrap_or_else(|| self.storage_dir.join(DEFAULT_INDEX_BASE))
    }

    pub fn ensure_storage_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.storage_dir)?;
        Ok(())
    }
}
