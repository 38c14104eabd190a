//! Evidence store configuration.

use arag_core::{AppConfig, AppError, AppResult};
use std::path::PathBuf;

/// Settings the evidence store needs at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// SQLite index file
    pub db_path: PathBuf,

    /// Target segment size in tokens
    pub chunk_tokens: usize,

    /// Overlap between segments in tokens
    pub chunk_overlap: usize,
}

impl StoreConfig {
    /// Store rooted at `db_path` with default segmenting.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            chunk_tokens: 250,
            chunk_overlap: 0,
        }
    }

    /// Derive store settings from the application configuration.
    pub fn from_app_config(config: &AppConfig) -> AppResult<Self> {
        let store = Self {
            db_path: config.index_path(),
            chunk_tokens: config.index.chunk_tokens,
            chunk_overlap: config.index.chunk_overlap,
        };
        store.validate()?;
        Ok(store)
    }

    /// Reject segmenting settings that cannot make progress.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_tokens == 0 {
            return Err(AppError::Config(
                "chunkTokens must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_tokens {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkTokens ({})",
                self.chunk_overlap, self.chunk_tokens
            )));
        }
        Ok(())
    }
}
