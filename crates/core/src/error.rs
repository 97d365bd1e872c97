use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("unsupported file format: {0:?}")]
    UnsupportedInput(PathBuf),
    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),
    #[error("index consistency violation: {0}")]
    Consistency(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("pdf extract failed: {0}")]
    Pdf(String),
    #[error("other: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FinError>;

impl FinError {
    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency(message.into())
    }
}
