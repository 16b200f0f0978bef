use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CurtainError {
    #[error("invalid dataset link id: {0}")]
    InvalidLinkId(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("store for dataset {0} is closed")]
    StoreClosed(String),

    #[error("failed to serialize value: {0}")]
    Serialization(String),

    #[error("failed to parse dataset payload: {0}")]
    PayloadParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filter list catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("filter list catalog returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("settings variant not found: {0}")]
    VariantNotFound(String),

    #[error("filter list not found: {0}")]
    FilterListNotFound(String),

    #[error("default filter list cannot be deleted: {0}")]
    DefaultFilterList(String),
}

impl From<rusqlite::Error> for CurtainError {
    fn from(err: rusqlite::Error) -> Self {
        CurtainError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CurtainError {
    fn from(err: serde_json::Error) -> Self {
        CurtainError::Serialization(err.to_string())
    }
}
