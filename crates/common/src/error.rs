//! Error types for AnonCheck

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the AnonCheck error
pub type Result<T> = std::result::Result<T, Error>;

/// AnonCheck error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Ledger at {path} is unreadable: {reason}")]
    LedgerCorrupt { path: PathBuf, reason: String },

    #[error("Ledger persist failed for {path}: {reason}")]
    LedgerPersist { path: PathBuf, reason: String },
}
