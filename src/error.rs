//! Error types for extraction, storage, and querying

use std::path::PathBuf;

use thiserror::Error;

/// Result type for flow-schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Flow-schema errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("Store not found at {0}")]
    StoreMissing(PathBuf),

    #[error("Invalid literal at offset {offset}: {message}")]
    InvalidLiteral { offset: usize, message: String },

    #[error("Source unit does not declare a component")]
    NotAComponent,

    #[error("Definition is missing required field '{0}'")]
    MissingIdentity(&'static str),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl SchemaError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn literal(offset: usize, message: impl Into<String>) -> Self {
        Self::InvalidLiteral {
            offset,
            message: message.into(),
        }
    }
}
