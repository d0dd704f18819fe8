//! Error types for tabload

use crate::types::SemanticType;
use thiserror::Error;

/// Result type alias for tabload operations
pub type Result<T> = std::result::Result<T, TabloadError>;

/// Main error type for tabload
#[derive(Error, Debug)]
pub enum TabloadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Pre-chunk validation failure: bad path, empty file, wrong extension.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(
        "Schema mismatch for column '{column}': expected {expected}, got {actual}"
    )]
    SchemaMismatch {
        column: String,
        expected: SemanticType,
        actual: SemanticType,
    },

    #[error("Value in column '{column}' is not representable in {encoding}")]
    Encoding { column: String, encoding: String },

    /// Expected, non-fatal terminal condition: this file content is already
    /// registered in the import ledger.
    #[error("This file has already been imported")]
    AlreadyImported,

    #[error("Failed to ingest chunk {chunk_index} after {attempts} attempts")]
    ExhaustedRetries { chunk_index: usize, attempts: u32 },

    #[error("Checkpoint error: {0}")]
    Progress(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TabloadError {
    /// Whether this error belongs to the transient class that the chunk loop
    /// retries. Validation, schema, encoding, and dedup outcomes propagate
    /// immediately; store and IO failures inside a chunk are retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TabloadError::Io(_) | TabloadError::Store(_) | TabloadError::Csv(_)
        )
    }
}
