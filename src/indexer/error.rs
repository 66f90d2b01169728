//! Error types for the indexer module

use crate::error::Error as CrateError;
use crate::index::DbError;
use rig::embeddings::EmbeddingError;
use thiserror::Error;

/// Error type for indexing operations
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Embedding provider error
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The provider returned an unusable embedding batch
    #[error("Embedding processing error: {0}")]
    EmbeddingProcessing(String),

    /// Index storage error
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Invalid indexer configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ProcessError> for CrateError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Database(e) => e.into(),
            _ => CrateError::Process(err.to_string()),
        }
    }
}
