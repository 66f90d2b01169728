//! # Search Error Types Module
//!
//! Errors raised while embedding a query or reading nearest neighbours from
//! the product index.

use thiserror::Error;

use crate::error::Error as CrateError;
use crate::index::DbError;

/// Errors that can occur during search operations
#[derive(Debug, Error)]
pub enum SearchError {
    /// Error occurred during database operations
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Error occurred during embedding generation
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Error occurred during result processing
    #[error("Result processing error: {0}")]
    ResultProcessing(String),

    /// Invalid search parameters
    #[error("Invalid search parameters: {0}")]
    InvalidParameters(String),
}

impl From<rig::embeddings::EmbeddingError> for SearchError {
    fn from(err: rig::embeddings::EmbeddingError) -> Self {
        SearchError::Embedding(err.to_string())
    }
}

impl From<libsql::Error> for SearchError {
    fn from(err: libsql::Error) -> Self {
        SearchError::Database(DbError::Query(err.to_string()))
    }
}

impl From<SearchError> for CrateError {
    fn from(err: SearchError) -> Self {
        CrateError::Search(err.to_string())
    }
}
