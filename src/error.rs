//! Error types for the assessment-rag crate

use thiserror::Error;

/// Result type for assessment-rag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for assessment-rag operations
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog crawling error
    #[error("Crawl error: {0}")]
    Crawl(String),

    /// Crawl output persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record embedding and indexing error
    #[error("Process error: {0}")]
    Process(String),

    /// Vector index error
    #[error("Database error: {0}")]
    Database(String),

    /// Nearest-neighbor search error
    #[error("Search error: {0}")]
    Search(String),

    /// Recommendation generation error
    #[error("Recommendation error: {0}")]
    Recommend(String),

    /// Evaluation run error
    #[error("Evaluation error: {0}")]
    Evaluate(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}
