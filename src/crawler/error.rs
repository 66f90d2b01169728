//! Error types for the crawler module

use std::path::PathBuf;

use crate::crawler::storage::StorageError;
use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTML parsing error
    #[error("HTML parsing error: {0}")]
    HtmlParse(String),

    /// Navigation to a page failed
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// The links file the crawl depends on does not exist
    #[error("Input file {} not found. Run the link enumeration first.", .0.display())]
    MissingInput(PathBuf),

    /// The session cannot perform the requested action
    #[error("Unsupported session action: {0}")]
    Unsupported(String),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Output persistence error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<CrawlError> for CrateError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::Http(e) => CrateError::Http(e),
            CrawlError::Storage(e) => e.into(),
            _ => CrateError::Crawl(err.to_string()),
        }
    }
}
