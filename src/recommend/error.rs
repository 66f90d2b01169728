//! Error types for the recommender

use rig::completion::CompletionError;
use thiserror::Error;

use crate::error::Error as CrateError;
use crate::search::SearchError;

/// Errors that can occur while producing recommendations
#[derive(Debug, Error)]
pub enum RecommendError {
    /// The query was empty or whitespace
    #[error("Query must not be empty")]
    EmptyQuery,

    /// Retrieval failed
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// The completion model call failed
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    /// The model answered with something other than a usable recommendation list
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),
}

impl From<RecommendError> for CrateError {
    fn from(err: RecommendError) -> Self {
        match err {
            RecommendError::Search(e) => e.into(),
            _ => CrateError::Recommend(err.to_string()),
        }
    }
}
