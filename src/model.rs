//! # LLM Client Module
//!
//! A unified client over one completion model and one embedding model, with
//! built-in rate limiting to stay inside provider quotas.
//!
//! ## Key Components
//!
//! - `Client`: Pairs the completion model used for recommendations with the
//!   embedding model used for indexing and search
//! - `RateLimitedCompletionModel` / `RateLimitedEmbeddingModel`: governor-backed
//!   wrappers around any `rig` model
//! - `EmbeddingConversion`: Converts rig embeddings to the f32 blobs stored in the index
//!
//! Clients are built once at startup and passed to the indexer, search and
//! recommender; nothing here is global.

use std::num::NonZeroU32;

use governor::{Quota, RateLimiter};
use ratelimited_completion::RateLimitedCompletionModel;
use ratelimited_embedding::RateLimitedEmbeddingModel;
use rig::{completion::CompletionModel, embeddings::EmbeddingModel, providers::gemini};

use crate::error::{Error, Result};

pub mod embedding;
#[cfg(test)]
pub mod mock_model;
pub mod ratelimited_completion;
pub mod ratelimited_embedding;

pub use embedding::EmbeddingConversion;

/// Completion model used for recommendations unless overridden
pub const DEFAULT_COMPLETION_MODEL: &str = "gemini-2.5-flash";

/// Completion model for the free tier
pub const FREE_COMPLETION_MODEL: &str = "gemini-2.0-flash-lite";

/// Environment variable holding the Gemini API key
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable holding the free-tier Gemini API key
pub const GEMINI_FREE_API_KEY_ENV: &str = "GEMINI_FREE_API_KEY";

#[derive(Debug, Clone)]
pub struct Client<C, E>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    completion_model: C,
    embedding_model: E,
}

pub type GeminiCompletionModel = RateLimitedCompletionModel<gemini::completion::CompletionModel>;
pub type GeminiEmbeddingModel = RateLimitedEmbeddingModel<gemini::embedding::EmbeddingModel>;

/// Gemini models behind rate limiters
pub type GeminiClient = Client<GeminiCompletionModel, GeminiEmbeddingModel>;

/// Requests-per-minute quotas applied to a Gemini client
#[derive(Debug, Clone, Copy)]
struct Quotas {
    completion_per_minute: u32,
    embedding_per_minute: u32,
}

impl Quotas {
    const STANDARD: Quotas = Quotas {
        completion_per_minute: 2000,
        embedding_per_minute: 1000,
    };

    const FREE: Quotas = Quotas {
        completion_per_minute: 30,
        embedding_per_minute: 1000,
    };
}

fn api_key(var: &str) -> Result<String> {
    std::env::var(var)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| Error::Other(format!("{} environment variable must be set", var)))
}

fn per_minute(count: u32) -> Result<Quota> {
    NonZeroU32::new(count)
        .map(Quota::per_minute)
        .ok_or_else(|| Error::Other("rate limit must be greater than zero".to_string()))
}

impl GeminiClient {
    /// Build a client from `GEMINI_API_KEY`, using `model` for completions
    pub fn new_gemini_from_env(model: Option<&str>) -> Result<Self> {
        let gemini_client = gemini::Client::new(&api_key(GEMINI_API_KEY_ENV)?);
        Self::new_gemini(gemini_client, model.unwrap_or(DEFAULT_COMPLETION_MODEL))
    }

    /// Build a free-tier client from `GEMINI_FREE_API_KEY`
    pub fn new_gemini_free_from_env() -> Result<Self> {
        let gemini_client = gemini::Client::new(&api_key(GEMINI_FREE_API_KEY_ENV)?);
        Self::new_gemini_free(gemini_client)
    }

    pub fn new_gemini(gemini_client: gemini::Client, model: &str) -> Result<Self> {
        Self::with_quotas(gemini_client, model, Quotas::STANDARD)
    }

    pub fn new_gemini_free(gemini_client: gemini::Client) -> Result<Self> {
        Self::with_quotas(gemini_client, FREE_COMPLETION_MODEL, Quotas::FREE)
    }

    fn with_quotas(gemini_client: gemini::Client, model: &str, quotas: Quotas) -> Result<Self> {
        let completion_limiter = RateLimiter::direct(per_minute(quotas.completion_per_minute)?);
        let embedding_limiter = RateLimiter::direct(per_minute(quotas.embedding_per_minute)?);
        let completion_model =
            RateLimitedCompletionModel::new(gemini_client.completion_model(model), completion_limiter);
        let embedding_model = RateLimitedEmbeddingModel::new(
            gemini_client.embedding_model(gemini::embedding::EMBEDDING_004),
            embedding_limiter,
        );
        Ok(Client::new(completion_model, embedding_model))
    }
}

impl<C, E> Client<C, E>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    pub fn new(completion_model: C, embedding_model: E) -> Self {
        Self {
            completion_model,
            embedding_model,
        }
    }

    pub fn completion(&self) -> &C {
        &self.completion_model
    }

    pub fn embedding(&self) -> &E {
        &self.embedding_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock_model::{MockCompletionModel, MockEmbeddingModel};

    #[test]
    fn test_zero_quota_is_rejected() {
        assert!(per_minute(0).is_err());
        assert!(per_minute(30).is_ok());
    }

    #[test]
    fn test_generic_client_accessors() {
        let client = Client::new(MockCompletionModel::new(), MockEmbeddingModel::new(16));
        assert_eq!(client.embedding().ndims(), 16);
        assert_eq!(client.completion().calls(), 0);
    }
}
