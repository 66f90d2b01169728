//! # Mock Models for Testing
//!
//! `MockCompletionModel` returns a predefined response or error, and
//! `MockEmbeddingModel` produces deterministic bag-of-words vectors, so search
//! and recommendation can be exercised without API calls.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rig::{
    completion::{
        AssistantContent, CompletionError, CompletionModel, CompletionRequest, CompletionResponse,
    },
    embeddings::{Embedding, EmbeddingError, EmbeddingModel},
    one_or_many::OneOrMany,
};
use tokio::sync::Mutex;

/// A mock completion model for testing purposes.
/// It returns a predefined response or error when `completion` is called.
#[derive(Debug, Clone)]
pub struct MockCompletionModel {
    /// The predefined response. Arc<Mutex<>> allows modification after creation.
    response: Arc<Mutex<Option<OneOrMany<AssistantContent>>>>,
    error: Arc<Mutex<Option<String>>>,
    calls: Arc<AtomicUsize>,
}

impl MockCompletionModel {
    /// Creates a new mock model that will return a default empty success response.
    pub fn new() -> Self {
        Self {
            response: Arc::new(Mutex::new(None)),
            error: Arc::new(Mutex::new(None)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sets the response that the mock model should return.
    pub async fn set_response(&self, response: OneOrMany<AssistantContent>) {
        let mut guard = self.response.lock().await;
        *guard = Some(response);
    }

    /// Helper to create a simple text response.
    pub async fn set_text_response(&self, text: &str) {
        let response = OneOrMany::one(AssistantContent::text(text));
        self.set_response(response).await;
    }

    /// Make every call fail with a provider error
    pub async fn set_error(&self, message: &str) {
        *self.error.lock().await = Some(message.to_string());
    }

    /// Number of completions requested so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockCompletionModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionModel for MockCompletionModel {
    type Response = String;

    async fn completion(
        &self,
        _completion_request: CompletionRequest,
    ) -> Result<CompletionResponse<Self::Response>, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.error.lock().await.clone() {
            return Err(CompletionError::ProviderError(message));
        }

        let response = {
            let guard = self.response.lock().await;
            guard.clone()
        };
        match response {
            Some(result) => Ok(CompletionResponse {
                choice: result,
                raw_response: "".to_string(),
            }),
            None => Ok(CompletionResponse {
                choice: OneOrMany::one(AssistantContent::text("")),
                raw_response: "".to_string(),
            }),
        }
    }
}

/// Deterministic embedding model: each lowercase word is hashed into one of
/// `ndims` buckets and the vector is L2-normalized, so texts sharing words
/// are close under cosine distance.
#[derive(Debug, Clone)]
pub struct MockEmbeddingModel {
    ndims: usize,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl MockEmbeddingModel {
    pub fn new(ndims: usize) -> Self {
        Self {
            ndims,
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A model whose every call fails
    pub fn failing(ndims: usize) -> Self {
        Self {
            fail: true,
            ..Self::new(ndims)
        }
    }

    /// Number of `embed_texts` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(&self, text: &str) -> Vec<f64> {
        let mut vec = vec![0.0; self.ndims];
        if self.ndims == 0 {
            return vec;
        }
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vec[(hasher.finish() % self.ndims as u64) as usize] += 1.0;
        }
        let norm = vec.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            vec.iter_mut().for_each(|v| *v /= norm);
        }
        vec
    }
}

impl EmbeddingModel for MockEmbeddingModel {
    const MAX_DOCUMENTS: usize = 64;

    fn ndims(&self) -> usize {
        self.ndims
    }

    async fn embed_texts(
        &self,
        texts: impl IntoIterator<Item = String> + Send,
    ) -> Result<Vec<Embedding>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmbeddingError::ProviderError("mock embedding failure".to_string()));
        }
        Ok(texts
            .into_iter()
            .map(|document| Embedding {
                vec: self.vector_for(&document),
                document,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embeddings_are_normalized_and_deterministic() {
        let model = MockEmbeddingModel::new(32);
        let embeddings = model
            .embed_texts(vec!["Java developer".to_string(), "java DEVELOPER".to_string()])
            .await
            .unwrap();

        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].vec, embeddings[1].vec);
        let norm: f64 = embeddings[0].vec.iter().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-9);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_completion_error() {
        let model = MockCompletionModel::new();
        model.set_error("quota exceeded").await;

        let request = rig::agent::AgentBuilder::new(model.clone()).build();
        let result = rig::completion::Prompt::prompt(&request, "hi").await;

        assert!(result.is_err());
        assert_eq!(model.calls(), 1);
    }
}
