//! Embedding model wrapper that waits on a governor limiter before each batch

use std::sync::Arc;

use governor::DefaultDirectRateLimiter;
use rig::embeddings::{Embedding, EmbeddingError, EmbeddingModel};
use tracing::{Instrument, debug_span, info_span};

#[derive(Clone)]
pub struct RateLimitedEmbeddingModel<M: EmbeddingModel> {
    model: M,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl<M> RateLimitedEmbeddingModel<M>
where
    M: EmbeddingModel,
{
    pub fn new(model: M, limiter: DefaultDirectRateLimiter) -> Self {
        Self {
            model,
            limiter: Arc::new(limiter),
        }
    }
}

impl<M: EmbeddingModel> EmbeddingModel for RateLimitedEmbeddingModel<M> {
    const MAX_DOCUMENTS: usize = M::MAX_DOCUMENTS;

    fn ndims(&self) -> usize {
        self.model.ndims()
    }

    /// One limiter permit per request, however many texts it carries
    async fn embed_texts(
        &self,
        texts: impl IntoIterator<Item = String> + Send,
    ) -> Result<Vec<Embedding>, EmbeddingError> {
        self.limiter.until_ready().instrument(debug_span!("limiter")).await;
        self.model
            .embed_texts(texts)
            .instrument(info_span!("embed_texts"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mock_model::MockEmbeddingModel;
    use governor::{Quota, RateLimiter};
    use std::num::NonZeroU32;
    use std::time::Duration;

    #[tokio::test]
    async fn test_delegates_to_inner_model() {
        let mock = MockEmbeddingModel::new(8);
        let quota = Quota::per_minute(NonZeroU32::new(600).unwrap());
        let model = RateLimitedEmbeddingModel::new(mock.clone(), RateLimiter::direct(quota));

        let embeddings = model
            .embed_texts(vec!["Java".to_string(), "Python".to_string()])
            .await
            .unwrap();

        assert_eq!(model.ndims(), 8);
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[1].vec, mock.vector_for("Python"));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_waits_when_quota_is_spent() {
        let mock = MockEmbeddingModel::new(8);
        let quota = Quota::per_second(NonZeroU32::new(1).unwrap());
        let model = RateLimitedEmbeddingModel::new(mock.clone(), RateLimiter::direct(quota));

        model.embed_texts(vec!["a".to_string()]).await.unwrap();
        let second = tokio::time::timeout(
            Duration::from_millis(50),
            model.embed_texts(vec!["b".to_string()]),
        )
        .await;

        assert!(second.is_err());
        assert_eq!(mock.calls(), 1);
    }
}
