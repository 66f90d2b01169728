//! HTTP API for the recommender
//!
//! - `POST /recommend` with `{"query": "..."}` returns `RecommendationResponse`
//! - `GET /health` returns `{"status": "active"}`
//!
//! The server starts even without a loaded index; `/recommend` then answers
//! 503 until it is restarted with one.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use rig::{completion::CompletionModel, embeddings::EmbeddingModel};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::recommend::{RecommendError, RecommendationResponse, Recommender};

/// Shared handler state
pub struct AppState<C, E>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    recommender: Option<Arc<Recommender<C, E>>>,
}

// Derive would require C: Clone and E: Clone
impl<C, E> Clone for AppState<C, E>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    fn clone(&self) -> Self {
        Self {
            recommender: self.recommender.clone(),
        }
    }
}

impl<C, E> AppState<C, E>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    pub fn new(recommender: Recommender<C, E>) -> Self {
        Self {
            recommender: Some(Arc::new(recommender)),
        }
    }

    /// State for a server whose index failed to load
    pub fn without_index() -> Self {
        Self { recommender: None }
    }

    pub fn is_ready(&self) -> bool {
        self.recommender.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
}

/// Build the application router
pub fn router<C, E>(state: AppState<C, E>) -> Router
where
    C: CompletionModel + 'static,
    E: EmbeddingModel + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/recommend", post(recommend::<C, E>))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process stops
pub async fn serve<C, E>(addr: SocketAddr, state: AppState<C, E>) -> Result<()>
where
    C: CompletionModel + 'static,
    E: EmbeddingModel + 'static,
{
    if !state.is_ready() {
        warn!("Serving without a vector index, /recommend is disabled");
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .await
        .map_err(Error::Io)
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "active" })
}

async fn recommend<C, E>(
    State(state): State<AppState<C, E>>,
    Json(request): Json<RecommendRequest>,
) -> std::result::Result<Json<RecommendationResponse>, ApiError>
where
    C: CompletionModel + 'static,
    E: EmbeddingModel + 'static,
{
    let Some(recommender) = state.recommender.as_ref() else {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "vector index not loaded",
        ));
    };

    match recommender.recommend(&request.query).await {
        Ok(response) => Ok(Json(response)),
        Err(RecommendError::EmptyQuery) => {
            Err(api_error(StatusCode::BAD_REQUEST, "query must not be empty"))
        }
        Err(e) => {
            error!("Recommendation failed: {}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
