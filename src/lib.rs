//! # assessment-rag - Assessment Recommendation with RAG
//!
//! Crawls a public assessment product catalog, stores every product with an
//! embedding in a libsql vector index, and recommends assessments for a job
//! description by retrieving candidates and letting an LLM pick among them.
//!
//! ## Pipeline
//!
//! - `crawler`: Listing enumeration and detail-page extraction into JSON files
//! - `indexer`: Embeds crawled products into the `index`
//! - `search`: Nearest-neighbour retrieval and prompt context
//! - `recommend`: The `Recommender` service object
//! - `server`: axum HTTP API over the recommender
//! - `evaluate`: Recall@k against a ground-truth set
//!
//! ## Example
//!
//! ```rust,no_run
//! use assessment_rag::index::Database;
//! use assessment_rag::model::GeminiClient;
//! use assessment_rag::recommend::{Recommender, RecommenderOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Rate-limited Gemini models, API key from GEMINI_API_KEY
//!     let client = GeminiClient::new_gemini_from_env(None)?;
//!     let db = Database::open_existing("shl_index.db").await?;
//!
//!     let recommender = Recommender::new(db, client, RecommenderOptions::default());
//!     let response = recommender
//!         .recommend("Java developer who can collaborate with business teams")
//!         .await?;
//!
//!     for assessment in response.recommended_assessments {
//!         println!("{} - {}", assessment.name, assessment.url);
//!     }
//!     Ok(())
//! }
//! ```

mod error;
pub mod model;

pub mod crawler;
pub mod evaluate;
pub mod index;
pub mod indexer;
pub mod recommend;
pub mod search;
pub mod server;
pub mod telemetry;

pub use error::Error;

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::error::Error;
    pub use crate::error::Result;
}
