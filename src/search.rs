//! # Semantic Search Module
//!
//! Nearest-neighbour retrieval over the product index, the "retrieval" half
//! of the recommendation pipeline.
//!
//! ## Search Process
//!
//! 1. Embed the query with the same model that embedded the products
//! 2. Ask libsql's `vector_top_k` for the closest rows of `products_idx`
//! 3. Order the hits by cosine distance and attach the stored product fields
//! 4. Format the hits as prompt context with `prepare_context`
//!
//! When the vector index is unavailable the search falls back to an exhaustive
//! `vector_distance_cos` scan, which returns the same ranking.

mod error;

pub use error::SearchError;

use std::fmt::Write;

use crate::crawler::yes_no_str;
use crate::index::{Database, IndexedProduct, PRODUCT_COLUMNS, VECTOR_INDEX};
use crate::model::{Client, EmbeddingConversion};
use rig::{completion::CompletionModel, embeddings::EmbeddingModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Options for search queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum number of results to return
    pub limit: usize,

    /// Skip the vector index and scan every row
    pub exhaustive: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            exhaustive: false,
        }
    }
}

impl SearchOptions {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }
}

/// One retrieved product
#[derive(Debug, Clone)]
pub struct ProductHit {
    /// 1-based position in the result list
    pub rank: usize,

    /// Stored product
    pub product: IndexedProduct,

    /// Cosine distance between query and product embeddings
    pub distance: f64,
}

/// Embed `query` and return the closest products in rank order
#[instrument(skip(db, client, options), fields(limit = options.limit))]
pub async fn search_products<C, E>(
    db: &Database,
    client: &Client<C, E>,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<ProductHit>, SearchError>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    if query.trim().is_empty() {
        return Err(SearchError::InvalidParameters("query is empty".to_string()));
    }
    if options.limit == 0 {
        return Err(SearchError::InvalidParameters(
            "limit must be greater than zero".to_string(),
        ));
    }

    let query_embedding = client
        .embedding()
        .embed_texts(vec![query.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| SearchError::Embedding("no embedding returned for query".to_string()))?;

    if query_embedding.vec.len() != db.dimensions() {
        return Err(SearchError::InvalidParameters(format!(
            "query embedding has {} dimensions, index holds {}",
            query_embedding.vec.len(),
            db.dimensions()
        )));
    }

    let blob = query_embedding.to_binary();
    if options.exhaustive {
        return exhaustive_search(db, &blob, options.limit).await;
    }

    match vector_search(db, &blob, options.limit).await {
        Ok(hits) => Ok(hits),
        Err(e) => {
            warn!("Vector index search failed ({}), scanning all products", e);
            exhaustive_search(db, &blob, options.limit).await
        }
    }
}

/// Search using the vector_top_k function
async fn vector_search(db: &Database, blob: &[u8], limit: usize) -> Result<Vec<ProductHit>, SearchError> {
    let sql = format!(
        "SELECT {}, vector_distance_cos(products.embedding, ?1) AS distance
         FROM vector_top_k('{}', ?1, ?2) AS v
         JOIN products ON products.rowid = v.id
         ORDER BY distance ASC",
        PRODUCT_COLUMNS, VECTOR_INDEX
    );
    let params = vec![
        libsql::Value::Blob(blob.to_vec()),
        libsql::Value::from(limit as i64),
    ];

    let rows = db.execute_query(&sql, params).await?;
    process_results(rows).await
}

/// Rank every product by distance
async fn exhaustive_search(db: &Database, blob: &[u8], limit: usize) -> Result<Vec<ProductHit>, SearchError> {
    let sql = format!(
        "SELECT {}, vector_distance_cos(products.embedding, ?1) AS distance
         FROM products
         ORDER BY distance ASC, products.id ASC
         LIMIT ?2",
        PRODUCT_COLUMNS
    );
    let params = vec![
        libsql::Value::Blob(blob.to_vec()),
        libsql::Value::from(limit as i64),
    ];

    let rows = db.execute_query(&sql, params).await?;
    process_results(rows).await
}

/// Process the results from a query into ProductHits
async fn process_results(mut rows: libsql::Rows) -> Result<Vec<ProductHit>, SearchError> {
    let mut hits = Vec::new();
    while let Some(row) = rows.next().await? {
        let product = Database::row_to_product(&row)?;
        let distance = match row.get_value(12)? {
            libsql::Value::Real(distance) => distance,
            libsql::Value::Integer(distance) => distance as f64,
            other => {
                return Err(SearchError::ResultProcessing(format!(
                    "Unexpected distance value {:?}",
                    other
                )));
            }
        };
        hits.push(ProductHit {
            rank: hits.len() + 1,
            product,
            distance,
        });
    }

    debug!("Retrieved {} products", hits.len());
    Ok(hits)
}

/// Format hits as LLM prompt context, one block per product
pub fn prepare_context(hits: &[ProductHit]) -> String {
    let mut context = String::new();
    for hit in hits {
        let record = &hit.product.record;
        let duration = record
            .duration
            .map(|minutes| minutes.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let test_type = serde_json::Value::from(record.test_type.clone());

        // Writing to a String cannot fail
        let _ = write!(
            context,
            "URL: {}\nName: {}\nAdaptive_support: {}\ndescription: {}\nduration: {}\nremote_support: {}\ntest_type: {}\n\n",
            record.url,
            record.name,
            yes_no_str(record.adaptive_support),
            record.description,
            duration,
            yes_no_str(record.remote_support),
            test_type,
        );
    }
    context
}
