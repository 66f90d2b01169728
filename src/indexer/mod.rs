//! Product indexer
//!
//! Turns crawl entries into document text, embeds them in batches and
//! upserts them into the vector index. Entries whose detail page could not be
//! extracted are indexed as placeholders so every catalog URL is searchable.

mod config;
mod error;

pub use config::{IndexerConfig, IndexerConfigBuilder};
pub use error::ProcessError;

use std::collections::HashSet;

use crate::crawler::{CrawlEntry, ProductRecord, yes_no_str};
use crate::index::Database;
use crate::model::Client;
use rig::{
    completion::CompletionModel,
    embeddings::{Embedding, EmbeddingModel},
};
use tracing::{debug, info, instrument, warn};

/// Counts reported after indexing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
    /// Entries read from the crawl output
    pub total: usize,

    /// Rows written to the index
    pub indexed: usize,

    /// Indexed entries that had no extracted record
    pub placeholders: usize,

    /// Entries skipped because their URL appeared earlier
    pub duplicates: usize,
}

/// Text embedded for a product
pub fn product_document(record: &ProductRecord) -> String {
    let duration = record
        .duration
        .map(|minutes| format!("{} minutes", minutes))
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        "Assessment Name: {}\nTest Types: {}\nDescription: {}\nDuration: {}\nremote_support: {}",
        record.name,
        record.test_type.join(", "),
        record.description,
        duration,
        yes_no_str(record.remote_support),
    )
}

/// Embed `documents` in batches, preserving order
#[instrument(skip(client, documents), fields(count = documents.len()))]
pub async fn embed_documents<C, E>(
    client: &Client<C, E>,
    documents: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Embedding>, ProcessError>
where
    C: CompletionModel,
    E: EmbeddingModel,
{
    let batch_size = batch_size.min(E::MAX_DOCUMENTS).max(1);
    let mut embeddings = Vec::with_capacity(documents.len());

    for batch in documents.chunks(batch_size) {
        let batch_embeddings = client.embedding().embed_texts(batch.to_vec()).await?;
        if batch_embeddings.len() != batch.len() {
            return Err(ProcessError::EmbeddingProcessing(format!(
                "requested {} embeddings, received {}",
                batch.len(),
                batch_embeddings.len()
            )));
        }
        embeddings.extend(batch_embeddings);
    }

    Ok(embeddings)
}

/// Embed and store every crawl entry
///
/// `on_batch` is called after each stored batch with the number of entries
/// indexed so far and the number to index.
#[instrument(skip_all, fields(entries = entries.len()))]
pub async fn index_products<C, E, F>(
    client: &Client<C, E>,
    db: &Database,
    entries: Vec<CrawlEntry>,
    config: &IndexerConfig,
    mut on_batch: F,
) -> Result<IndexSummary, ProcessError>
where
    C: CompletionModel,
    E: EmbeddingModel,
    F: FnMut(usize, usize),
{
    let ndims = client.embedding().ndims();
    if ndims != config.embedding_dimensions || ndims != db.dimensions() {
        return Err(ProcessError::Config(format!(
            "embedding model produces {} dimensions, config expects {}, index holds {}",
            ndims,
            config.embedding_dimensions,
            db.dimensions()
        )));
    }

    let mut summary = IndexSummary {
        total: entries.len(),
        ..IndexSummary::default()
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        if !seen.insert(entry.url().to_string()) {
            warn!("Skipping duplicate entry {}", entry.url());
            summary.duplicates += 1;
            continue;
        }
        if !entry.is_extracted() {
            summary.placeholders += 1;
        }
        records.push(entry.into_record());
    }

    info!("Indexing {} products", records.len());
    let to_index = records.len();
    for batch in records.chunks(config.batch_size.max(1)) {
        let documents = batch.iter().map(product_document).collect();
        let embeddings = embed_documents(client, documents, config.batch_size).await?;

        let rows: Vec<(ProductRecord, Embedding)> =
            batch.iter().cloned().zip(embeddings).collect();
        summary.indexed += db.upsert_products(&rows).await?;

        debug!("Indexed {}/{}", summary.indexed, to_index);
        on_batch(summary.indexed, to_index);
    }

    info!(
        "Indexed {} products ({} placeholders, {} duplicates skipped)",
        summary.indexed, summary.placeholders, summary.duplicates
    );
    Ok(summary)
}
