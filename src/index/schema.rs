//! # Database Schema Module
//!
//! Creates the product index tables in a libsql database.
//!
//! ## Schema Design
//!
//! 1. `products` - one row per catalog URL with the extracted fields, the
//!    document text that was embedded, and the embedding as an `F32_BLOB`
//! 2. `index_meta` - key/value settings, currently the embedding dimension the
//!    index was created with
//!
//! `products_idx` is a libsql vector index over `products.embedding` used by
//! `vector_top_k`.

use crate::index::error::DbError;
use libsql::{Connection, params};
use tracing::warn;

/// Name of the vector index over product embeddings
pub const VECTOR_INDEX: &str = "products_idx";

const DIMENSIONS_KEY: &str = "embedding_dimensions";

/// Initialize the database schema for embeddings of `dimensions` floats
pub async fn initialize_schema(conn: &Connection, dimensions: usize) -> Result<(), DbError> {
    if dimensions == 0 {
        return Err(DbError::Schema(
            "Embedding dimensions must be greater than zero".to_string(),
        ));
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        params![],
    )
    .await
    .map_err(|e| DbError::Schema(format!("Failed to create index_meta table: {}", e)))?;

    match stored_dimensions(conn).await? {
        Some(found) if found != dimensions => {
            return Err(DbError::DimensionMismatch {
                expected: dimensions,
                found,
            });
        }
        Some(_) => {}
        None => {
            conn.execute(
                "INSERT INTO index_meta (key, value) VALUES (?, ?)",
                params![DIMENSIONS_KEY, dimensions.to_string()],
            )
            .await
            .map_err(|e| DbError::Schema(format!("Failed to record dimensions: {}", e)))?;
        }
    }

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                duration INTEGER,
                adaptive_support INTEGER NOT NULL DEFAULT 0,
                remote_support INTEGER NOT NULL DEFAULT 0,
                test_type TEXT NOT NULL DEFAULT '[]',
                job_levels TEXT,
                languages TEXT,
                document TEXT NOT NULL,
                embedding F32_BLOB({}) NOT NULL,
                indexed_at INTEGER NOT NULL
            )",
            dimensions
        ),
        params![],
    )
    .await
    .map_err(|e| DbError::Schema(format!("Failed to create products table: {}", e)))?;

    // Vector search degrades to a full scan without this index
    let vector_index_result = conn
        .execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {} ON products (libsql_vector_idx(embedding, 'metric=cosine'))",
                VECTOR_INDEX
            ),
            params![],
        )
        .await;

    if let Err(e) = vector_index_result {
        warn!(
            "Failed to create vector index: {}. Falling back to exhaustive search.",
            e
        );
    }

    Ok(())
}

/// Embedding dimension recorded when the index was created
pub async fn stored_dimensions(conn: &Connection) -> Result<Option<usize>, DbError> {
    let mut rows = conn
        .query(
            "SELECT value FROM index_meta WHERE key = ?",
            params![DIMENSIONS_KEY],
        )
        .await
        .map_err(|e| DbError::Query(format!("Failed to read index_meta: {}", e)))?;

    let Some(row) = rows.next().await? else {
        return Ok(None);
    };
    let value: String = row.get(0)?;
    value
        .parse()
        .map(Some)
        .map_err(|e| DbError::Data(format!("Invalid stored dimensions '{}': {}", value, e)))
}
