//! Vector index of catalog products
//!
//! Products are stored in a libsql database together with the embedding of
//! their document text, and searched with libsql's native vector functions.

mod database;
pub mod error;
mod schema;

pub use database::{Database, PRODUCT_COLUMNS};
pub use error::DbError;
pub use schema::VECTOR_INDEX;

use crate::crawler::ProductRecord;

/// Default location of the index database
pub const DEFAULT_INDEX_PATH: &str = "shl_index.db";

/// A product row read back from the index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedProduct {
    /// Row ID of the product
    pub id: i64,

    /// The stored catalog fields
    pub record: ProductRecord,

    /// Text that was embedded for this product
    pub document: String,

    /// Unix timestamp of the last upsert
    pub indexed_at: i64,
}

impl IndexedProduct {
    pub fn url(&self) -> &str {
        &self.record.url
    }

    pub fn into_record(self) -> ProductRecord {
        self.record
    }
}
