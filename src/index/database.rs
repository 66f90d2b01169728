//! Database operations for the index module

use std::path::Path;

use crate::crawler::ProductRecord;
use crate::index::IndexedProduct;
use crate::index::error::DbError;
use crate::index::schema;
use crate::model::embedding::EmbeddingConversion;
use libsql::{Connection, Row, Rows, params};
use rig::embeddings::Embedding;
use tracing::{debug, info, instrument};

/// Column list understood by `Database::row_to_product`, in order
pub const PRODUCT_COLUMNS: &str = "products.id, products.url, products.name, products.description, \
     products.duration, products.adaptive_support, products.remote_support, products.test_type, \
     products.job_levels, products.languages, products.document, products.indexed_at";

/// Database manager for the product index
#[derive(Clone)]
pub struct Database {
    conn: Connection,
    dimensions: usize,
}

impl Database {
    /// Create a database manager, creating the schema if needed
    #[instrument(skip(conn))]
    pub async fn new(conn: Connection, dimensions: usize) -> Result<Self, DbError> {
        schema::initialize_schema(&conn, dimensions).await?;

        Ok(Self { conn, dimensions })
    }

    /// Open or create the index database at `path`
    pub async fn new_from_path(path: &str, dimensions: usize) -> Result<Self, DbError> {
        let conn = Self::connect(path).await?;
        Self::new(conn, dimensions).await
    }

    /// Open an index that must already exist, reading its embedding size
    pub async fn open_existing(path: &str) -> Result<Self, DbError> {
        if !Path::new(path).exists() {
            return Err(DbError::NotFound(path.to_string()));
        }

        let conn = Self::connect(path).await?;
        let dimensions = schema::stored_dimensions(&conn)
            .await
            .map_err(|e| DbError::NotFound(format!("{}: {}", path, e)))?
            .ok_or_else(|| DbError::NotFound(format!("{} has no product index", path)))?;

        Self::new(conn, dimensions).await
    }

    async fn connect(path: &str) -> Result<Connection, DbError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DbError::Connection(format!("Failed to open database: {}", e)))?;

        db.connect()
            .map_err(|e| DbError::Connection(format!("Failed to connect to database: {}", e)))
    }

    /// Embedding size this index was created with
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Execute a custom query with parameters
    pub async fn execute_query<P>(&self, sql: &str, params: P) -> Result<Rows, DbError>
    where
        P: libsql::params::IntoParams,
    {
        self.conn
            .query(sql, params)
            .await
            .map_err(|e| DbError::Query(format!("Failed to execute query: {}", e)))
    }

    /// Insert or replace products keyed by URL, in one transaction
    ///
    /// Each embedding's `document` is stored as the product's document text.
    #[instrument(skip_all, fields(count = products.len()))]
    pub async fn upsert_products(&self, products: &[(ProductRecord, Embedding)]) -> Result<usize, DbError> {
        for (record, embedding) in products {
            if embedding.vec.len() != self.dimensions {
                return Err(DbError::DimensionMismatch {
                    expected: self.dimensions,
                    found: embedding.vec.len(),
                });
            }
            debug!("Upserting {}", record.url);
        }

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| DbError::Transaction(format!("Failed to start transaction: {}", e)))?;

        let now = chrono::Utc::now().timestamp();
        for (record, embedding) in products {
            let test_type = serde_json::to_string(&record.test_type)
                .map_err(|e| DbError::Data(format!("Failed to encode test types: {}", e)))?;

            tx.execute(
                "INSERT INTO products (url, name, description, duration, adaptive_support,
                     remote_support, test_type, job_levels, languages, document, embedding, indexed_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(url) DO UPDATE SET
                     name = excluded.name,
                     description = excluded.description,
                     duration = excluded.duration,
                     adaptive_support = excluded.adaptive_support,
                     remote_support = excluded.remote_support,
                     test_type = excluded.test_type,
                     job_levels = excluded.job_levels,
                     languages = excluded.languages,
                     document = excluded.document,
                     embedding = excluded.embedding,
                     indexed_at = excluded.indexed_at",
                params![
                    record.url.clone(),
                    record.name.clone(),
                    record.description.clone(),
                    record.duration.map(i64::from),
                    i64::from(record.adaptive_support),
                    i64::from(record.remote_support),
                    test_type,
                    record.job_levels.clone(),
                    record.languages.clone(),
                    embedding.document.clone(),
                    libsql::Value::Blob(embedding.to_binary()),
                    now,
                ],
            )
            .await
            .map_err(|e| DbError::Query(format!("Failed to upsert {}: {}", record.url, e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::Transaction(format!("Failed to commit transaction: {}", e)))?;

        info!("Upserted {} products", products.len());
        Ok(products.len())
    }

    /// Get a product by its catalog URL
    pub async fn get_product_by_url(&self, url: &str) -> Result<Option<IndexedProduct>, DbError> {
        let mut rows = self
            .execute_query(
                &format!("SELECT {} FROM products WHERE url = ?", PRODUCT_COLUMNS),
                params![url],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_product(&row)?)),
            None => Ok(None),
        }
    }

    /// Number of indexed products
    pub async fn count_products(&self) -> Result<usize, DbError> {
        let mut rows = self
            .execute_query("SELECT COUNT(*) FROM products", params![])
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(count as usize)
    }

    /// All indexed products in insertion order
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<IndexedProduct>, DbError> {
        let mut rows = self
            .execute_query(
                &format!("SELECT {} FROM products ORDER BY products.id", PRODUCT_COLUMNS),
                params![],
            )
            .await?;

        let mut products = Vec::new();
        while let Some(row) = rows.next().await? {
            products.push(Self::row_to_product(&row)?);
        }
        Ok(products)
    }

    /// Stored embedding of a product
    pub async fn get_embedding(&self, url: &str) -> Result<Option<Embedding>, DbError> {
        let mut rows = self
            .execute_query(
                "SELECT document, embedding FROM products WHERE url = ?",
                params![url],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let document: String = row.get(0)?;
        let blob: Vec<u8> = row
            .get(1)
            .map_err(|e| DbError::Data(format!("Failed to get embedding: {}", e)))?;

        let mut embedding = Embedding::from_binary(&blob);
        embedding.document = document;
        Ok(Some(embedding))
    }

    /// Convert a row selected with `PRODUCT_COLUMNS` into an `IndexedProduct`
    pub(crate) fn row_to_product(row: &Row) -> Result<IndexedProduct, DbError> {
        let field = |idx: i32, name: &str| -> Result<libsql::Value, DbError> {
            row.get_value(idx)
                .map_err(|e| DbError::Data(format!("Failed to get {}: {}", name, e)))
        };

        let test_type: String = text(field(7, "test_type")?, "test_type")?;
        let test_type: Vec<String> = serde_json::from_str(&test_type)
            .map_err(|e| DbError::Data(format!("Invalid test_type column: {}", e)))?;

        let duration = match field(4, "duration")? {
            libsql::Value::Integer(minutes) => u32::try_from(minutes).ok(),
            _ => None,
        };

        Ok(IndexedProduct {
            id: integer(field(0, "id")?, "id")?,
            record: ProductRecord {
                url: text(field(1, "url")?, "url")?,
                name: text(field(2, "name")?, "name")?,
                description: text(field(3, "description")?, "description")?,
                duration,
                adaptive_support: integer(field(5, "adaptive_support")?, "adaptive_support")? != 0,
                remote_support: integer(field(6, "remote_support")?, "remote_support")? != 0,
                test_type,
                job_levels: optional_text(field(8, "job_levels")?),
                languages: optional_text(field(9, "languages")?),
            },
            document: text(field(10, "document")?, "document")?,
            indexed_at: integer(field(11, "indexed_at")?, "indexed_at")?,
        })
    }
}

fn text(value: libsql::Value, name: &str) -> Result<String, DbError> {
    match value {
        libsql::Value::Text(text) => Ok(text),
        other => Err(DbError::Data(format!("Expected text for {}, got {:?}", name, other))),
    }
}

fn optional_text(value: libsql::Value) -> Option<String> {
    match value {
        libsql::Value::Text(text) => Some(text),
        _ => None,
    }
}

fn integer(value: libsql::Value, name: &str) -> Result<i64, DbError> {
    match value {
        libsql::Value::Integer(n) => Ok(n),
        other => Err(DbError::Data(format!("Expected integer for {}, got {:?}", name, other))),
    }
}
