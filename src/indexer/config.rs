//! # Indexer Configuration Module
//!
//! Batch size and vector size for building the product index.

/// Configuration for the indexer
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Documents sent to the embedding model per request
    pub batch_size: usize,

    /// Dimensions of the embedding vectors
    pub embedding_dimensions: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            embedding_dimensions: 768,
        }
    }
}

/// Builder for IndexerConfig
#[derive(Debug, Default)]
pub struct IndexerConfigBuilder {
    config: IndexerConfig,
}

impl IndexerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: IndexerConfig::default(),
        }
    }

    /// Set the embedding batch size
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Set the embedding dimensions
    pub fn embedding_dimensions(mut self, embedding_dimensions: usize) -> Self {
        self.config.embedding_dimensions = embedding_dimensions;
        self
    }

    /// Build the configuration
    pub fn build(self) -> IndexerConfig {
        self.config
    }
}

impl IndexerConfig {
    /// Create a new builder
    pub fn builder() -> IndexerConfigBuilder {
        IndexerConfigBuilder::new()
    }
}
