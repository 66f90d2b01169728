//! # Assessment Catalog Crawler
//!
//! This module scrapes the assessment product catalog into structured records.
//! It is the first stage of the pipeline and produces the JSON files the
//! indexer consumes.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: Endpoints, delays, retry and checkpoint settings
//! - `PageSession`: The single page-fetching session used for a whole crawl
//! - `enumerate_catalog`: Paginates the listing and discovers detail-page links
//! - `extract_product`: Turns one detail page into a `ProductRecord`
//! - `CrawlDriver` / `run_product_crawl`: Retry, checkpoint and persist every item
//!
//! ## Output
//!
//! Every discovered URL ends up in the product file exactly once. Pages that
//! could not be fetched after all retries are written as the bare
//! `CatalogItem`, so the file stays complete even when data is missing.

mod catalog;
mod config;
mod driver;
mod error;
mod extract;
mod listing;
pub mod session;
pub mod storage;

pub use catalog::CatalogMap;
pub use config::{CrawlerConfig, CrawlerConfigBuilder};
pub use driver::{
    CrawlDriver, CrawlReport, CrawlSummary, ItemOutcome, crawl_products, run_product_crawl,
    run_product_crawl_with,
};
pub use error::CrawlError;
pub use extract::{TestType, extract_product, is_error_page, map_test_types, truncate_chars};
pub use listing::{
    Locator, dismiss_cookie_banner, enumerate_catalog, parse_listing_page, run_link_enumeration,
};
pub use session::{HttpSession, PageSession};
pub use storage::{CrawlPaths, StorageError};

use serde::{Deserialize, Serialize};

/// Sentinel used when a detail page has no top-level heading
pub const UNKNOWN_NAME: &str = "Unknown";

/// A product discovered on the catalog listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Absolute URL of the product detail page
    pub url: String,

    /// Whether the listing marks the product as supporting adaptive delivery
    #[serde(with = "yes_no", default)]
    pub adaptive_support: bool,
}

impl CatalogItem {
    pub fn new(url: impl Into<String>, adaptive_support: bool) -> Self {
        Self {
            url: url.into(),
            adaptive_support,
        }
    }
}

/// A fully extracted product detail page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Display title of the product
    pub name: String,

    /// URL of the detail page, identical to the source `CatalogItem`
    pub url: String,

    /// Product description, capped at the configured length
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,

    /// Assessment length in minutes
    #[serde(default)]
    pub duration: Option<u32>,

    /// Copied from the source `CatalogItem`
    #[serde(with = "yes_no", default)]
    pub adaptive_support: bool,

    /// Whether the product can be taken remotely
    #[serde(with = "yes_no", default)]
    pub remote_support: bool,

    /// Category labels in page order
    #[serde(default)]
    pub test_type: Vec<String>,

    /// Job levels section of the detail page
    #[serde(default)]
    pub job_levels: Option<String>,

    /// Languages section of the detail page
    #[serde(default)]
    pub languages: Option<String>,
}

impl ProductRecord {
    /// A record carrying only what the catalog listing knew about an item
    pub fn placeholder(item: &CatalogItem) -> Self {
        Self {
            name: UNKNOWN_NAME.to_string(),
            url: item.url.clone(),
            description: String::new(),
            duration: None,
            adaptive_support: item.adaptive_support,
            remote_support: false,
            test_type: Vec::new(),
            job_levels: None,
            languages: None,
        }
    }
}

/// One element of the crawl output file
///
/// Serialized untagged: extracted entries look like a `ProductRecord`,
/// failed entries are the unmodified `CatalogItem`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CrawlEntry {
    Product(ProductRecord),
    Unextracted(CatalogItem),
}

impl CrawlEntry {
    pub fn url(&self) -> &str {
        match self {
            CrawlEntry::Product(record) => &record.url,
            CrawlEntry::Unextracted(item) => &item.url,
        }
    }

    pub fn is_extracted(&self) -> bool {
        matches!(self, CrawlEntry::Product(_))
    }

    /// Convert to a record, filling unextracted entries with defaults
    pub fn into_record(self) -> ProductRecord {
        match self {
            CrawlEntry::Product(record) => record,
            CrawlEntry::Unextracted(item) => ProductRecord::placeholder(&item),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Serde adapter for the catalog's `"Yes"` / `"No"` flags
pub(crate) mod yes_no {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    pub fn serialize<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(as_str(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Flag::deserialize(deserializer)? {
            Flag::Bool(value) => value,
            Flag::Text(text) => {
                let text = text.trim();
                text.eq_ignore_ascii_case("yes") || text.eq_ignore_ascii_case("true")
            }
        })
    }

    pub fn as_str(value: bool) -> &'static str {
        if value { "Yes" } else { "No" }
    }
}

pub use yes_no::as_str as yes_no_str;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_item_serializes_yes_no() {
        let item = CatalogItem::new("https://example.com/view/a/", true);
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["url"], "https://example.com/view/a/");
        assert_eq!(json["adaptive_support"], "Yes");
    }

    #[test]
    fn test_flags_accept_strings_and_booleans() {
        let item: CatalogItem =
            serde_json::from_str(r#"{"url": "u", "adaptive_support": "no"}"#).unwrap();
        assert!(!item.adaptive_support);

        let item: CatalogItem =
            serde_json::from_str(r#"{"url": "u", "adaptive_support": true}"#).unwrap();
        assert!(item.adaptive_support);
    }

    #[test]
    fn test_product_record_field_layout() {
        let record = ProductRecord {
            name: "Java 8 (New)".to_string(),
            url: "https://example.com/view/java-8-new/".to_string(),
            description: "Multi-choice test".to_string(),
            duration: Some(18),
            adaptive_support: true,
            remote_support: true,
            test_type: vec!["Knowledge & Skills".to_string()],
            job_levels: Some("Mid-Professional".to_string()),
            languages: None,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["duration"], 18);
        assert_eq!(json["remote_support"], "Yes");
        assert_eq!(json["test_type"][0], "Knowledge & Skills");
        assert!(json["languages"].is_null());
    }

    #[test]
    fn test_null_description_loads_as_empty() {
        let json = r#"{
            "name": "X", "url": "u", "description": null, "duration": null,
            "adaptive_support": "No", "remote_support": "Yes", "test_type": []
        }"#;
        let record: ProductRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.description, "");
        assert!(record.remote_support);
        assert_eq!(record.duration, None);
    }

    #[test]
    fn test_crawl_entry_untagged_round_trip() {
        let entries = vec![
            CrawlEntry::Product(ProductRecord::placeholder(&CatalogItem::new("a", false))),
            CrawlEntry::Unextracted(CatalogItem::new("b", true)),
        ];

        let json = serde_json::to_string(&entries).unwrap();
        let back: Vec<CrawlEntry> = serde_json::from_str(&json).unwrap();

        assert_eq!(back, entries);
        assert!(back[0].is_extracted());
        assert!(!back[1].is_extracted());
        assert_eq!(back[1].url(), "b");
    }

    #[test]
    fn test_unextracted_into_record_keeps_flags() {
        let entry = CrawlEntry::Unextracted(CatalogItem::new("https://x/view/1/", true));
        let record = entry.into_record();

        assert_eq!(record.name, UNKNOWN_NAME);
        assert_eq!(record.url, "https://x/view/1/");
        assert!(record.adaptive_support);
        assert!(record.test_type.is_empty());
    }
}
