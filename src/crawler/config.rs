//! # Crawler Configuration Module
//!
//! Endpoints, politeness delays, retry policy and checkpoint settings for the
//! catalog crawler. Uses a builder pattern for flexible configuration.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: The main configuration struct with crawler parameters
//! - `CrawlerConfigBuilder`: Builder pattern implementation for easier configuration
//!
//! Defaults target the public SHL product catalog and reproduce the pacing of
//! a careful interactive crawl: a settle delay after every navigation that
//! grows with the attempt number, a fixed pause after fetch exceptions, and a
//! checkpoint every fifty products.

use std::time::Duration;

/// Desktop browser user agent sent with every request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration for the crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Site root used to resolve relative links
    pub base_url: String,

    /// Catalog landing page, loaded once to settle cookies
    pub catalog_url: String,

    /// Listing endpoint with a `{start}` placeholder for the offset
    pub listing_url_template: String,

    /// Number of products per listing page
    pub page_size: usize,

    /// Substring identifying detail-page links
    pub detail_link_pattern: String,

    /// CSS selector awaited before a listing page is parsed
    pub listing_ready_selector: String,

    /// Bounded wait for the listing selector in milliseconds
    pub listing_wait_ms: u64,

    /// Pause after loading the landing page in milliseconds
    pub landing_settle_ms: u64,

    /// Pause between listing pages in milliseconds
    pub page_delay_ms: u64,

    /// Base settle delay after navigating to a detail page in milliseconds
    pub settle_base_ms: u64,

    /// Extra settle delay per previous attempt in milliseconds
    pub settle_step_ms: u64,

    /// Pause after a fetch or parse failure in milliseconds
    pub failure_delay_ms: u64,

    /// Maximum fetch attempts per detail page
    pub max_attempts: u32,

    /// Number of processed items between checkpoints
    pub checkpoint_interval: usize,

    /// Hard cap on stored description length, in characters
    pub description_max_chars: usize,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// User agent to use for requests
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.shl.com".to_string(),
            catalog_url: "https://www.shl.com/products/product-catalog/".to_string(),
            listing_url_template: "https://www.shl.com/products/product-catalog/?start={start}&type=1"
                .to_string(),
            page_size: 12,
            detail_link_pattern: "product-catalog/view/".to_string(),
            listing_ready_selector: "a[href*='/view/']".to_string(),
            listing_wait_ms: 15_000,
            landing_settle_ms: 5_000,
            page_delay_ms: 1_000,
            settle_base_ms: 1_500,
            settle_step_ms: 2_000,
            failure_delay_ms: 2_000,
            max_attempts: 10,
            checkpoint_interval: 50,
            description_max_chars: 1_000,
            request_timeout_ms: 60_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Builder for CrawlerConfig
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    /// Set the site root and derive the catalog and listing endpoints from it
    pub fn site(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        self.config.catalog_url = format!("{}/products/product-catalog/", base_url);
        self.config.listing_url_template =
            format!("{}/products/product-catalog/?start={{start}}&type=1", base_url);
        self.config.base_url = base_url;
        self
    }

    /// Set the listing endpoint template
    pub fn listing_url_template(mut self, template: impl Into<String>) -> Self {
        self.config.listing_url_template = template.into();
        self
    }

    /// Set the number of products per listing page
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    /// Set the maximum fetch attempts per detail page
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    /// Set the number of processed items between checkpoints
    pub fn checkpoint_interval(mut self, checkpoint_interval: usize) -> Self {
        self.config.checkpoint_interval = checkpoint_interval;
        self
    }

    /// Set the description length cap
    pub fn description_max_chars(mut self, description_max_chars: usize) -> Self {
        self.config.description_max_chars = description_max_chars;
        self
    }

    /// Set the bounded wait for listing content
    pub fn listing_wait_ms(mut self, listing_wait_ms: u64) -> Self {
        self.config.listing_wait_ms = listing_wait_ms;
        self
    }

    /// Set the detail-page settle delay as `base + attempt * step`
    pub fn settle_delay_ms(mut self, base_ms: u64, step_ms: u64) -> Self {
        self.config.settle_base_ms = base_ms;
        self.config.settle_step_ms = step_ms;
        self
    }

    /// Set the pause after a failed fetch
    pub fn failure_delay_ms(mut self, failure_delay_ms: u64) -> Self {
        self.config.failure_delay_ms = failure_delay_ms;
        self
    }

    /// Set the pause between listing pages
    pub fn page_delay_ms(mut self, page_delay_ms: u64) -> Self {
        self.config.page_delay_ms = page_delay_ms;
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout_ms(mut self, request_timeout_ms: u64) -> Self {
        self.config.request_timeout_ms = request_timeout_ms;
        self
    }

    /// Disable every deliberate pause, for local mirrors and tests
    pub fn no_delays(mut self) -> Self {
        self.config.listing_wait_ms = 0;
        self.config.landing_settle_ms = 0;
        self.config.page_delay_ms = 0;
        self.config.settle_base_ms = 0;
        self.config.settle_step_ms = 0;
        self.config.failure_delay_ms = 0;
        self
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> CrawlerConfig {
        self.config
    }
}

impl CrawlerConfig {
    /// Create a new builder
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }

    /// Listing page URL for the given offset
    pub fn listing_url(&self, start: usize) -> String {
        self.listing_url_template
            .replace("{start}", &start.to_string())
    }

    /// Settle delay before inspecting a detail page on the given zero-based attempt
    pub fn settle_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(
            self.settle_base_ms
                .saturating_add(self.settle_step_ms.saturating_mul(u64::from(attempt))),
        )
    }

    pub fn failure_delay(&self) -> Duration {
        Duration::from_millis(self.failure_delay_ms)
    }

    pub fn listing_wait(&self) -> Duration {
        Duration::from_millis(self.listing_wait_ms)
    }

    pub fn landing_settle(&self) -> Duration {
        Duration::from_millis(self.landing_settle_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
