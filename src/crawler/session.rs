//! Page-fetching session used by the enumerator and the crawl driver
//!
//! A crawl acquires exactly one session and closes it when done, whatever the
//! outcome. The session exposes the rendered page as HTML plus its title; the
//! crawler never talks to the network directly.

use std::time::Duration;

use scraper::{Html, Selector};
use tokio::time::{Instant, sleep};
use tracing::{debug, instrument, warn};

use super::config::CrawlerConfig;
use super::error::CrawlError;
use super::listing::Locator;

/// A single browsing session
#[allow(async_fn_in_trait)]
pub trait PageSession {
    /// Load `url` and make it the current page
    async fn navigate(&mut self, url: &str) -> Result<(), CrawlError>;

    /// Title of the current page, empty before the first navigation
    fn title(&self) -> &str;

    /// Markup of the current page
    fn html(&self) -> &str;

    /// Wait up to `timeout` for an element matching `selector` to appear.
    /// Returns `false` when the wait timed out.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, CrawlError>;

    /// Whether `click` can do anything in this session
    fn supports_interaction(&self) -> bool {
        false
    }

    /// Click the element identified by `locator`
    async fn click(&mut self, locator: &Locator) -> Result<(), CrawlError> {
        Err(CrawlError::Unsupported(format!("click on {}", locator)))
    }

    /// Release the session
    async fn close(&mut self) -> Result<(), CrawlError>;
}

/// Check whether `html` contains an element matching the CSS `selector`
pub fn document_matches(html: &str, selector: &str) -> Result<bool, CrawlError> {
    let selector = Selector::parse(selector)
        .map_err(|e| CrawlError::HtmlParse(format!("Invalid selector '{}': {}", selector, e)))?;
    let document = Html::parse_document(html);
    Ok(document.select(&selector).next().is_some())
}

/// Text of the document's `<title>` element
pub fn document_title(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Session backed by plain HTTP requests
///
/// Pages are taken as served; there is no script execution, so `wait_for`
/// re-fetches the current page until the selector shows up or the wait
/// expires. Error statuses are kept as pages so gateway error pages reach
/// the caller's error-page detection.
pub struct HttpSession {
    client: reqwest::Client,
    current_url: Option<String>,
    title: String,
    html: String,
    poll_interval: Duration,
}

impl HttpSession {
    /// Open a session using the config's user agent and timeout
    pub fn new(config: &CrawlerConfig) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            current_url: None,
            title: String::new(),
            html: String::new(),
            poll_interval: Duration::from_millis(500),
        })
    }

    /// Set how often `wait_for` re-fetches the current page
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }
}

impl PageSession for HttpSession {
    #[instrument(skip(self))]
    async fn navigate(&mut self, url: &str) -> Result<(), CrawlError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CrawlError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} answered with status {}", url, status);
        }

        self.html = response.text().await?;
        self.title = document_title(&self.html);
        self.current_url = Some(url.to_string());
        debug!("Loaded {} ({} bytes)", url, self.html.len());
        Ok(())
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn html(&self) -> &str {
        &self.html
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, CrawlError> {
        let deadline = Instant::now() + timeout;
        loop {
            if document_matches(&self.html, selector)? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            let Some(url) = self.current_url.clone() else {
                return Ok(false);
            };
            sleep(self.poll_interval.min(deadline - now)).await;
            self.navigate(&url).await?;
        }
    }

    async fn close(&mut self) -> Result<(), CrawlError> {
        self.current_url = None;
        self.title.clear();
        self.html.clear();
        debug!("HTTP session closed");
        Ok(())
    }
}
