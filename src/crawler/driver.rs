//! Product crawl driver
//!
//! Visits every catalog item once through a single session, retrying error
//! pages and fetch failures, checkpointing periodically, and always emitting
//! exactly one entry per item.

use std::path::{Path, PathBuf};

use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use super::config::CrawlerConfig;
use super::error::CrawlError;
use super::extract::{extract_product, is_error_page};
use super::session::{HttpSession, PageSession};
use super::storage::{self, CrawlPaths, StorageError};
use super::{CatalogItem, CrawlEntry, ProductRecord};

/// Final state of one catalog item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A record was extracted on attempt number `attempts`
    Succeeded { attempts: u32 },

    /// Every attempt hit an error page or a fetch failure
    Failed { attempts: u32 },
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Succeeded { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ItemOutcome::Succeeded { attempts } | ItemOutcome::Failed { attempts } => *attempts,
        }
    }
}

/// Counts reported at the end of a crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl CrawlSummary {
    fn record(&mut self, outcome: &ItemOutcome) {
        self.total += 1;
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Entries of a finished crawl with their summary
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub entries: Vec<CrawlEntry>,
    pub summary: CrawlSummary,
}

/// Drives one session over the catalog, owning the result accumulator
pub struct CrawlDriver<'s, S: PageSession> {
    session: &'s mut S,
    config: CrawlerConfig,
    checkpoint_path: PathBuf,
    entries: Vec<CrawlEntry>,
    summary: CrawlSummary,
}

impl<'s, S: PageSession> CrawlDriver<'s, S> {
    pub fn new(session: &'s mut S, config: CrawlerConfig, checkpoint_path: impl Into<PathBuf>) -> Self {
        Self {
            session,
            config,
            checkpoint_path: checkpoint_path.into(),
            entries: Vec::new(),
            summary: CrawlSummary::default(),
        }
    }

    /// Process the item at zero-based position `index`
    ///
    /// Writes a checkpoint of everything accumulated so far first when
    /// `index` is a positive multiple of the checkpoint interval.
    #[instrument(skip(self, item), fields(url = %item.url))]
    pub async fn process_item(&mut self, index: usize, item: &CatalogItem) -> ItemOutcome {
        let interval = self.config.checkpoint_interval;
        if index > 0 && interval > 0 && index % interval == 0 {
            self.checkpoint(index).await;
        }

        let outcome = match self.fetch_with_retry(item).await {
            (Some(record), attempts) => {
                self.entries.push(CrawlEntry::Product(record));
                ItemOutcome::Succeeded { attempts }
            }
            (None, attempts) => {
                error!(
                    "Failed all {} attempts on {}, keeping the catalog entry",
                    attempts, item.url
                );
                self.entries.push(CrawlEntry::Unextracted(item.clone()));
                ItemOutcome::Failed { attempts }
            }
        };

        self.summary.record(&outcome);
        outcome
    }

    /// Fetch and extract one item, returning the record (if any) and the attempts spent
    async fn fetch_with_retry(&mut self, item: &CatalogItem) -> (Option<ProductRecord>, u32) {
        let max_attempts = self.config.max_attempts;

        for attempt in 0..max_attempts {
            match self.attempt(item, attempt).await {
                Ok(Some(record)) => return (Some(record), attempt + 1),
                Ok(None) => warn!(
                    attempt = attempt + 1,
                    "Detected error page ({}), retrying",
                    self.session.title()
                ),
                Err(e) => {
                    warn!(attempt = attempt + 1, "Fetch failed: {}", e);
                    sleep(self.config.failure_delay()).await;
                }
            }
        }

        (None, max_attempts)
    }

    /// One navigation; `Ok(None)` when the page is an error page
    async fn attempt(&mut self, item: &CatalogItem, attempt: u32) -> Result<Option<ProductRecord>, CrawlError> {
        self.session.navigate(&item.url).await?;
        sleep(self.config.settle_delay(attempt)).await;

        if is_error_page(self.session.title(), self.session.html()) {
            return Ok(None);
        }

        Ok(Some(extract_product(
            self.session.html(),
            item,
            self.config.description_max_chars,
        )))
    }

    async fn checkpoint(&self, index: usize) {
        info!("Saving checkpoint at {}", index);
        if let Err(e) = storage::save_entries(&self.checkpoint_path, &self.entries).await {
            warn!(
                "Could not write checkpoint {}: {}",
                self.checkpoint_path.display(),
                e
            );
        }
    }

    pub fn entries(&self) -> &[CrawlEntry] {
        &self.entries
    }

    pub fn summary(&self) -> CrawlSummary {
        self.summary
    }

    pub fn into_report(self) -> CrawlReport {
        CrawlReport {
            entries: self.entries,
            summary: self.summary,
        }
    }
}

/// Visit every item in order through `session`
///
/// `on_progress` is called after each item with its index and outcome.
pub async fn crawl_products<S, F>(
    session: &mut S,
    items: &[CatalogItem],
    config: &CrawlerConfig,
    checkpoint_path: &Path,
    mut on_progress: F,
) -> CrawlReport
where
    S: PageSession,
    F: FnMut(usize, &CatalogItem, &ItemOutcome),
{
    info!("Starting detailed scrape of {} products", items.len());
    let mut driver = CrawlDriver::new(session, config.clone(), checkpoint_path);

    for (index, item) in items.iter().enumerate() {
        debug!("[{}/{}] Visiting {}", index + 1, items.len(), item.url);
        let outcome = driver.process_item(index, item).await;
        on_progress(index, item, &outcome);
    }

    driver.into_report()
}

/// Crawl `items` through an already open session, close it and write the output file
pub async fn run_product_crawl_with<S, F>(
    session: &mut S,
    items: &[CatalogItem],
    config: &CrawlerConfig,
    paths: &CrawlPaths,
    on_progress: F,
) -> Result<CrawlReport, CrawlError>
where
    S: PageSession,
    F: FnMut(usize, &CatalogItem, &ItemOutcome),
{
    let report = crawl_products(session, items, config, &paths.checkpoint, on_progress).await;

    debug!("Closing session");
    if let Err(e) = session.close().await {
        warn!("Failed to close session: {}", e);
    }

    info!(
        "Finished! Saving {} products to {}",
        report.entries.len(),
        paths.output.display()
    );
    storage::save_entries(&paths.output, &report.entries).await?;
    Ok(report)
}

/// Load the links file, crawl every product over HTTP and write the output file
///
/// A missing links file is reported before any session is opened.
pub async fn run_product_crawl<F>(
    config: &CrawlerConfig,
    paths: &CrawlPaths,
    on_progress: F,
) -> Result<CrawlReport, CrawlError>
where
    F: FnMut(usize, &CatalogItem, &ItemOutcome),
{
    let items = match storage::load_links(&paths.links).await {
        Ok(items) => items,
        Err(StorageError::NotFound(path)) => return Err(CrawlError::MissingInput(path)),
        Err(e) => return Err(e.into()),
    };

    let mut session = HttpSession::new(config)?;
    run_product_crawl_with(&mut session, &items, config, paths, on_progress).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::session::scripted::{ScriptedPage, ScriptedSession};
    use tempfile::tempdir;

    const PRODUCT_PAGE: &str = r#"<html><head><title>Product | SHL</title></head><body>
        <h1>Verify Numerical Ability</h1>
        <div><h4>Description</h4><p>Numerical reasoning.</p></div>
        <p>Test Type: <span class="product-catalogue__key">A</span></p>
    </body></html>"#;

    fn config() -> CrawlerConfig {
        CrawlerConfig::builder().no_delays().build()
    }

    fn items(n: usize) -> Vec<CatalogItem> {
        (0..n)
            .map(|i| CatalogItem::new(format!("https://x/view/{}/", i), i % 2 == 0))
            .collect()
    }

    #[tokio::test]
    async fn test_error_page_retried_up_to_max_attempts() {
        let item = CatalogItem::new("https://x/view/broken/", true);
        let mut session = ScriptedSession::new().with_page(
            &item.url,
            ScriptedPage::page("504 Gateway Time-out", "<h1>504 Gateway Time-out</h1>"),
        );
        let dir = tempdir().unwrap();

        let mut driver = CrawlDriver::new(&mut session, config(), dir.path().join("cp.json"));
        let outcome = driver.process_item(0, &item).await;
        let report = driver.into_report();

        assert_eq!(outcome, ItemOutcome::Failed { attempts: 10 });
        assert_eq!(report.entries, vec![CrawlEntry::Unextracted(item.clone())]);
        assert_eq!(session.navigations_to(&item.url), 10);
    }

    #[tokio::test]
    async fn test_navigation_failures_then_success() {
        let item = CatalogItem::new("https://x/view/flaky/", false);
        let mut session = ScriptedSession::new()
            .with_page(&item.url, ScriptedPage::Fail("timeout".to_string()))
            .with_page(&item.url, ScriptedPage::page("Bad Gateway", "<h1>502 Bad Gateway</h1>"))
            .with_page(&item.url, ScriptedPage::page("Product | SHL", PRODUCT_PAGE));
        let dir = tempdir().unwrap();

        let mut driver = CrawlDriver::new(&mut session, config(), dir.path().join("cp.json"));
        let outcome = driver.process_item(0, &item).await;

        assert_eq!(outcome, ItemOutcome::Succeeded { attempts: 3 });
        match &driver.entries()[0] {
            CrawlEntry::Product(record) => {
                assert_eq!(record.name, "Verify Numerical Ability");
                assert_eq!(record.url, item.url);
                assert_eq!(record.test_type, vec!["Ability & Aptitude"]);
            }
            other => panic!("Expected an extracted product, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_every_item_yields_one_entry() {
        let items = items(7);
        let broken = items[3].url.clone();
        let mut session = ScriptedSession::new()
            .with_page(&broken, ScriptedPage::page("Error", "<h1>Error</h1>"));
        let dir = tempdir().unwrap();
        let config = CrawlerConfig::builder().no_delays().max_attempts(2).build();

        let mut seen = Vec::new();
        let report = crawl_products(
            &mut session,
            &items,
            &config,
            &dir.path().join("cp.json"),
            |index, _, outcome| seen.push((index, outcome.is_success())),
        )
        .await;

        assert_eq!(report.entries.len(), items.len());
        let urls: Vec<&str> = report.entries.iter().map(CrawlEntry::url).collect();
        let expected: Vec<&str> = items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, expected);
        assert_eq!(
            report.summary,
            CrawlSummary {
                total: 7,
                succeeded: 6,
                failed: 1
            }
        );
        assert_eq!(seen.len(), 7);
        assert_eq!(seen[3], (3, false));
        assert!(!report.entries[3].is_extracted());
    }

    #[tokio::test]
    async fn test_checkpoint_survives_crash() {
        let items = items(120);
        let mut session = ScriptedSession::new();
        let dir = tempdir().unwrap();
        let checkpoint = dir.path().join("checkpoint.json");

        {
            let mut driver = CrawlDriver::new(&mut session, config(), &checkpoint);
            for (index, item) in items.iter().enumerate().take(75) {
                driver.process_item(index, item).await;
            }
            // dropped without final persistence
        }

        let saved = storage::load_entries(&checkpoint).await.unwrap();
        assert_eq!(saved.len(), 50);
        assert_eq!(saved[0].url(), items[0].url);
        assert_eq!(saved[49].url(), items[49].url);
    }

    #[tokio::test]
    async fn test_run_closes_session_and_writes_output() {
        let items = items(3);
        let mut session = ScriptedSession::new();
        let dir = tempdir().unwrap();
        let paths = CrawlPaths::in_dir(dir.path());

        let report = run_product_crawl_with(&mut session, &items, &config(), &paths, |_, _, _| {})
            .await
            .unwrap();

        assert!(session.closed);
        assert_eq!(report.summary.total, 3);
        let written = storage::load_entries(&paths.output).await.unwrap();
        assert_eq!(written, report.entries);
        assert!(!paths.checkpoint.exists());
    }

    #[tokio::test]
    async fn test_missing_links_file() {
        let dir = tempdir().unwrap();
        let paths = CrawlPaths::in_dir(dir.path());

        let result = run_product_crawl(&config(), &paths, |_, _, _| {}).await;

        match result {
            Err(CrawlError::MissingInput(path)) => assert_eq!(path, paths.links),
            other => panic!("Expected MissingInput, got {:?}", other.map(|r| r.summary)),
        }
        assert!(!paths.output.exists());
    }
}
