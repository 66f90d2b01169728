//! Catalog listing enumeration
//!
//! Walks the paginated listing endpoint and collects one `CatalogItem` per
//! detail-page link, reading the adaptive flag from the row the link sits in.

use std::fmt;
use std::path::Path;

use scraper::{ElementRef, Html, Selector};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::catalog::CatalogMap;
use super::config::CrawlerConfig;
use super::error::CrawlError;
use super::session::{HttpSession, PageSession};
use super::storage;
use super::CatalogItem;

/// How to find an element to interact with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// CSS selector
    Css(&'static str),

    /// Element of `tag` whose text contains `text`
    Text { tag: &'static str, text: &'static str },
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "css `{}`", selector),
            Locator::Text { tag, text } => write!(f, "<{}> containing '{}'", tag, text),
        }
    }
}

/// Banner buttons tried in order
const COOKIE_BANNER_BUTTONS: [Locator; 2] = [
    Locator::Css("#onetrust-accept-btn-handler"),
    Locator::Text {
        tag: "button",
        text: "Accept",
    },
];

/// Try to close the cookie consent banner
///
/// Returns whether a click went through. Sessions without interaction
/// support skip this entirely; a failed click leaves the page as it was.
pub async fn dismiss_cookie_banner<S: PageSession>(session: &mut S) -> bool {
    if !session.supports_interaction() {
        debug!("Session cannot interact, leaving cookie banner alone");
        return false;
    }

    for locator in COOKIE_BANNER_BUTTONS {
        match session.click(&locator).await {
            Ok(()) => {
                info!("Closed cookie banner via {}", locator);
                return true;
            }
            Err(e) => debug!("Cookie banner button {} not usable: {}", locator, e),
        }
    }

    info!("No cookie banner found or could not close it, continuing");
    false
}

/// Parse one listing page into catalog items, in document order
///
/// Only anchors whose `href` contains `link_pattern` are kept. Relative links
/// are resolved against `base`. A link is adaptive when the third cell of
/// its table row holds a `catalogue__circle` span marked `-yes`.
pub fn parse_listing_page(html: &str, base: &Url, link_pattern: &str) -> Vec<CatalogItem> {
    let document = Html::parse_document(html);
    let (Ok(anchors), Ok(cells), Ok(spans)) = (
        Selector::parse("a[href]"),
        Selector::parse("td"),
        Selector::parse("span[class]"),
    ) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !href.contains(link_pattern) {
            continue;
        }

        let url = match base.join(href) {
            Ok(url) => url.to_string(),
            Err(e) => {
                warn!("Skipping unparseable link '{}': {}", href, e);
                continue;
            }
        };

        let adaptive = enclosing_row(anchor)
            .and_then(|row| row.select(&cells).nth(2))
            .map(|cell| {
                cell.select(&spans).any(|span| {
                    let class = span.value().attr("class").unwrap_or_default();
                    class.contains("catalogue__circle") && class.contains("-yes")
                })
            })
            .unwrap_or(false);

        items.push(CatalogItem::new(url, adaptive));
    }
    items
}

fn enclosing_row(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "tr")
}

/// Enumerate the whole catalog by paging the listing endpoint
///
/// Paging stops at the first page that contributes no new URL. A navigation
/// failure ends paging early; everything found so far is still returned.
#[instrument(skip_all, fields(listing = %config.listing_url_template))]
pub async fn enumerate_catalog<S: PageSession>(
    session: &mut S,
    config: &CrawlerConfig,
) -> Result<CatalogMap, CrawlError> {
    let base = Url::parse(&config.base_url)?;
    let mut catalog = CatalogMap::new();

    info!("Loading catalog home page {}", config.catalog_url);
    match session.navigate(&config.catalog_url).await {
        Ok(()) => {
            sleep(config.landing_settle()).await;
            dismiss_cookie_banner(session).await;
        }
        Err(e) => warn!("Could not load catalog home page: {}", e),
    }

    let mut start = 0;
    loop {
        let url = config.listing_url(start);
        info!("Navigating to listing page {}", url);

        if let Err(e) = session.navigate(&url).await {
            error!("Stopping enumeration at offset {}: {}", start, e);
            break;
        }

        match session
            .wait_for(&config.listing_ready_selector, config.listing_wait())
            .await
        {
            Ok(true) => debug!("Listing page loaded"),
            Ok(false) => warn!("Timeout waiting for content at offset {}, page might be empty or blocked", start),
            Err(e) => warn!("Could not wait for listing content: {}", e),
        }

        let page = parse_listing_page(session.html(), &base, &config.detail_link_pattern);
        let added = catalog.merge(page);
        info!("Found {} new products at offset {}", added, start);

        if added == 0 {
            info!(
                "Stopping pagination at offset {}. Total found: {}",
                start,
                catalog.len()
            );
            break;
        }

        start += config.page_size;
        sleep(config.page_delay()).await;
    }

    Ok(catalog)
}

/// Enumerate the catalog over HTTP and write the links file
///
/// The session is closed whether or not enumeration succeeded.
pub async fn run_link_enumeration(
    config: &CrawlerConfig,
    links_path: &Path,
) -> Result<Vec<CatalogItem>, CrawlError> {
    let mut session = HttpSession::new(config)?;
    let result = enumerate_catalog(&mut session, config).await;

    debug!("Closing session");
    if let Err(e) = session.close().await {
        warn!("Failed to close session: {}", e);
    }

    let items = result?.into_items();
    info!("Saving {} products to {}", items.len(), links_path.display());
    storage::save_links(links_path, &items).await?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::session::scripted::{ScriptedPage, ScriptedSession};

    fn row(href: &str, adaptive_class: &str) -> String {
        format!(
            r#"<tr>
                <td class="custom__table-heading__title"><a href="{href}">Item</a></td>
                <td class="custom__table-heading__general"><span class="catalogue__circle -yes"></span></td>
                <td class="custom__table-heading__general"><span class="{adaptive_class}"></span></td>
                <td class="custom__table-heading__general product-catalogue__keys">
                    <span class="product-catalogue__key">K</span>
                </td>
            </tr>"#
        )
    }

    fn listing(rows: &[String]) -> String {
        format!(
            "<html><body><table><tbody>{}</tbody></table></body></html>",
            rows.join("\n")
        )
    }

    fn base() -> Url {
        Url::parse("https://www.shl.com").unwrap()
    }

    #[test]
    fn test_parse_listing_page_reads_adaptive_column() {
        let html = listing(&[
            row("/products/product-catalog/view/java-8-new/", "catalogue__circle -yes"),
            row("/products/product-catalog/view/net-framework-4-5/", "catalogue__circle"),
            row("https://www.shl.com/products/product-catalog/view/sql/", "catalogue__circle -no"),
        ]);

        let items = parse_listing_page(&html, &base(), "product-catalog/view/");

        assert_eq!(items.len(), 3);
        assert_eq!(
            items[0],
            CatalogItem::new(
                "https://www.shl.com/products/product-catalog/view/java-8-new/",
                true
            )
        );
        assert!(!items[1].adaptive_support);
        assert!(!items[2].adaptive_support);
        assert_eq!(
            items[2].url,
            "https://www.shl.com/products/product-catalog/view/sql/"
        );
    }

    #[test]
    fn test_parse_listing_page_ignores_other_links() {
        let html = r#"<html><body>
            <a href="/products/product-catalog/">Catalog</a>
            <a href="/solutions/products/">Solutions</a>
            <div><a href="/products/product-catalog/view/outside-table/">Loose</a></div>
        </body></html>"#;

        let items = parse_listing_page(html, &base(), "product-catalog/view/");

        assert_eq!(items.len(), 1);
        assert!(items[0].url.ends_with("/view/outside-table/"));
        assert!(!items[0].adaptive_support);
    }

    #[test]
    fn test_short_rows_are_not_adaptive() {
        let html = r#"<table><tr>
            <td><a href="/products/product-catalog/view/x/">X</a></td>
            <td><span class="catalogue__circle -yes"></span></td>
        </tr></table>"#;

        let items = parse_listing_page(html, &base(), "product-catalog/view/");
        assert_eq!(items.len(), 1);
        assert!(!items[0].adaptive_support);
    }

    fn config() -> CrawlerConfig {
        CrawlerConfig::builder()
            .site("https://www.shl.com")
            .page_size(2)
            .no_delays()
            .build()
    }

    #[tokio::test]
    async fn test_enumeration_stops_on_page_without_new_urls() {
        let config = config();
        let page_a = listing(&[
            row("/products/product-catalog/view/a/", "catalogue__circle -yes"),
            row("/products/product-catalog/view/b/", "catalogue__circle"),
        ]);
        let page_b = listing(&[
            row("/products/product-catalog/view/c/", "catalogue__circle"),
            row("/products/product-catalog/view/a/", "catalogue__circle"),
        ]);

        let mut session = ScriptedSession::new()
            .with_page(&config.listing_url(0), ScriptedPage::page("Catalog", &page_a))
            .with_page(&config.listing_url(2), ScriptedPage::page("Catalog", &page_b))
            .with_page(&config.listing_url(4), ScriptedPage::page("Catalog", &page_a));

        let catalog = enumerate_catalog(&mut session, &config).await.unwrap();

        let items = catalog.into_items();
        assert_eq!(items.len(), 3);
        assert!(items[0].adaptive_support);
        assert!(items[2].url.ends_with("/view/c/"));
        assert_eq!(session.navigations_to(&config.listing_url(4)), 1);
        assert_eq!(session.navigations_to(&config.listing_url(6)), 0);
    }

    #[tokio::test]
    async fn test_navigation_error_keeps_partial_catalog() {
        let config = config();
        let page_a = listing(&[row("/products/product-catalog/view/a/", "catalogue__circle")]);

        let mut session = ScriptedSession::new()
            .with_page(&config.listing_url(0), ScriptedPage::page("Catalog", &page_a))
            .with_page(&config.listing_url(2), ScriptedPage::Fail("net::ERR".to_string()));

        let catalog = enumerate_catalog(&mut session, &config).await.unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[tokio::test]
    async fn test_cookie_banner_skipped_without_interaction() {
        let mut session = ScriptedSession::new();
        assert!(!dismiss_cookie_banner(&mut session).await);
        assert!(session.clicks.is_empty());
    }

    #[tokio::test]
    async fn test_cookie_banner_falls_back_to_text_button() {
        let mut session = ScriptedSession::new()
            .with_page("home", ScriptedPage::page("Home", "<button>Accept all</button>"));
        session.interactive = true;
        session.navigate("home").await.unwrap();

        assert!(dismiss_cookie_banner(&mut session).await);
        assert_eq!(session.clicks.len(), 2);

        let mut session = ScriptedSession::new()
            .with_page("home", ScriptedPage::page("Home", "<p>No banner</p>"));
        session.interactive = true;
        session.navigate("home").await.unwrap();
        assert!(!dismiss_cookie_banner(&mut session).await);
        assert_eq!(session.clicks.len(), 2);

        let mut session = ScriptedSession::new().with_page(
            "home",
            ScriptedPage::page("Home", r#"<button id="onetrust-accept-btn-handler">OK</button>"#),
        );
        session.interactive = true;
        session.navigate("home").await.unwrap();
        assert!(dismiss_cookie_banner(&mut session).await);
        assert_eq!(session.clicks.len(), 1);
    }
}
