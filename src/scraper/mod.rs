pub mod cleaner;
pub mod http_client;
pub mod parsers;

use crate::config::ScraperConfig;
use crate::models::ScrapedItem;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use self::cleaner::site_origin;
use self::http_client::NetworkError;
use self::parsers::{ListingParser, dedup_by_url};

// ── Source trait ──────────────────────────────────────────────────────────────

/// Anything that can hand back the HTML of a listing page.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String, NetworkError>;
}

// ── Paginated listing scraper ─────────────────────────────────────────────────

pub struct CatalogScraper {
    source: Arc<dyn PageSource>,
    parser: ListingParser,
    base_url: String,
    pages: u32,
    page_delay: Duration,
}

impl CatalogScraper {
    pub fn new(config: &ScraperConfig, source: Arc<dyn PageSource>) -> Result<Self> {
        let base = Url::parse(&config.source_url)
            .with_context(|| format!("Invalid source URL {}", config.source_url))?;

        Ok(Self {
            source,
            parser: ListingParser::new(site_origin(&base))?,
            base_url: config.source_url.clone(),
            pages: config.pages,
            page_delay: Duration::from_millis(config.page_delay_ms),
        })
    }

    pub fn page_urls(&self) -> Vec<String> {
        listing_urls(&self.base_url, self.pages)
    }

    /// Fetch every listing page in order and return the unique items.
    ///
    /// The first page is mandatory; a failure on any later page only drops
    /// that page's items.
    pub async fn scrape_all(&self) -> Result<Vec<ScrapedItem>> {
        let urls = self.page_urls();
        let mut all_items = Vec::new();

        for (idx, url) in urls.iter().enumerate() {
            let page = idx + 1;
            info!("Fetching page {} ({})", page, url);

            match self.source.fetch_page(url).await {
                Ok(html) => {
                    let items = self.parser.parse(&html);
                    info!("  Page {}: {} items", page, items.len());
                    all_items.extend(items);
                }
                Err(e) if page == 1 => {
                    return Err(e).with_context(|| format!("Failed to fetch first page {}", url));
                }
                Err(e) => warn!("Skipping page {}: {:#}", page, anyhow::Error::new(e)),
            }

            if page < urls.len() && !self.page_delay.is_zero() {
                debug!("Sleeping {:?} before next page", self.page_delay);
                sleep(self.page_delay).await;
            }
        }

        let unique = dedup_by_url(all_items);
        info!("Total unique items: {}", unique.len());
        Ok(unique)
    }
}

/// Base URL followed by `page=N` variants for N in 2..=pages.
pub fn listing_urls(base_url: &str, pages: u32) -> Vec<String> {
    let sep = if base_url.contains('?') { '&' } else { '?' };
    std::iter::once(base_url.to_string())
        .chain((2..=pages).map(|p| format!("{}{}page={}", base_url, sep, p)))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned HTML per URL; unknown URLs fail with HTTP 404.
    pub(crate) struct FixturePages {
        pages: HashMap<String, String>,
        pub(crate) requested: Mutex<Vec<String>>,
    }

    impl FixturePages {
        pub(crate) fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(u, h)| (u.to_string(), h.to_string()))
                    .collect(),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageSource for FixturePages {
        async fn fetch_page(&self, url: &str) -> Result<String, NetworkError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned().ok_or_else(|| NetworkError::Status {
                url: url.to_string(),
                status: reqwest::StatusCode::NOT_FOUND,
            })
        }
    }

    pub(crate) fn test_config(source_url: &str, pages: u32) -> ScraperConfig {
        ScraperConfig {
            source_url: source_url.to_string(),
            pages,
            page_delay_ms: 0,
            ..ScraperConfig::default()
        }
    }

    const BASE: &str = "https://www.made-in-china.com/productdirectory.do?word=M3+lip";

    #[test]
    fn test_listing_urls() {
        assert_eq!(listing_urls(BASE, 1), vec![BASE.to_string()]);
        assert_eq!(listing_urls(BASE, 0), vec![BASE.to_string()]);
        assert_eq!(
            listing_urls("https://example.com/list", 3),
            vec![
                "https://example.com/list".to_string(),
                "https://example.com/list?page=2".to_string(),
                "https://example.com/list?page=3".to_string(),
            ]
        );
        assert_eq!(listing_urls(BASE, 2)[1], format!("{}&page=2", BASE));
    }

    #[tokio::test]
    async fn test_scrape_all_dedups_across_pages() {
        let page1 = r#"<div class="product-item"><a href="/p/a.html">A</a></div>
                       <div class="product-item"><a href="/p/b.html">B</a></div>"#;
        let page2 = r#"<div class="product-item"><a href="/p/b.html">B again</a></div>"#;
        let page2_url = format!("{}&page=2", BASE);
        let source = Arc::new(FixturePages::new(&[(BASE, page1), (page2_url.as_str(), page2)]));

        let scraper = CatalogScraper::new(&test_config(BASE, 2), source.clone()).unwrap();
        let items = scraper.scrape_all().await.unwrap();

        assert_eq!(source.requested.lock().unwrap().len(), 2);
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B again"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_between_pages_not_after_last() {
        let html = r#"<div class="product-item"><a href="/p/a.html">A</a></div>"#;
        let page2 = format!("{}&page=2", BASE);
        let page3 = format!("{}&page=3", BASE);
        let source = Arc::new(FixturePages::new(&[
            (BASE, html),
            (page2.as_str(), html),
            (page3.as_str(), html),
        ]));
        let config = ScraperConfig {
            source_url: BASE.to_string(),
            pages: 3,
            ..ScraperConfig::default()
        };
        assert_eq!(config.page_delay_ms, 1000);

        let scraper = CatalogScraper::new(&config, source.clone()).unwrap();
        let started = tokio::time::Instant::now();
        scraper.scrape_all().await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert_eq!(source.requested.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_first_page_failure_is_fatal() {
        let source = Arc::new(FixturePages::new(&[]));
        let scraper = CatalogScraper::new(&test_config(BASE, 1), source).unwrap();
        tokio_test::assert_err!(scraper.scrape_all().await);
    }

    #[tokio::test]
    async fn test_later_page_failure_is_skipped() {
        let page1 = r#"<li class="pro-item"><a href="/p/a.html">A</a></li>"#;
        let page3_url = format!("{}&page=3", BASE);
        let page3 = r#"<li class="pro-item"><a href="/p/c.html">C</a></li>"#;
        let source = Arc::new(FixturePages::new(&[(BASE, page1), (page3_url.as_str(), page3)]));

        let scraper = CatalogScraper::new(&test_config(BASE, 3), source).unwrap();
        let items = scraper.scrape_all().await.unwrap();
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C"]);
    }
}
