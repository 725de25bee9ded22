use crate::models::ScrapedItem;
use anyhow::Result;
use indexmap::IndexMap;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::cleaner::{moq_snippet, price_snippet, resolve_url};

// ── Listing page ──────────────────────────────────────────────────────────────

/// Card containers, most specific first. Only the first selector with any
/// match is used for a page.
pub const CONTAINER_SELECTORS: &[&str] = &[
    "div.product-item",
    "div.list-item",
    "div.list-product",
    "div.pro-item",
    "li.product",
    "li.pro-item",
    "div[data-s-virtual]",
];

const IMAGE_ATTRS: &[&str] = &["data-src", "data-original", "src"];

pub struct ListingParser {
    origin: Url,
    containers: Vec<(&'static str, Selector)>,
    link: Selector,
    image: Selector,
    supplier: Selector,
}

impl ListingParser {
    pub fn new(origin: Url) -> Result<Self> {
        let containers = CONTAINER_SELECTORS
            .iter()
            .map(|s| Ok((*s, parse_selector(s)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            origin,
            containers,
            link: parse_selector("a[href]")?,
            image: parse_selector("img")?,
            supplier: parse_selector(r#"a[href*="company"], a[href*="supplier"]"#)?,
        })
    }

    fn find_container(&self, doc: &Html) -> Option<&(&'static str, Selector)> {
        self.containers
            .iter()
            .find(|(_, sel)| doc.select(sel).next().is_some())
    }

    /// Extract product cards from one listing page, deduplicated by product URL.
    pub fn parse(&self, html: &str) -> Vec<ScrapedItem> {
        let doc = Html::parse_document(html);

        let Some((name, container)) = self.find_container(&doc) else {
            debug!("No card container matched");
            return Vec::new();
        };
        debug!("Card container: {}", name);

        let items = doc.select(container).filter_map(|card| self.parse_card(card));
        dedup_by_url(items)
    }

    fn parse_card(&self, card: ElementRef<'_>) -> Option<ScrapedItem> {
        let (title, product_url) = card
            .select(&self.link)
            .next()
            .map(|a| (label_of(a), self.href_of(a)))
            .unwrap_or_default();

        if title.is_empty() || product_url.is_empty() {
            return None;
        }

        let image_url = card
            .select(&self.image)
            .next()
            .and_then(|img| {
                IMAGE_ATTRS
                    .iter()
                    .filter_map(|attr| img.value().attr(attr))
                    .map(str::trim)
                    .find(|v| !v.is_empty())
            })
            .map(|src| resolve_url(&self.origin, src))
            .unwrap_or_default();

        let text: String = card.text().collect();

        let (supplier_name, supplier_url) = card
            .select(&self.supplier)
            .next()
            .map(|a| (label_of(a), self.href_of(a)))
            .unwrap_or_default();

        Some(ScrapedItem {
            title,
            product_url,
            image_url,
            price_text: price_snippet(&text),
            moq_text: moq_snippet(&text),
            supplier_name,
            supplier_url,
        })
    }

    fn href_of(&self, a: ElementRef<'_>) -> String {
        a.value()
            .attr("href")
            .map(|h| resolve_url(&self.origin, h))
            .unwrap_or_default()
    }
}

/// Non-empty `title` attribute, else the anchor's trimmed text.
fn label_of(a: ElementRef<'_>) -> String {
    match a.value().attr("title").map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => a.text().collect::<String>().trim().to_string(),
    }
}

/// Keeps the first-seen position and the last-seen value for each URL.
pub fn dedup_by_url(items: impl IntoIterator<Item = ScrapedItem>) -> Vec<ScrapedItem> {
    let mut unique: IndexMap<String, ScrapedItem> = IndexMap::new();
    for item in items {
        unique.insert(item.product_url.clone(), item);
    }
    unique.into_values().collect()
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| anyhow::anyhow!("selector {:?}: {:?}", s, e))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
