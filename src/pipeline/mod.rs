//! Import orchestrator: scraper → assets → normalizer → storage.
//!
//! ## Run modes
//!
//! `run()` runs the full import:
//!   1. Check the products table is reachable (fatal otherwise)
//!   2. Crawl the listing pages sequentially → unique scraped items
//!   3. If a bucket is configured, mirror images (bounded parallelism)
//!   4. Normalize and upsert in batches of 25
//!   Idempotent: ids are derived from product URLs, so a re-run overwrites
//!   the same rows and finds the same images already stored.
//!
//! `preview()` runs steps 2 and 4 without touching any cloud service, for
//!   checking what a run would write.

pub mod pool;

use crate::assets::s3::S3ObjectStore;
use crate::assets::{AssetUploader, AttachStats};
use crate::config::AppConfig;
use crate::models::ProductRecord;
use crate::normalizer::normalize_all;
use crate::scraper::CatalogScraper;
use crate::scraper::http_client::HttpClient;
use crate::storage::dynamo::DynamoProductStore;
use crate::storage::{BatchWriter, ProductStore};
use crate::utils::Timer;
use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

pub struct Importer {
    config: AppConfig,
    scraper: CatalogScraper,
    uploader: Option<Arc<AssetUploader>>,
    store: Arc<dyn ProductStore>,
}

impl Importer {
    /// Wire the HTTP client and the AWS-backed store/uploader from config.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let http = Arc::new(HttpClient::new(&config.scraper).context("Failed to build HTTP client")?);

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.storage.region.clone()))
            .load()
            .await;

        let store: Arc<dyn ProductStore> = Arc::new(DynamoProductStore::new(
            &sdk_config,
            &config.storage.table_name,
        ));

        let uploader = match config.assets.bucket.as_deref() {
            Some(bucket) => Some(Arc::new(AssetUploader::new(
                &config.assets,
                &config.storage.region,
                Arc::new(S3ObjectStore::new(&sdk_config, bucket)),
                http.clone(),
            )?)),
            None => None,
        };

        let scraper = CatalogScraper::new(&config.scraper, http)?;
        Ok(Self::new(config, scraper, uploader, store))
    }

    pub fn new(
        config: AppConfig,
        scraper: CatalogScraper,
        uploader: Option<Arc<AssetUploader>>,
        store: Arc<dyn ProductStore>,
    ) -> Self {
        Self { config, scraper, uploader, store }
    }

    pub async fn run(&self) -> Result<ImportStats> {
        info!("Region: {}", self.config.storage.region);
        info!("Table: {}", self.config.storage.table_name);
        info!(
            "Source URL: {} (pages={})",
            self.config.scraper.source_url, self.config.scraper.pages
        );

        self.store.ensure_ready().await.context("Product table check failed")?;

        // ── 1. Scrape listing pages ───────────────────────────────────────────
        let items = {
            let _t = Timer::start("scrape");
            self.scraper.scrape_all().await.context("Listing scrape failed")?
        };
        let scraped = items.len();

        // ── 2. Mirror images ──────────────────────────────────────────────────
        let (items, images) = match &self.uploader {
            Some(uploader) => {
                let _t = Timer::start("image upload");
                uploader.attach_images(items).await
            }
            None => {
                info!("S3 bucket not set; images will remain external URLs");
                (items, AttachStats::default())
            }
        };

        // ── 3. Normalize + persist ────────────────────────────────────────────
        let records = normalize_all(&items, &self.config.catalog, Utc::now());
        info!("Upserting {} items into {}", records.len(), self.config.storage.table_name);

        let persisted = {
            let _t = Timer::start("persist");
            BatchWriter::new(self.store.as_ref())
                .persist_all(&records)
                .await
        };

        let stats = ImportStats {
            pages: self.scraper.page_urls().len(),
            items_scraped: scraped,
            images_uploaded: images.uploaded,
            image_fallbacks: images.fallbacks,
            records_written: persisted.written,
            records_given_up: persisted.given_up,
        };
        info!(
            "=== Done: {} items | {} images stored | {} written | {} given up ===",
            stats.items_scraped, stats.images_uploaded, stats.records_written, stats.records_given_up
        );
        Ok(stats)
    }

    /// Scrape and normalize only.
    pub async fn preview(&self) -> Result<Vec<ProductRecord>> {
        let items = self.scraper.scrape_all().await.context("Listing scrape failed")?;
        Ok(normalize_all(&items, &self.config.catalog, Utc::now()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub pages: usize,
    pub items_scraped: usize,
    pub images_uploaded: usize,
    pub image_fallbacks: usize,
    pub records_written: usize,
    pub records_given_up: usize,
}
