use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub assets: AssetConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Listing source and HTTP behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_source_url")]
    pub source_url: String,

    #[serde(default = "default_pages")]
    pub pages: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_image_timeout_secs")]
    pub image_timeout_secs: u64,

    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,
}

/// Product table
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_table_name")]
    pub table_name: String,
}

/// Image mirroring into object storage. Disabled while `bucket` is unset.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetConfig {
    #[serde(default)]
    pub bucket: Option<String>,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub public_url_base: Option<String>,

    #[serde(default = "default_acl")]
    pub acl: String,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

/// Values stamped onto every imported record
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default = "default_source_tag")]
    pub source_tag: String,

    #[serde(default)]
    pub extra_attributes: BTreeMap<String, String>,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

const DEFAULT_SOURCE_URL: &str = "https://www.made-in-china.com/productdirectory.do?subaction=hunt&style=b&mode=and&code=0&comProvince=nolimit&order=0&isOpenCorrection=1&org=top&keyword=&file=&searchType=0&word=M3+lip&log_from=4&bv_id=1j9c5mv1s4e9";

fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.to_string()
}
fn default_pages() -> u32 {
    1
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_image_timeout_secs() -> u64 {
    30
}
fn default_page_delay_ms() -> u64 {
    1000
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string()
}
fn default_accept_language() -> String {
    "en-US,en;q=0.9".to_string()
}
fn default_region() -> String {
    "eu-central-1".to_string()
}
fn default_table_name() -> String {
    "carbon-parts-products".to_string()
}
fn default_prefix() -> String {
    "products/made-in-china".to_string()
}
fn default_acl() -> String {
    "public-read".to_string()
}
fn default_concurrency() -> usize {
    5
}
fn default_category() -> String {
    "BMW M3/M4 | Exteriér".to_string()
}
fn default_source_tag() -> String {
    "made-in-china".to_string()
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            pages: default_pages(),
            timeout_secs: default_timeout_secs(),
            image_timeout_secs: default_image_timeout_secs(),
            page_delay_ms: default_page_delay_ms(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            table_name: default_table_name(),
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            prefix: default_prefix(),
            public_url_base: None,
            acl: default_acl(),
            concurrency: default_concurrency(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            category: default_category(),
            source_tag: default_source_tag(),
            extra_attributes: BTreeMap::new(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

/// Flat variable names understood for compatibility with the deploy scripts.
/// Each maps onto a nested key and wins over every other source.
const FLAT_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("AWS_REGION", "storage.region"),
    ("DYNAMODB_TABLE_PRODUCTS", "storage.table_name"),
    ("DYNAMODB_TABLE_NAME", "storage.table_name"),
    ("SOURCE_URL", "scraper.source_url"),
    ("PAGES", "scraper.pages"),
    ("S3_BUCKET", "assets.bucket"),
    ("S3_PREFIX", "assets.prefix"),
    ("S3_PUBLIC_URL_BASE", "assets.public_url_base"),
    ("S3_ACL", "assets.acl"),
    ("UPLOAD_CONCURRENCY", "assets.concurrency"),
];

impl AppConfig {
    /// Load configuration from files, `IMPORTER__*` variables and the flat overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::load_with(|name| std::env::var(name).ok())
    }

    fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("IMPORTER").separator("__"));

        // Later entries overwrite earlier ones for the same key.
        for (var, key) in FLAT_ENV_OVERRIDES {
            let value = lookup(var).filter(|v| !v.trim().is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        let cfg = builder.build().context("Failed to assemble configuration")?;
        let mut app_cfg: AppConfig = cfg
            .try_deserialize()
            .context("Invalid configuration")?;

        if let Some(raw) = lookup("EXTRA_ATTRS") {
            app_cfg.catalog.extra_attributes.extend(parse_extra_attrs(&raw));
        }
        app_cfg.normalise();
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    fn normalise(&mut self) {
        self.assets.prefix = self.assets.prefix.trim_end_matches('/').to_string();
        self.assets.bucket = self.assets.bucket.take().filter(|b| !b.trim().is_empty());
        self.assets.public_url_base = self
            .assets
            .public_url_base
            .take()
            .filter(|b| !b.trim().is_empty());
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.scraper.pages >= 1, "scraper.pages must be at least 1");
        ensure!(
            self.assets.concurrency >= 1,
            "assets.concurrency must be at least 1"
        );
        ensure!(
            !self.storage.table_name.trim().is_empty(),
            "storage.table_name must not be empty"
        );
        Url::parse(&self.scraper.source_url)
            .with_context(|| format!("Invalid source URL {:?}", self.scraper.source_url))?;
        Ok(())
    }

    pub fn assets_enabled(&self) -> bool {
        self.assets.bucket.is_some()
    }
}

/// "k=v,k2=v2" → map. Entries without `=` are ignored.
pub fn parse_extra_attrs(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}
