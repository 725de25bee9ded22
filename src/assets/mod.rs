//! Mirrors product images into object storage.
//!
//! Keys follow `{prefix}/{product_id}/{sanitized_title}.{ext}` and are checked
//! before upload, so repeated imports never upload an image twice. A failed
//! mirror leaves the item pointing at its external image URL.

pub mod s3;

use crate::config::AssetConfig;
use crate::identity::derive_id;
use crate::models::ScrapedItem;
use crate::pipeline::pool::run_bounded;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

const MAX_FILE_NAME_LEN: usize = 80;
const DEFAULT_EXTENSION: &str = "jpg";
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif", "bmp", "svg"];

// ── Seams ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DownloadedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn download(&self, url: &str) -> Result<DownloadedImage>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str, acl: &str) -> Result<()>;
}

// ── Uploader ──────────────────────────────────────────────────────────────────

pub struct AssetUploader {
    store: Arc<dyn ObjectStore>,
    images: Arc<dyn ImageSource>,
    bucket: String,
    region: String,
    config: AssetConfig,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AttachStats {
    pub uploaded: usize,
    pub fallbacks: usize,
}

impl AssetUploader {
    pub fn new(
        config: &AssetConfig,
        region: &str,
        store: Arc<dyn ObjectStore>,
        images: Arc<dyn ImageSource>,
    ) -> Result<Self> {
        let bucket = config
            .bucket
            .clone()
            .context("Asset uploads need a bucket")?;
        Ok(Self {
            store,
            images,
            bucket,
            region: region.to_string(),
            config: config.clone(),
        })
    }

    /// Key plus existence check, then download/upload on a miss. Returns the
    /// public URL of the stored object.
    pub async fn ensure_uploaded(
        &self,
        product_id: &str,
        title: &str,
        image_url: &str,
    ) -> Result<String> {
        let key = build_key(&self.config.prefix, product_id, title, image_url);

        if self.store.exists(&key).await.unwrap_or(false) {
            debug!("{} already stored", key);
            return Ok(self.public_url(&key));
        }

        let image = self
            .images
            .download(image_url)
            .await
            .with_context(|| format!("download {}", image_url))?;

        let content_type = image
            .content_type
            .clone()
            .unwrap_or_else(|| content_type_for(&extension_for(image_url)).to_string());

        self.store
            .put(&key, image.bytes, &content_type, &self.config.acl)
            .await
            .with_context(|| format!("upload {}", key))?;

        debug!("Uploaded {} ({})", key, content_type);
        Ok(self.public_url(&key))
    }

    pub fn public_url(&self, key: &str) -> String {
        public_url(
            self.config.public_url_base.as_deref(),
            &self.bucket,
            &self.region,
            key,
        )
    }

    /// Mirror every item's image with at most `concurrency` transfers in flight.
    /// Items whose transfer fails keep their original `image_url`.
    pub async fn attach_images(
        self: &Arc<Self>,
        items: Vec<ScrapedItem>,
    ) -> (Vec<ScrapedItem>, AttachStats) {
        let with_image = items.iter().filter(|i| i.has_image()).count();
        info!(
            "Uploading {} images to s3://{}/{} (concurrency {})",
            with_image, self.bucket, self.config.prefix, self.config.concurrency
        );

        let originals = items.clone();
        let uploader = Arc::clone(self);
        let results = run_bounded(items, self.config.concurrency, move |mut item| {
            let uploader = Arc::clone(&uploader);
            async move {
                if !item.has_image() {
                    return (item, None);
                }
                let id = derive_id(&item.product_url);
                match uploader
                    .ensure_uploaded(&id, &item.title, &item.image_url)
                    .await
                {
                    Ok(url) => {
                        item.image_url = url;
                        (item, Some(true))
                    }
                    Err(e) => {
                        warn!("Image for {} kept external: {:#}", item.product_url, e);
                        (item, Some(false))
                    }
                }
            }
        })
        .await;

        let mut stats = AttachStats::default();
        let items = results
            .into_iter()
            .zip(originals)
            .map(|(result, original)| match result {
                Some((item, outcome)) => {
                    match outcome {
                        Some(true) => stats.uploaded += 1,
                        Some(false) => stats.fallbacks += 1,
                        None => {}
                    }
                    item
                }
                // task died; keep what we scraped
                None => {
                    if original.has_image() {
                        stats.fallbacks += 1;
                    }
                    original
                }
            })
            .collect();

        info!(
            "Images: {} stored, {} kept external",
            stats.uploaded, stats.fallbacks
        );
        (items, stats)
    }
}

// ── Keys and URLs ─────────────────────────────────────────────────────────────

pub fn build_key(prefix: &str, product_id: &str, title: &str, image_url: &str) -> String {
    let mut name = sanitize_file_name(title);
    if name.is_empty() {
        name = product_id.to_string();
    }
    let ext = extension_for(image_url);
    if prefix.is_empty() {
        format!("{}/{}.{}", product_id, name, ext)
    } else {
        format!("{}/{}/{}.{}", prefix, product_id, name, ext)
    }
}

/// Lowercase, `[a-z0-9._-]` only, no leading/trailing separators, at most 80
/// chars. May return an empty string.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_gap = false;
    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-') {
            out.push(c);
            in_gap = false;
        } else if !in_gap {
            out.push('_');
            in_gap = true;
        }
    }

    let is_sep = |c: char| matches!(c, '.' | '_' | '-');
    let trimmed = out.trim_matches(is_sep);
    // ASCII only at this point, so byte slicing is safe
    let capped = &trimmed[..trimmed.len().min(MAX_FILE_NAME_LEN)];
    capped.trim_end_matches(is_sep).to_string()
}

/// Known image extension from the URL path, else "jpg".
pub fn extension_for(image_url: &str) -> String {
    let path = Url::parse(image_url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| image_url.split(['?', '#']).next().unwrap_or("").to_string());

    path.rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

pub fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Configured base wins; otherwise the bucket's regional virtual-host URL.
pub fn public_url(base: Option<&str>, bucket: &str, region: &str, key: &str) -> String {
    if let Some(base) = base {
        return format!("{}/{}", base.trim_end_matches('/'), key);
    }

    let host = if region == "us-east-1" {
        format!("{}.s3.amazonaws.com", bucket)
    } else {
        format!("{}.s3-{}.amazonaws.com", bucket, region)
    };

    match Url::parse(&format!("https://{}", host)) {
        Ok(mut url) => {
            url.set_path(key);
            url.to_string()
        }
        Err(_) => format!("https://{}/{}", host, key),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
