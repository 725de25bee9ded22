//! ScrapedItem → ProductRecord mapping.

use crate::config::CatalogConfig;
use crate::identity::derive_id;
use crate::models::{ProductRecord, ScrapedItem};
use crate::scraper::cleaner::parse_price;
use chrono::{DateTime, Utc};
use tracing::warn;

const PARTITION_PREFIX: &str = "prod#";
const SORT_KEY: &str = "prod";
const RESERVED_KEYS: &[&str] = &["pk", "sk", "id"];

/// Pure: the same item, config and timestamp always give the same record.
pub fn normalize(item: &ScrapedItem, catalog: &CatalogConfig, now: DateTime<Utc>) -> ProductRecord {
    let id = derive_id(&item.product_url);

    let images = if item.image_url.is_empty() {
        Vec::new()
    } else {
        vec![item.image_url.clone()]
    };

    ProductRecord {
        pk: format!("{}{}", PARTITION_PREFIX, id),
        sk: SORT_KEY.to_string(),
        id,
        name: item.title.clone(),
        price: parse_price(&item.price_text),
        image: item.image_url.clone(),
        images,
        image_local_path: String::new(),
        description: String::new(),
        specifications: Vec::new(),
        features: Vec::new(),
        category: catalog.category.clone(),
        product_url: item.product_url.clone(),
        price_text: item.price_text.clone(),
        moq_text: item.moq_text.clone(),
        supplier_name: item.supplier_name.clone(),
        supplier_url: item.supplier_url.clone(),
        source: catalog.source_tag.clone(),
        updated_at: now.timestamp(),
        extra: catalog
            .extra_attributes
            .iter()
            .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

pub fn normalize_all(
    items: &[ScrapedItem],
    catalog: &CatalogConfig,
    now: DateTime<Utc>,
) -> Vec<ProductRecord> {
    for key in catalog.extra_attributes.keys() {
        if RESERVED_KEYS.contains(&key.as_str()) {
            warn!("Ignoring extra attribute {:?}: reserved key", key);
        }
    }
    items.iter().map(|item| normalize(item, catalog, now)).collect()
}
