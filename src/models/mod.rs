use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Scraped listing entry ─────────────────────────────────────────────────────

/// One product card lifted off a listing page. Never persisted as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedItem {
    pub title: String,
    pub product_url: String,   // absolute, natural key
    pub image_url: String,     // absolute or empty
    pub price_text: String,
    pub moq_text: String,
    pub supplier_name: String,
    pub supplier_url: String,
}

impl ScrapedItem {
    pub fn has_image(&self) -> bool {
        !self.image_url.is_empty()
    }
}

// ── Persisted product ─────────────────────────────────────────────────────────

/// Row in the products table, in the shape the storefront reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub pk: String,
    pub sk: String,
    pub id: String,
    pub name: String,
    pub price: i64,
    pub image: String,
    pub images: Vec<String>,
    pub image_local_path: String, // always empty, kept for the storefront schema
    pub description: String,
    pub specifications: Vec<Specification>,
    pub features: Vec<String>,
    pub category: String,

    // provenance
    pub product_url: String,
    pub price_text: String,
    pub moq_text: String,
    pub supplier_name: String,
    pub supplier_url: String,
    pub source: String,
    pub updated_at: i64,

    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// `{label, value}` pair filled in later by the admin workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Specification {
    pub label: String,
    pub value: String,
}
