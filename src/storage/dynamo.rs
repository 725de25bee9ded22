use crate::models::ProductRecord;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::{AttributeValue, PutRequest, WriteRequest};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use super::ProductStore;

pub struct DynamoProductStore {
    client: Client,
    table_name: String,
}

impl DynamoProductStore {
    pub fn new(sdk_config: &aws_config::SdkConfig, table_name: &str) -> Self {
        Self {
            client: Client::new(sdk_config),
            table_name: table_name.to_string(),
        }
    }
}

#[async_trait]
impl ProductStore for DynamoProductStore {
    async fn ensure_ready(&self) -> Result<()> {
        let out = self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
            .with_context(|| format!("DynamoDB table {} not accessible", self.table_name))?;

        let status = out
            .table()
            .and_then(|t| t.table_status())
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| "UNKNOWN".to_string());
        info!("Table {} is {}", self.table_name, status);
        Ok(())
    }

    async fn write_batch(&self, records: Vec<ProductRecord>) -> Result<Vec<ProductRecord>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut requests = Vec::with_capacity(records.len());
        for record in &records {
            let put = PutRequest::builder()
                .set_item(Some(to_item(record)?))
                .build()
                .with_context(|| format!("put request for {}", record.id))?;
            requests.push(WriteRequest::builder().put_request(put).build());
        }

        let out = self
            .client
            .batch_write_item()
            .request_items(&self.table_name, requests)
            .send()
            .await
            .with_context(|| format!("BatchWriteItem on {}", self.table_name))?;

        let unprocessed_ids: Vec<String> = out
            .unprocessed_items()
            .and_then(|m| m.get(&self.table_name))
            .map(|reqs| reqs.iter().filter_map(request_id).collect())
            .unwrap_or_default();

        if unprocessed_ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!("{} unprocessed in {}", unprocessed_ids.len(), self.table_name);

        let mut by_id: HashMap<String, ProductRecord> =
            records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Ok(unprocessed_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect())
    }
}

fn request_id(req: &WriteRequest) -> Option<String> {
    req.put_request()?
        .item()
        .get("id")?
        .as_s()
        .ok()
        .cloned()
}

// ── Marshalling ───────────────────────────────────────────────────────────────

/// Record → attribute map, going through its serde representation.
pub fn to_item(record: &ProductRecord) -> Result<HashMap<String, AttributeValue>> {
    match serde_json::to_value(record).context("serialize record")? {
        Value::Object(fields) => Ok(fields
            .into_iter()
            .map(|(k, v)| (k, to_attribute(v)))
            .collect()),
        other => bail!("record serialized to non-object {}", other),
    }
}

fn to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s),
        Value::Array(items) => AttributeValue::L(items.into_iter().map(to_attribute).collect()),
        Value::Object(fields) => AttributeValue::M(
            fields
                .into_iter()
                .map(|(k, v)| (k, to_attribute(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogConfig;
    use crate::models::ScrapedItem;
    use crate::normalizer::normalize;

    #[test]
    fn test_to_item_shape() {
        let item = ScrapedItem {
            title: "Carbon Lip".to_string(),
            product_url: "https://x/p/1".to_string(),
            image_url: "https://img.x/1.jpg".to_string(),
            price_text: "US$ 42".to_string(),
            ..ScrapedItem::default()
        };
        let record = normalize(&item, &CatalogConfig::default(), chrono::Utc::now());
        let attrs = to_item(&record).unwrap();

        assert_eq!(attrs["pk"], AttributeValue::S(format!("prod#{}", record.id)));
        assert_eq!(attrs["sk"], AttributeValue::S("prod".to_string()));
        assert_eq!(attrs["price"], AttributeValue::N("42".to_string()));
        assert_eq!(
            attrs["images"],
            AttributeValue::L(vec![AttributeValue::S("https://img.x/1.jpg".to_string())])
        );
        assert_eq!(attrs["features"], AttributeValue::L(vec![]));
        assert_eq!(attrs["imageLocalPath"], AttributeValue::S(String::new()));
        assert!(attrs.contains_key("productUrl"));
        assert!(attrs.contains_key("updatedAt"));
    }

    #[test]
    fn test_request_id_roundtrip() {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S("abc".to_string()));
        let put = PutRequest::builder().set_item(Some(item)).build().unwrap();
        let req = WriteRequest::builder().put_request(put).build();
        assert_eq!(request_id(&req).as_deref(), Some("abc"));
    }
}
