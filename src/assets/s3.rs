use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use tracing::debug;

use super::ObjectStore;

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(sdk_config: &aws_config::SdkConfig, bucket: &str) -> Self {
        Self {
            client: Client::new(sdk_config),
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    /// HEAD the key. Any failure (404, 403 without list rights, network)
    /// reads as "not there" and leads to a fresh upload.
    async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!("HEAD s3://{}/{}: {}", self.bucket, key, e);
                Ok(false)
            }
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str, acl: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .acl(ObjectCannedAcl::from(acl))
            .send()
            .await
            .with_context(|| format!("PutObject s3://{}/{}", self.bucket, key))?;
        Ok(())
    }
}
