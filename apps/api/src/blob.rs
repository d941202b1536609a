use anyhow::{anyhow, Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// Thin wrapper over the S3 client bound to the transcript bucket.
#[derive(Clone)]
pub struct BlobStore {
    client: S3Client,
    bucket: String,
}

impl BlobStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let body = serde_json::to_vec_pretty(value)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| anyhow!("S3 upload failed: {e}"))?;

        info!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }

    pub async fn get_bytes(&self, key: &str) -> Result<bytes::Bytes> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow!("S3 get failed for {key}: {e}"))?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| anyhow!("S3 body read failed for {key}: {e}"))?;
        Ok(data.into_bytes())
    }

    pub async fn get_json(&self, key: &str) -> Result<Value> {
        let bytes = self.get_bytes(key).await?;
        serde_json::from_slice(&bytes).with_context(|| format!("object {key} is not valid JSON"))
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow!("S3 delete failed for {key}: {e}"))?;
        Ok(())
    }
}
