// s3dump/src/backup/s3_upload.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::primitives::ByteStream;
use std::path::Path;
use tracing::{debug, info};

use super::storage::StorageUploader;
use crate::config::S3Target;

const GZIP_CONTENT_TYPE: &str = "application/gzip";

/// Uploads artifacts to an S3 bucket (or any S3-compatible endpoint).
pub struct S3Uploader {
    target: S3Target,
}

impl S3Uploader {
    pub fn new(target: S3Target) -> Self {
        Self { target }
    }

    async fn client(&self) -> s3::Client {
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .region(Region::new(self.target.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                &self.target.access_key_id,
                &self.target.secret_access_key,
                None,     // session_token
                None,     // expiry
                "Static", // provider_name
            ));
        if let Some(endpoint) = &self.target.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        s3::Client::new(&loader.load().await)
    }
}

#[async_trait]
impl StorageUploader for S3Uploader {
    fn target_name(&self) -> &str {
        "S3"
    }

    fn key_prefix(&self) -> Option<&str> {
        self.target.directory.as_deref()
    }

    async fn upload(&self, local_path: &Path, remote_key: &str) -> Result<String> {
        info!(
            "Uploading {} to S3 bucket {} with key {}",
            local_path.display(),
            self.target.bucket,
            remote_key
        );

        let client = self.client().await;
        let body = ByteStream::from_path(local_path)
            .await
            .with_context(|| format!("Failed to create ByteStream from file: {}", local_path.display()))?;

        let output = client
            .put_object()
            .bucket(&self.target.bucket)
            .key(remote_key)
            .content_type(GZIP_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to upload file {} to S3 bucket {} with key {}",
                    local_path.display(),
                    self.target.bucket,
                    remote_key
                )
            })?;

        debug!(etag = output.e_tag().unwrap_or_default(), "S3 upload acknowledged");
        Ok(remote_key.to_string())
    }
}
