// s3dump/src/backup/glacier_upload.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_glacier as glacier;
use glacier::config::Region;
use glacier::primitives::ByteStream;
use std::path::Path;
use tracing::info;

use super::storage::StorageUploader;
use crate::config::GlacierTarget;

// "-" means the account that owns the credentials
const OWN_ACCOUNT: &str = "-";

/// Uploads artifacts as archives into a Glacier vault. Glacier assigns the
/// archive id; the remote key is only kept as the archive description.
pub struct GlacierUploader {
    target: GlacierTarget,
}

impl GlacierUploader {
    pub fn new(target: GlacierTarget) -> Self {
        Self { target }
    }

    async fn client(&self) -> glacier::Client {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(self.target.region.clone()))
            .credentials_provider(glacier::config::Credentials::new(
                &self.target.access_key_id,
                &self.target.secret_access_key,
                None,
                None,
                "Static",
            ))
            .load()
            .await;

        glacier::Client::new(&sdk_config)
    }
}

#[async_trait]
impl StorageUploader for GlacierUploader {
    fn target_name(&self) -> &str {
        "Glacier"
    }

    async fn upload(&self, local_path: &Path, remote_key: &str) -> Result<String> {
        info!(
            "Uploading {} to Glacier vault {}",
            local_path.display(),
            self.target.vault
        );

        let client = self.client().await;
        let body = ByteStream::from_path(local_path)
            .await
            .with_context(|| format!("Failed to create ByteStream from file: {}", local_path.display()))?;

        let output = client
            .upload_archive()
            .account_id(OWN_ACCOUNT)
            .vault_name(&self.target.vault)
            .archive_description(remote_key)
            .body(body)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to upload file {} to Glacier vault {}",
                    local_path.display(),
                    self.target.vault
                )
            })?;

        output
            .archive_id()
            .map(str::to_string)
            .context("Glacier did not return an archive id")
    }
}
