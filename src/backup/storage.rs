// s3dump/src/backup/storage.rs
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::glacier_upload::GlacierUploader;
use super::s3_upload::S3Uploader;
use crate::config::StorageTarget;

/// Ships a finished artifact to remote storage. The target (bucket, vault,
/// credentials) is bound when the uploader is built.
#[async_trait]
pub trait StorageUploader: Send + Sync {
    /// Human readable name of the target, used in logs and reports.
    fn target_name(&self) -> &str;

    /// Prefix placed in front of every remote key, if any.
    fn key_prefix(&self) -> Option<&str> {
        None
    }

    /// Uploads `local_path` under `remote_key` and returns the identifier the
    /// remote side knows the artifact by.
    async fn upload(&self, local_path: &Path, remote_key: &str) -> Result<String>;
}

/// Builds the uploader for a validated target.
pub fn connect(target: StorageTarget) -> Arc<dyn StorageUploader> {
    match target {
        StorageTarget::ObjectStorage(s3) => Arc::new(S3Uploader::new(s3)),
        StorageTarget::ArchiveVault(glacier) => Arc::new(GlacierUploader::new(glacier)),
    }
}

/// `[prefix/]<database>/<filename>`
pub fn remote_key(prefix: Option<&str>, database: &str, filename: &str) -> String {
    match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{prefix}/{database}/{filename}"),
        None => format!("{database}/{filename}"),
    }
}
