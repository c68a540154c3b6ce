// s3dump/src/backup/logic.rs
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::db_dump::DumpProducer;
use super::queue::build_job_queue;
use super::report::{CleanupOutcome, RunReport};
use super::runner::JobRunner;
use super::staging;
use super::storage::{self, StorageUploader};
use crate::config::{Configuration, StorageTarget, TargetKind};
use crate::errors::Result;

// Constants for configuration
pub const DEFAULT_STAGING_DIR: &str = "dumps";

pub type UploaderFactory =
    Box<dyn Fn(StorageTarget) -> Arc<dyn StorageUploader> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub staging_dir: PathBuf,
    /// Remote target to ship dumps to; `None` keeps them in the staging dir.
    pub upload: Option<TargetKind>,
}

/// Drives a whole run: validates the target, builds the queue, runs every
/// job in order and decides what happens to the staging directory.
pub struct BackupOrchestrator {
    dumper: Arc<dyn DumpProducer>,
    connect: UploaderFactory,
}

impl BackupOrchestrator {
    pub fn new(dumper: Arc<dyn DumpProducer>) -> Self {
        Self {
            dumper,
            connect: Box::new(storage::connect),
        }
    }

    /// Replaces how validated targets are turned into uploaders.
    #[cfg(test)]
    pub fn with_uploader_factory(
        mut self,
        factory: impl Fn(StorageTarget) -> Arc<dyn StorageUploader> + Send + Sync + 'static,
    ) -> Self {
        self.connect = Box::new(factory);
        self
    }

    /// Errors returned here mean no job was started. Per-job failures are
    /// only visible in the returned report.
    pub async fn execute(&self, config: &Configuration, options: &RunOptions) -> Result<RunReport> {
        let uploader = match options.upload {
            Some(kind) => {
                let target = config.storage_target(kind)?;
                Some((self.connect)(target))
            }
            None => None,
        };

        let queue = build_job_queue(config, &options.staging_dir, Local::now().naive_local())?;
        info!("Queued {} database(s) for backup", queue.len());

        staging::ensure(&options.staging_dir)?;

        let runner = JobRunner::new(self.dumper.as_ref(), uploader.as_deref());
        let mut results = Vec::with_capacity(queue.len());
        for job in &queue {
            results.push(runner.run(job).await);
        }

        let cleanup = match &uploader {
            None => CleanupOutcome::NotRequested,
            Some(_) => match staging::destroy(&options.staging_dir) {
                Ok(()) => CleanupOutcome::Removed,
                Err(e) => {
                    warn!("{e}");
                    CleanupOutcome::Failed(e)
                }
            },
        };

        Ok(RunReport {
            staging_dir: options.staging_dir.clone(),
            target: uploader.map(|u| u.target_name().to_string()),
            results,
            cleanup,
        })
    }
}
