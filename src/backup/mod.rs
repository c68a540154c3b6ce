mod logic;
pub(crate) mod db_dump;
pub(crate) mod glacier_upload;
pub(crate) mod queue;
pub(crate) mod report;
pub(crate) mod runner;
pub(crate) mod s3_upload;
pub(crate) mod staging;
pub(crate) mod storage;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::config::Configuration;
use crate::errors::Result;

pub use logic::{BackupOrchestrator, DEFAULT_STAGING_DIR, RunOptions};
pub use report::{CleanupOutcome, JobResult, JobStatus, RunReport};

/// Public entry point for the backup process.
/// Dumps every configured database with `mysqldump` and ships the results to
/// the target selected in `options`.
pub async fn run_backup_flow(config: &Configuration, options: &RunOptions) -> Result<RunReport> {
    let dumper = Arc::new(db_dump::MysqlDumpProducer::new());
    BackupOrchestrator::new(dumper).execute(config, options).await
}
