// s3dump/src/backup/runner.rs
use std::time::Instant;
use tracing::{error, info, warn};

use super::db_dump::DumpProducer;
use super::queue::DatabaseJobSpec;
use super::report::{JobResult, JobStatus};
use super::storage::{StorageUploader, remote_key};

pub const ARTIFACT_MISSING: &str = "artifact missing";

/// Runs a single job: dump, then upload when an uploader is present.
///
/// The runner holds no state between jobs. Every failure ends up inside the
/// returned [`JobResult`]; nothing is propagated to the caller.
pub struct JobRunner<'a> {
    dumper: &'a dyn DumpProducer,
    uploader: Option<&'a dyn StorageUploader>,
}

impl<'a> JobRunner<'a> {
    pub fn new(dumper: &'a dyn DumpProducer, uploader: Option<&'a dyn StorageUploader>) -> Self {
        Self { dumper, uploader }
    }

    pub async fn run(&self, job: &DatabaseJobSpec) -> JobResult {
        let started = Instant::now();
        let artifact = job.artifact_path();

        if let Err(e) = self.dumper.produce(&job.credentials, &artifact).await {
            error!(database = %job.name(), "Dump failed: {e:#}");
            return JobResult::new(job, JobStatus::DumpFailed, started.elapsed())
                .with_error(format!("{e:#}"));
        }

        let Some(uploader) = self.uploader else {
            info!(database = %job.name(), "Upload skipped, dump kept at {}", artifact.display());
            return JobResult::new(job, JobStatus::UploadSkipped, started.elapsed());
        };

        // a dump utility can exit cleanly without writing anything
        if !artifact.is_file() {
            warn!(database = %job.name(), "Unable to find dumped file {}", artifact.display());
            return JobResult::new(job, JobStatus::UploadFailed, started.elapsed())
                .with_error(ARTIFACT_MISSING);
        }

        let key = remote_key(uploader.key_prefix(), job.name(), &job.filename);
        match uploader.upload(&artifact, &key).await {
            Ok(remote_id) => {
                info!(
                    database = %job.name(),
                    "Wrote {} to {} as {}",
                    job.filename,
                    uploader.target_name(),
                    remote_id
                );
                JobResult::new(job, JobStatus::Completed, started.elapsed()).with_remote_id(remote_id)
            }
            Err(e) => {
                error!(database = %job.name(), "Upload to {} failed: {e:#}", uploader.target_name());
                JobResult::new(job, JobStatus::UploadFailed, started.elapsed())
                    .with_error(format!("{e:#}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::test_support::{RecordingUploader, StubDumper, job};

    #[tokio::test]
    async fn test_dump_failure_skips_upload() -> anyhow::Result<()> {
        let staging = tempfile::tempdir()?;
        let dumper = StubDumper::failing_for(["shop"]);
        let uploader = RecordingUploader::succeeding();

        let result = JobRunner::new(&dumper, Some(&uploader))
            .run(&job("shop", staging.path()))
            .await;

        assert_eq!(result.status, JobStatus::DumpFailed);
        assert!(result.error.as_deref().is_some_and(|e| e.contains("shop")));
        assert!(uploader.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_disabled_upload_keeps_artifact() -> anyhow::Result<()> {
        let staging = tempfile::tempdir()?;
        let dumper = StubDumper::default();
        let spec = job("shop", staging.path());

        let result = JobRunner::new(&dumper, None).run(&spec).await;

        assert_eq!(result.status, JobStatus::UploadSkipped);
        assert_eq!(result.artifact, spec.artifact_path());
        assert!(result.artifact.is_file());
        assert_eq!(result.remote_id, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_artifact_fails_upload() -> anyhow::Result<()> {
        let staging = tempfile::tempdir()?;
        let dumper = StubDumper::writing_nothing();
        let uploader = RecordingUploader::succeeding();

        let result = JobRunner::new(&dumper, Some(&uploader))
            .run(&job("shop", staging.path()))
            .await;

        assert_eq!(result.status, JobStatus::UploadFailed);
        assert_eq!(result.error.as_deref(), Some(ARTIFACT_MISSING));
        assert!(uploader.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_artifact() -> anyhow::Result<()> {
        let staging = tempfile::tempdir()?;
        let dumper = StubDumper::default();
        let uploader = RecordingUploader::failing();

        let result = JobRunner::new(&dumper, Some(&uploader))
            .run(&job("shop", staging.path()))
            .await;

        assert_eq!(result.status, JobStatus::UploadFailed);
        assert!(result.error.as_deref().is_some_and(|e| e.contains("bucket unreachable")));
        assert!(result.artifact.is_file());
        Ok(())
    }

    #[tokio::test]
    async fn test_successful_upload_records_remote_id() -> anyhow::Result<()> {
        let staging = tempfile::tempdir()?;
        let dumper = StubDumper::default();
        let uploader = RecordingUploader::succeeding().with_prefix("nightly");
        let spec = job("shop", staging.path());

        let result = JobRunner::new(&dumper, Some(&uploader)).run(&spec).await;

        assert_eq!(result.status, JobStatus::Completed);
        let expected_key = format!("nightly/shop/{}", spec.filename);
        assert_eq!(result.remote_id.as_deref(), Some(expected_key.as_str()));
        assert_eq!(uploader.calls(), [(spec.artifact_path(), expected_key)]);
        assert_eq!(result.error, None);
        Ok(())
    }
}
