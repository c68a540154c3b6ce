// s3dump/src/backup/report.rs
use std::path::PathBuf;
use std::time::Duration;

use super::queue::DatabaseJobSpec;
use crate::errors::BackupError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Dumped and uploaded.
    Completed,
    /// Dumped; upload was disabled for this run and the artifact stays on disk.
    UploadSkipped,
    DumpFailed,
    UploadFailed,
}

impl JobStatus {
    pub fn is_failure(self) -> bool {
        matches!(self, JobStatus::DumpFailed | JobStatus::UploadFailed)
    }

    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Completed => "COMPLETED",
            JobStatus::UploadSkipped => "DUMPED",
            JobStatus::DumpFailed => "DUMP FAILED",
            JobStatus::UploadFailed => "UPLOAD FAILED",
        }
    }
}

/// Outcome of a single job. Never modified once the runner returns it.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub database: String,
    pub status: JobStatus,
    pub elapsed: Duration,
    pub artifact: PathBuf,
    pub remote_id: Option<String>,
    pub error: Option<String>,
}

impl JobResult {
    pub(super) fn new(job: &DatabaseJobSpec, status: JobStatus, elapsed: Duration) -> Self {
        Self {
            database: job.name().to_string(),
            status,
            elapsed,
            artifact: job.artifact_path(),
            remote_id: None,
            error: None,
        }
    }

    pub(super) fn with_remote_id(mut self, remote_id: String) -> Self {
        self.remote_id = Some(remote_id);
        self
    }

    pub(super) fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// What happened to the staging directory at the end of the run.
#[derive(Debug)]
pub enum CleanupOutcome {
    /// Upload was disabled, dumps are left for the user.
    NotRequested,
    Removed,
    Failed(BackupError),
}

impl CleanupOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CleanupOutcome::Failed(_))
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub staging_dir: PathBuf,
    /// Name of the remote target, `None` when upload was disabled.
    pub target: Option<String>,
    pub results: Vec<JobResult>,
    pub cleanup: CleanupOutcome,
}

impl RunReport {
    pub fn count(&self, status: JobStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobResult> {
        self.results.iter().filter(|r| r.status.is_failure())
    }

    /// True when every job reached its goal and cleanup did not fail.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none() && !self.cleanup.is_failure()
    }
}
