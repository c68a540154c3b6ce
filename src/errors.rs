use std::path::PathBuf;
use thiserror::Error;

/// Run-level failures. Anything listed here stops the run before the first
/// job starts, except `CleanupFailed`, which only ever ends up in the report.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Invalid database configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("Invalid {target} configuration: {reason}")]
    TargetConfigurationInvalid {
        target: &'static str,
        reason: String,
    },

    #[error("Staging directory {} is unavailable: {source}", path.display())]
    StagingUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to remove staging directory {}: {source}", path.display())]
    CleanupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BackupError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::ConfigurationInvalid(reason.into())
    }

    pub fn invalid_target(target: &'static str, reason: impl Into<String>) -> Self {
        Self::TargetConfigurationInvalid {
            target,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
