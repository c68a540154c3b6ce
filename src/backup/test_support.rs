// Stub collaborators for exercising the runner and the orchestrator without
// a database server or AWS credentials.
use anyhow::Result;
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::db_dump::DumpProducer;
use super::queue::{DatabaseCredentials, DatabaseJobSpec};
use super::storage::StorageUploader;

pub fn job(name: &str, staging_dir: &Path) -> DatabaseJobSpec {
    DatabaseJobSpec {
        credentials: DatabaseCredentials {
            name: name.to_string(),
            user: "root".to_string(),
            password: None,
            host: None,
            port: None,
        },
        filename: format!("{name}_2024-03-09_14-05-07.sql.gz"),
        staging_dir: staging_dir.to_path_buf(),
    }
}

#[derive(Default)]
pub struct StubDumper {
    failing: HashSet<String>,
    write_nothing: bool,
    calls: Mutex<Vec<String>>,
}

impl StubDumper {
    pub fn failing_for<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            failing: names.into_iter().map(str::to_string).collect(),
            ..Default::default()
        }
    }

    /// Reports success without producing a file.
    pub fn writing_nothing() -> Self {
        Self {
            write_nothing: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DumpProducer for StubDumper {
    async fn produce(&self, database: &DatabaseCredentials, output_path: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(database.name.clone());

        if self.failing.contains(&database.name) {
            anyhow::bail!("mysqldump for database {} failed: Access denied", database.name);
        }
        if self.write_nothing {
            return Ok(());
        }

        let mut encoder = GzEncoder::new(File::create_new(output_path)?, Compression::default());
        writeln!(encoder, "-- dump of {}", database.name)?;
        encoder.finish()?;
        Ok(())
    }
}

pub struct RecordingUploader {
    fail: bool,
    prefix: Option<String>,
    calls: Mutex<Vec<(PathBuf, String)>>,
}

impl RecordingUploader {
    pub fn succeeding() -> Self {
        Self {
            fail: false,
            prefix: None,
            calls: Mutex::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::succeeding()
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(PathBuf, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageUploader for RecordingUploader {
    fn target_name(&self) -> &str {
        "stub"
    }

    fn key_prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    async fn upload(&self, local_path: &Path, remote_key: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((local_path.to_path_buf(), remote_key.to_string()));

        if self.fail {
            anyhow::bail!("bucket unreachable");
        }
        Ok(remote_key.to_string())
    }
}
