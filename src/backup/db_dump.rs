// s3dump/src/backup/db_dump.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, info, warn};
use which::which;

use super::queue::DatabaseCredentials;

/// Produces a gzip-compressed logical dump of one database.
#[async_trait]
pub trait DumpProducer: Send + Sync {
    async fn produce(&self, database: &DatabaseCredentials, output_path: &Path) -> Result<()>;
}

// Helper function to find mysqldump executable
fn find_mysqldump_executable() -> Result<PathBuf> {
    which("mysqldump")
        .context("mysqldump executable not found in PATH. Please ensure the MySQL client tools are installed and in your PATH.")
}

/// [`DumpProducer`] backed by the `mysqldump` command line utility.
#[derive(Debug, Clone, Default)]
pub struct MysqlDumpProducer {
    executable: Option<PathBuf>,
}

impl MysqlDumpProducer {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: Some(executable.into()),
        }
    }

    fn executable(&self) -> Result<PathBuf> {
        match &self.executable {
            Some(path) => Ok(path.clone()),
            None => find_mysqldump_executable(),
        }
    }
}

#[async_trait]
impl DumpProducer for MysqlDumpProducer {
    async fn produce(&self, database: &DatabaseCredentials, output_path: &Path) -> Result<()> {
        let invocation = DumpInvocation {
            executable: self.executable()?,
            args: dump_args(database),
            password: database.password.clone().filter(|p| !p.is_empty()),
            database: database.name.clone(),
            output_path: output_path.to_path_buf(),
        };
        info!(database = %database.name, "Dumping database to {}", output_path.display());

        let bytes = tokio::task::spawn_blocking(move || invocation.run())
            .await
            .context("mysqldump task did not complete")??;

        debug!(database = %database.name, bytes, "mysqldump finished");
        Ok(())
    }
}

fn dump_args(database: &DatabaseCredentials) -> Vec<String> {
    let mut args = vec![
        "--opt".to_string(),
        "--single-transaction".to_string(),
        "--quick".to_string(),
        format!("--user={}", database.user),
        format!("--host={}", database.host.as_deref().unwrap_or("localhost")),
    ];
    if let Some(port) = database.port {
        args.push(format!("--port={port}"));
    }
    args.push(database.name.clone());
    args
}

struct DumpInvocation {
    executable: PathBuf,
    args: Vec<String>,
    password: Option<String>,
    database: String,
    output_path: PathBuf,
}

impl DumpInvocation {
    /// Runs the dump and returns the number of uncompressed bytes written.
    /// The output file is removed again if anything goes wrong.
    fn run(self) -> Result<u64> {
        let file = File::create_new(&self.output_path).with_context(|| {
            format!("Failed to create dump file: {}", self.output_path.display())
        })?;

        let result = self.stream_into(file);
        if result.is_err() {
            if let Err(e) = fs::remove_file(&self.output_path) {
                warn!(
                    "Failed to remove incomplete dump {}: {}",
                    self.output_path.display(),
                    e
                );
            }
        }
        result
    }

    fn stream_into(&self, file: File) -> Result<u64> {
        let mut command = Command::new(&self.executable);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // MYSQL_PWD keeps the password out of the process list
        if let Some(password) = &self.password {
            command.env("MYSQL_PWD", password);
        }

        let mut child = command.spawn().with_context(|| {
            format!(
                "Failed to execute {} for database: {}",
                self.executable.display(),
                self.database
            )
        })?;
        let stdout = child
            .stdout
            .take()
            .context("mysqldump stdout was not captured")?;
        let mut stderr = child
            .stderr
            .take()
            .context("mysqldump stderr was not captured")?;

        // stderr is drained on its own thread so a chatty mysqldump cannot
        // block on a full pipe while stdout is still being copied
        let stderr_reader = thread::spawn(move || -> io::Result<Vec<u8>> {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf)?;
            Ok(buf)
        });

        // compress and capture stdout of mysqldump
        let copied = (|| -> io::Result<u64> {
            let mut encoder = GzEncoder::new(file, Compression::default());
            let bytes = io::copy(&mut BufReader::new(stdout), &mut encoder)?;
            encoder.finish()?.sync_all()?;
            Ok(bytes)
        })();

        let status = child
            .wait()
            .with_context(|| format!("Failed to wait for mysqldump of database: {}", self.database))?;
        let stderr = stderr_reader
            .join()
            .map_err(|_| anyhow::anyhow!("mysqldump stderr reader panicked"))?
            .context("Failed to read mysqldump stderr")?;

        if !status.success() {
            return Err(anyhow::anyhow!(
                "mysqldump for database {} failed with status: {}\nStderr: {}",
                self.database,
                status,
                String::from_utf8_lossy(&stderr).trim()
            ));
        }
        if !stderr.is_empty() {
            debug!(
                database = %self.database,
                "mysqldump stderr: {}",
                String::from_utf8_lossy(&stderr).trim()
            );
        }

        copied.with_context(|| {
            format!(
                "Failed to write compressed dump to {}",
                self.output_path.display()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(name: &str, password: Option<&str>) -> DatabaseCredentials {
        DatabaseCredentials {
            name: name.to_string(),
            user: "root".to_string(),
            password: password.map(str::to_string),
            host: None,
            port: Some(3307),
        }
    }

    #[test]
    fn test_dump_args_never_carry_the_password() {
        let args = dump_args(&credentials("shop", Some("hunter2")));
        assert_eq!(
            args,
            [
                "--opt",
                "--single-transaction",
                "--quick",
                "--user=root",
                "--host=localhost",
                "--port=3307",
                "shop"
            ]
        );
    }

    #[cfg(unix)]
    mod fake_mysqldump {
        use super::*;
        use flate2::read::GzDecoder;
        use std::os::unix::fs::PermissionsExt;
        use std::sync::Mutex;

        // Writing and spawning scripts concurrently can fail with ETXTBSY.
        static SCRIPT_LOCK: Mutex<()> = Mutex::new(());

        fn script(dir: &Path, body: &str) -> anyhow::Result<PathBuf> {
            let path = dir.join("mysqldump");
            fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
            Ok(path)
        }

        #[tokio::test]
        async fn test_produce_writes_gzip_output() -> anyhow::Result<()> {
            let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let dir = tempfile::tempdir()?;
            let exe = script(
                dir.path(),
                r#"echo "-- args: $*"; echo "-- pwd: ${MYSQL_PWD:-none}""#,
            )?;
            let output = dir.path().join("shop_2024.sql.gz");

            MysqlDumpProducer::with_executable(&exe)
                .produce(&credentials("shop", Some("secret")), &output)
                .await?;

            let mut dump = String::new();
            GzDecoder::new(File::open(&output)?).read_to_string(&mut dump)?;
            assert!(dump.contains("--user=root"));
            assert!(dump.contains("shop"));
            assert!(dump.contains("-- pwd: secret"));
            Ok(())
        }

        #[tokio::test]
        async fn test_produce_surfaces_stderr_and_removes_partial_file() -> anyhow::Result<()> {
            let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let dir = tempfile::tempdir()?;
            let exe = script(
                dir.path(),
                r#"echo "-- partial"; echo "Access denied for user" >&2; exit 2"#,
            )?;
            let output = dir.path().join("shop.sql.gz");

            let err = MysqlDumpProducer::with_executable(&exe)
                .produce(&credentials("shop", None), &output)
                .await
                .unwrap_err();

            assert!(format!("{err:#}").contains("Access denied for user"));
            assert!(!output.exists());
            Ok(())
        }

        #[tokio::test]
        async fn test_produce_survives_large_stderr_output() -> anyhow::Result<()> {
            let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let dir = tempfile::tempdir()?;
            // 200 KB of warnings, well past a pipe buffer
            let exe = script(
                dir.path(),
                r#"i=0; while [ $i -lt 2000 ]; do printf '%0100d\n' 0 >&2; i=$((i+1)); done; echo "-- done""#,
            )?;
            let output = dir.path().join("shop.sql.gz");

            let produced = tokio::time::timeout(
                std::time::Duration::from_secs(30),
                MysqlDumpProducer::with_executable(&exe).produce(&credentials("shop", None), &output),
            )
            .await;

            assert!(produced.is_ok(), "mysqldump with noisy stderr never finished");
            produced??;
            let mut dump = String::new();
            GzDecoder::new(File::open(&output)?).read_to_string(&mut dump)?;
            assert_eq!(dump.trim(), "-- done");
            Ok(())
        }

        #[tokio::test]
        async fn test_produce_does_not_clobber_existing_file() -> anyhow::Result<()> {
            let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let dir = tempfile::tempdir()?;
            let exe = script(dir.path(), "echo dump")?;
            let output = dir.path().join("shop.sql.gz");
            fs::write(&output, b"previous")?;

            let result = MysqlDumpProducer::with_executable(&exe)
                .produce(&credentials("shop", None), &output)
                .await;

            assert!(result.is_err());
            assert_eq!(fs::read(&output)?, b"previous");
            Ok(())
        }
    }
}
