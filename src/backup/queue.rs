// s3dump/src/backup/queue.rs
use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::Configuration;
use crate::errors::{BackupError, Result};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
pub const DUMP_EXTENSION: &str = "sql.gz";

/// Connection details for one configured database.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    pub name: String,
    pub user: String,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

/// One entry of the job queue. Built once, never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseJobSpec {
    pub credentials: DatabaseCredentials,
    /// `{name}_{timestamp}.sql.gz`
    pub filename: String,
    pub staging_dir: PathBuf,
}

impl DatabaseJobSpec {
    pub fn name(&self) -> &str {
        &self.credentials.name
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.staging_dir.join(&self.filename)
    }
}

/// Expands the `database` section into an ordered job queue.
///
/// Validation is all-or-nothing: the first invalid entry fails the whole
/// build. Duplicate names are kept; their filenames get a `-2`, `-3`, ...
/// suffix so that every job writes its own artifact.
pub fn build_job_queue(
    config: &Configuration,
    staging_dir: &Path,
    now: NaiveDateTime,
) -> Result<Vec<DatabaseJobSpec>> {
    let entries = database_entries(config)?;
    let timestamp = now.format(TIMESTAMP_FORMAT).to_string();

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut queue = Vec::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let credentials = parse_credentials(index + 1, entry)?;

        let occurrence = seen.entry(credentials.name.clone()).or_insert(0);
        *occurrence += 1;
        let filename = if *occurrence == 1 {
            format!("{}_{}.{}", credentials.name, timestamp, DUMP_EXTENSION)
        } else {
            format!("{}_{}-{}.{}", credentials.name, timestamp, occurrence, DUMP_EXTENSION)
        };

        queue.push(DatabaseJobSpec {
            credentials,
            filename,
            staging_dir: staging_dir.to_path_buf(),
        });
    }

    Ok(queue)
}

fn database_entries(config: &Configuration) -> Result<Vec<&Map<String, Value>>> {
    match &config.database {
        None => Err(BackupError::invalid_config("missing `database` section")),
        Some(Value::Array(items)) if items.is_empty() => {
            Err(BackupError::invalid_config("`database` section is empty"))
        }
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                item.as_object().ok_or_else(|| {
                    BackupError::invalid_config(format!("entry #{} is not a mapping", index + 1))
                })
            })
            .collect(),
        // Single-database layout: {"user": .., "password": .., "name": ..}
        Some(Value::Object(entry)) => Ok(vec![entry]),
        Some(_) => Err(BackupError::invalid_config(
            "`database` must be a list of database entries",
        )),
    }
}

fn parse_credentials(position: usize, entry: &Map<String, Value>) -> Result<DatabaseCredentials> {
    let name = string_field(position, entry, "name")?;
    let user = string_field(position, entry, "user")?;

    let password = match entry.get("password") {
        None => {
            return Err(BackupError::invalid_config(format!(
                "entry #{position} is missing `password`"
            )));
        }
        Some(Value::Null) => None,
        Some(Value::String(password)) => Some(password.clone()),
        Some(_) => {
            return Err(BackupError::invalid_config(format!(
                "entry #{position}: `password` must be a string or null"
            )));
        }
    };

    if name.is_empty()
        || name == "."
        || name == ".."
        || name.starts_with('-')
        || name.contains(['/', '\\'])
    {
        return Err(BackupError::invalid_config(format!(
            "entry #{position}: invalid database name {name:?}"
        )));
    }

    let host = match entry.get("host") {
        None | Some(Value::Null) => None,
        Some(Value::String(host)) if !host.is_empty() => Some(host.clone()),
        Some(_) => {
            return Err(BackupError::invalid_config(format!(
                "entry #{position}: `host` must be a non-empty string"
            )));
        }
    };

    let port = match entry.get("port") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| {
                    BackupError::invalid_config(format!(
                        "entry #{position}: `port` must be a number between 0 and 65535"
                    ))
                })?,
        ),
    };

    Ok(DatabaseCredentials {
        name,
        user,
        password,
        host,
        port,
    })
}

fn string_field(position: usize, entry: &Map<String, Value>, key: &str) -> Result<String> {
    match entry.get(key) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(BackupError::invalid_config(format!(
            "entry #{position}: `{key}` must be a string"
        ))),
        None => Err(BackupError::invalid_config(format!(
            "entry #{position} is missing `{key}`"
        ))),
    }
}
