// s3dump/src/config/mod.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::errors::BackupError;

pub const DEFAULT_CONFIG_FILE: &str = "s3dump.json";
const DEFAULT_S3_REGION: &str = "us-east-1";

// Structs for deserializing s3dump.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonS3Config {
    pub key: Option<String>,
    pub secret: Option<String>,
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonGlacierConfig {
    pub key: Option<String>,
    pub secret: Option<String>,
    pub region: Option<String>,
    pub vault: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<JsonS3Config>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glacier: Option<JsonGlacierConfig>,
}

/// Parsed contents of the config file.
///
/// The `database` section is kept as raw JSON on purpose: the queue builder
/// has to tell a missing `password` key apart from an explicit `null`, which
/// a typed `Option<String>` cannot do.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsConfig>,
}

// Validated storage targets handed to the uploaders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Target {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub directory: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlacierTarget {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub vault: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTarget {
    ObjectStorage(S3Target),
    ArchiveVault(GlacierTarget),
}

/// Which remote target a run ships its dumps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TargetKind {
    S3,
    Glacier,
}

impl TargetKind {
    pub fn label(self) -> &'static str {
        match self {
            TargetKind::S3 => "amazon s3",
            TargetKind::Glacier => "amazon glacier",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::S3 => f.write_str("S3"),
            TargetKind::Glacier => f.write_str("Glacier"),
        }
    }
}

impl Configuration {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        Self::from_json_str(&config_content).with_context(|| {
            format!(
                "Failed to parse JSON from config file at {}. Please check for syntax errors.",
                config_path.display()
            )
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Resolves the selected remote target, failing if any required field is
    /// absent or empty.
    pub fn storage_target(&self, kind: TargetKind) -> crate::errors::Result<StorageTarget> {
        let label = kind.label();
        let aws = self
            .aws
            .as_ref()
            .ok_or_else(|| BackupError::invalid_target(label, "missing `aws` section"))?;

        match kind {
            TargetKind::S3 => {
                let raw = aws
                    .s3
                    .as_ref()
                    .ok_or_else(|| BackupError::invalid_target(label, "missing `aws.s3` section"))?;

                let endpoint_url = non_empty(&raw.endpoint_url);
                if let Some(endpoint) = &endpoint_url {
                    url::Url::parse(endpoint).map_err(|e| {
                        BackupError::invalid_target(label, format!("invalid `endpoint_url` {endpoint}: {e}"))
                    })?;
                }

                Ok(StorageTarget::ObjectStorage(S3Target {
                    access_key_id: required(&raw.key, "key", label)?,
                    secret_access_key: required(&raw.secret, "secret", label)?,
                    bucket: required(&raw.bucket, "bucket", label)?,
                    region: non_empty(&raw.region).unwrap_or_else(|| DEFAULT_S3_REGION.to_string()),
                    endpoint_url,
                    directory: raw
                        .directory
                        .as_deref()
                        .map(|d| d.trim_matches('/'))
                        .filter(|d| !d.is_empty())
                        .map(str::to_string),
                }))
            }
            TargetKind::Glacier => {
                let raw = aws.glacier.as_ref().ok_or_else(|| {
                    BackupError::invalid_target(label, "missing `aws.glacier` section")
                })?;

                Ok(StorageTarget::ArchiveVault(GlacierTarget {
                    access_key_id: required(&raw.key, "key", label)?,
                    secret_access_key: required(&raw.secret, "secret", label)?,
                    region: required(&raw.region, "region", label)?,
                    vault: required(&raw.vault, "vault", label)?,
                }))
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}

fn required(
    value: &Option<String>,
    field: &str,
    target: &'static str,
) -> crate::errors::Result<String> {
    non_empty(value)
        .ok_or_else(|| BackupError::invalid_target(target, format!("`{field}` is missing or empty")))
}

/// Values used by `generate-config`. Unset arguments fall back to placeholders.
#[derive(Debug, Clone)]
pub struct ConfigTemplate {
    pub database: String,
    pub user: String,
    pub password: String,
    pub s3_key: String,
    pub s3_secret: String,
    pub s3_bucket: String,
}

impl Default for ConfigTemplate {
    fn default() -> Self {
        Self {
            database: "database".to_string(),
            user: "root".to_string(),
            password: String::new(),
            s3_key: "s3-key".to_string(),
            s3_secret: "s3-secret".to_string(),
            s3_bucket: "s3-bucket".to_string(),
        }
    }
}

impl ConfigTemplate {
    pub fn to_configuration(&self) -> Configuration {
        Configuration {
            database: Some(json!([{
                "user": self.user,
                "password": self.password,
                "name": self.database,
            }])),
            aws: Some(AwsConfig {
                s3: Some(JsonS3Config {
                    key: Some(self.s3_key.clone()),
                    secret: Some(self.s3_secret.clone()),
                    bucket: Some(self.s3_bucket.clone()),
                    ..Default::default()
                }),
                glacier: None,
            }),
        }
    }
}

/// Writes a template config file to `path`. An existing file is only
/// replaced when `force` is set.
pub fn write_config_template(path: &Path, template: &ConfigTemplate, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        );
    }

    let content = serde_json::to_string_pretty(&template.to_configuration())
        .context("Failed to serialize config template")?;
    fs::write(path, content + "\n")
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;
    Ok(())
}
