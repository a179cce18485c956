//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from an optional TOML file. Every value can be
//! overridden from the environment, and the root folder / database path can be
//! overridden again from the command line.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--root-folder`, `--database`)
//! 2. Environment variables (`PAYROLL_*`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ENV_ROOT_FOLDER: &str = "PAYROLL_ROOT_FOLDER";
/// Environment variable overriding the SQLite database path
pub const ENV_DATABASE: &str = "PAYROLL_DATABASE";
/// Environment variable selecting the storage backend (`object` or `filesystem`)
pub const ENV_STORAGE_BACKEND: &str = "PAYROLL_STORAGE_BACKEND";
pub const ENV_S3_BUCKET: &str = "PAYROLL_S3_BUCKET";
pub const ENV_S3_REGION: &str = "PAYROLL_S3_REGION";
pub const ENV_S3_ENDPOINT: &str = "PAYROLL_S3_ENDPOINT";
pub const ENV_S3_ACCESS_KEY_ID: &str = "PAYROLL_S3_ACCESS_KEY_ID";
pub const ENV_S3_SECRET_ACCESS_KEY: &str = "PAYROLL_S3_SECRET_ACCESS_KEY";
/// Environment variable overriding the filesystem backend root
pub const ENV_LOCAL_STORAGE_ROOT: &str = "PAYROLL_LOCAL_STORAGE_ROOT";

const DEFAULT_DATABASE_FILE: &str = "payroll.db";
const DEFAULT_RECEIPTS_DIR: &str = "receipts";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and (by default) stored receipts
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// SQLite database path; defaults to `{root_folder}/payroll.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Which storage backend holds receipt artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// S3-compatible object storage
    Object,
    /// Local filesystem under `local_root`
    #[default]
    Filesystem,
}

impl std::str::FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "object" | "s3" => Ok(StorageKind::Object),
            "filesystem" | "fs" | "local" => Ok(StorageKind::Filesystem),
            other => Err(Error::Config(format!(
                "Unknown storage backend '{}' (expected 'object' or 'filesystem')",
                other
            ))),
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageKind,

    /// Bucket name (object backend)
    #[serde(default)]
    pub bucket: Option<String>,

    /// Region (object backend)
    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible services (object backend)
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,

    /// Filesystem backend root; defaults to `{root_folder}/receipts`
    #[serde(default)]
    pub local_root: Option<PathBuf>,

    /// Upper bound for a single storage call
    #[serde(default = "default_storage_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::default(),
            bucket: None,
            region: None,
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            local_root: None,
            timeout_ms: default_storage_timeout_ms(),
        }
    }
}

/// What to do when a document's candidates match more than one employee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Use the first matching candidate in extraction order
    #[default]
    FirstMatch,
    /// Skip the document and count it as ambiguous
    Reject,
}

/// Batch ingestion tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Pages scanned for text when the filename does not carry the fields
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Documents processed concurrently within one batch
    #[serde(default = "default_max_concurrent_documents")]
    pub max_concurrent_documents: usize,

    /// Total time ledger writes keep retrying while SQLite is locked
    #[serde(default = "default_max_lock_wait_ms")]
    pub max_lock_wait_ms: u64,

    #[serde(default)]
    pub ambiguity_policy: AmbiguityPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_concurrent_documents: default_max_concurrent_documents(),
            max_lock_wait_ms: default_max_lock_wait_ms(),
            ambiguity_policy: AmbiguityPolicy::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_storage_timeout_ms() -> u64 {
    30_000
}

fn default_max_pages() -> usize {
    2
}

fn default_max_concurrent_documents() -> usize {
    4
}

fn default_max_lock_wait_ms() -> u64 {
    5_000
}

/// Fully resolved settings for one process
#[derive(Debug, Clone)]
pub struct Settings {
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
}

impl Settings {
    /// Resolve settings from TOML, environment and command-line overrides
    ///
    /// A missing TOML file is not an error: defaults are used and a warning is logged.
    pub fn resolve(
        config_path: Option<&Path>,
        cli_root_folder: Option<&Path>,
        cli_database: Option<&Path>,
    ) -> Result<Self> {
        let path = match config_path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        let mut toml_config = match path {
            Some(p) => load_toml_config(&p)?,
            None => TomlConfig::default(),
        };
        toml_config.apply_env_overrides()?;

        Ok(Self::from_toml(toml_config, cli_root_folder, cli_database))
    }

    /// Build settings from an already loaded TOML config (no file or ENV access)
    pub fn from_toml(
        toml_config: TomlConfig,
        cli_root_folder: Option<&Path>,
        cli_database: Option<&Path>,
    ) -> Self {
        let root_folder = cli_root_folder
            .map(Path::to_path_buf)
            .or(toml_config.root_folder)
            .unwrap_or_else(default_root_folder);

        let database_path = cli_database
            .map(Path::to_path_buf)
            .or(toml_config.database_path)
            .unwrap_or_else(|| root_folder.join(DEFAULT_DATABASE_FILE));

        let mut storage = toml_config.storage;
        if storage.local_root.is_none() {
            storage.local_root = Some(root_folder.join(DEFAULT_RECEIPTS_DIR));
        }

        Self {
            root_folder,
            database_path,
            logging: toml_config.logging,
            storage,
            ingest: toml_config.ingest,
        }
    }

    /// Check cross-field requirements that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.storage.backend == StorageKind::Object
            && self.storage.bucket.as_deref().map_or(true, |b| b.trim().is_empty())
        {
            return Err(Error::Config(format!(
                "Object storage selected but no bucket configured. Set [storage].bucket or {}",
                ENV_S3_BUCKET
            )));
        }
        if self.storage.timeout_ms == 0 {
            return Err(Error::Config("storage.timeout_ms must be greater than 0".to_string()));
        }
        if self.ingest.max_pages == 0 {
            return Err(Error::Config("ingest.max_pages must be greater than 0".to_string()));
        }
        if self.ingest.max_concurrent_documents == 0 {
            return Err(Error::Config(
                "ingest.max_concurrent_documents must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl TomlConfig {
    /// Overlay `PAYROLL_*` environment variables onto this config
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(root) = env_value(ENV_ROOT_FOLDER) {
            self.root_folder = Some(PathBuf::from(root));
        }
        if let Some(db) = env_value(ENV_DATABASE) {
            self.database_path = Some(PathBuf::from(db));
        }
        if let Some(backend) = env_value(ENV_STORAGE_BACKEND) {
            self.storage.backend = backend.parse()?;
        }
        if let Some(bucket) = env_value(ENV_S3_BUCKET) {
            self.storage.bucket = Some(bucket);
        }
        if let Some(region) = env_value(ENV_S3_REGION) {
            self.storage.region = Some(region);
        }
        if let Some(endpoint) = env_value(ENV_S3_ENDPOINT) {
            self.storage.endpoint = Some(endpoint);
        }
        if let Some(key_id) = env_value(ENV_S3_ACCESS_KEY_ID) {
            self.storage.access_key_id = Some(key_id);
        }
        if let Some(secret) = env_value(ENV_S3_SECRET_ACCESS_KEY) {
            self.storage.secret_access_key = Some(secret);
        }
        if let Some(local_root) = env_value(ENV_LOCAL_STORAGE_ROOT) {
            self.storage.local_root = Some(PathBuf::from(local_root));
        }
        Ok(())
    }
}

/// Read a TOML config file, falling back to defaults when it does not exist
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Write a default config at `path` unless a file is already there
///
/// Returns whether a file was written.
pub fn ensure_config_file(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    write_toml_config(&TomlConfig::default(), path)?;
    info!("Wrote default configuration to {}", path.display());
    Ok(true)
}

/// Platform config file location (`~/.config/payroll/payroll-ingest.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("payroll").join("payroll-ingest.toml"))
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("payroll"))
        .unwrap_or_else(|| PathBuf::from("./payroll_data"))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
