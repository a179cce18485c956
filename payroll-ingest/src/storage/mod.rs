//! Artifact storage abstraction
//!
//! One [`StorageBackend`] is built from configuration at process start and
//! injected into the batch driver. Both backends share the addressing
//! convention `{identifier}/{employee_key}/{file_name}` (object key) or
//! `{root}/{employee_key}/{file_name}` (filesystem path).
//!
//! `exists` distinguishes a confirmed "not found" (`Ok(false)`) from any other
//! backend fault (`Err`). Callers must never treat an error as absent.
//! `fetch` reports the same not-found case as [`StorageError::NotFound`].

pub mod filesystem;
pub mod object;

pub use filesystem::FilesystemStorage;
pub use object::ObjectStorage;

use async_trait::async_trait;
use payroll_common::config::{StorageConfig, StorageKind};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Content type of every stored receipt
pub const RECEIPT_CONTENT_TYPE: &str = "application/pdf";

const OBJECT_SCHEME: &str = "s3://";

/// Storage backend errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Local I/O failure (filesystem backend or permissions)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Object store failure other than a confirmed not-found
    #[error("Object store error: {0}")]
    Object(#[from] object_store::Error),

    /// Nothing is stored behind the locator
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// An address component would escape its directory or is empty
    #[error("Invalid storage name: {0}")]
    InvalidName(String),

    /// The call did not finish within the configured bound
    #[error("Storage {operation} timed out after {timeout_ms} ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// Backend could not be constructed from configuration
    #[error("Storage configuration error: {0}")]
    Config(String),
}

impl StorageError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, StorageError::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Opaque reference to stored bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageLocator {
    Object { bucket: String, key: String },
    File { path: PathBuf },
}

impl StorageLocator {
    /// Parse the ledger text form; anything that is not `s3://bucket/key` is a path
    pub fn parse(text: &str) -> Self {
        if let Some(rest) = text.strip_prefix(OBJECT_SCHEME) {
            if let Some((bucket, key)) = rest.split_once('/') {
                if !bucket.is_empty() && !key.is_empty() {
                    return StorageLocator::Object {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    };
                }
            }
        }
        StorageLocator::File {
            path: PathBuf::from(text),
        }
    }

    pub fn kind(&self) -> StorageKind {
        match self {
            StorageLocator::Object { .. } => StorageKind::Object,
            StorageLocator::File { .. } => StorageKind::Filesystem,
        }
    }
}

impl fmt::Display for StorageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageLocator::Object { bucket, key } => write!(f, "{}{}/{}", OBJECT_SCHEME, bucket, key),
            StorageLocator::File { path } => write!(f, "{}", path.display()),
        }
    }
}

/// Uniform persist/exists/fetch over one storage backend
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Backend kind, for logging
    fn kind(&self) -> StorageKind;

    /// Whether the bytes behind `locator` still exist
    ///
    /// `Ok(false)` only for a confirmed not-found, or for a locator this
    /// backend cannot address (other kind or bucket).
    async fn exists(&self, locator: &StorageLocator) -> Result<bool, StorageError>;

    /// Store `bytes` under the shared addressing convention, overwriting
    async fn persist(
        &self,
        bytes: &[u8],
        identifier: &str,
        employee_key: &str,
        file_name: &str,
    ) -> Result<StorageLocator, StorageError>;

    /// Read back the bytes behind `locator`
    ///
    /// [`StorageError::NotFound`] for a confirmed miss or a locator this
    /// backend cannot address.
    async fn fetch(&self, locator: &StorageLocator) -> Result<Vec<u8>, StorageError>;
}

/// Build the configured backend once per process
pub fn build_backend(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>, StorageError> {
    match config.backend {
        StorageKind::Object => {
            let storage = ObjectStorage::s3(config)?;
            tracing::info!(bucket = %storage.bucket(), "Using object storage backend");
            Ok(Arc::new(storage))
        }
        StorageKind::Filesystem => {
            let root = config.local_root.clone().ok_or_else(|| {
                StorageError::Config("filesystem backend requires storage.local_root".to_string())
            })?;
            let storage = FilesystemStorage::new(root)?;
            tracing::info!(root = %storage.root().display(), "Using filesystem storage backend");
            Ok(Arc::new(storage))
        }
    }
}

/// Bound a storage call; elapsed time becomes [`StorageError::Timeout`]
pub async fn with_timeout<T, F>(
    operation: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout {
            operation,
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}

/// Reject names that are empty or not a single normal path component
pub(crate) fn validate_component(name: &str) -> Result<(), StorageError> {
    let mut components = std::path::Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(std::path::Component::Normal(_)), None) if !name.contains('\\') => Ok(()),
        _ => Err(StorageError::InvalidName(name.to_string())),
    }
}
