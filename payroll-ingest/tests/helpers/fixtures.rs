//! Test environment: scratch database, directory rows, storage backends

use async_trait::async_trait;
use payroll_common::config::{IngestConfig, StorageKind};
use payroll_common::db::DirectoryRecord;
use payroll_ingest::db::employees::save_employee;
use payroll_ingest::db::{SqliteDirectory, SqliteLedger};
use payroll_ingest::storage::FilesystemStorage;
use payroll_ingest::{BatchDriver, ReceiptReader, StorageBackend, StorageError, StorageLocator};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Scenario A employee
pub const ANA_IDENTIFIER: &str = "ABCD850101XYZ";
pub const ANA_KEY: &str = "1234";

pub const BETO_IDENTIFIER: &str = "WXYZ800202QQ1";
pub const BETO_KEY: &str = "5678";

pub const STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Database and storage root under one temp directory
///
/// The TempDir must stay alive for the duration of the test.
pub struct TestEnv {
    pub dir: TempDir,
    pub pool: SqlitePool,
    pub storage_root: PathBuf,
}

impl TestEnv {
    /// Fresh database holding the two standard employees
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let pool = payroll_common::db::init_database(&dir.path().join("payroll.db"))
            .await
            .expect("init database");

        for (key, identifier, name) in [
            (ANA_KEY, ANA_IDENTIFIER, "Ana"),
            (BETO_KEY, BETO_IDENTIFIER, "Beto"),
        ] {
            save_employee(
                &pool,
                &DirectoryRecord {
                    employee_key: key.to_string(),
                    identifier: identifier.to_string(),
                    display_name: name.to_string(),
                },
            )
            .await
            .expect("save employee");
        }

        let storage_root = dir.path().join("receipts");
        Self {
            dir,
            pool,
            storage_root,
        }
    }

    pub fn filesystem_storage(&self) -> Arc<FilesystemStorage> {
        Arc::new(FilesystemStorage::new(&self.storage_root).expect("storage root"))
    }

    /// Driver with default ingest settings over `storage`
    pub fn driver(&self, storage: Arc<dyn StorageBackend>) -> BatchDriver {
        self.driver_with(storage, &IngestConfig::default(), STORAGE_TIMEOUT)
    }

    pub fn driver_with(
        &self,
        storage: Arc<dyn StorageBackend>,
        config: &IngestConfig,
        storage_timeout: Duration,
    ) -> BatchDriver {
        BatchDriver::new(
            storage,
            Arc::new(SqliteLedger::new(self.pool.clone(), config.max_lock_wait_ms)),
            Arc::new(SqliteDirectory::new(self.pool.clone())),
            config,
            storage_timeout,
        )
    }

    /// Receipt reader sharing this environment's database
    pub fn reader(&self, storage: Arc<dyn StorageBackend>) -> ReceiptReader {
        ReceiptReader::new(
            storage,
            Arc::new(SqliteLedger::new(self.pool.clone(), 1000)),
            STORAGE_TIMEOUT,
        )
    }

    /// Artifact path of the filesystem backend
    pub fn stored_path(&self, employee_key: &str, file_name: &str) -> PathBuf {
        self.storage_root.join(employee_key).join(file_name)
    }
}

/// Backend whose `exists` always fails with a non-"not found" fault
pub struct FlakyStorage {
    pub inner: Arc<dyn StorageBackend>,
    pub exists_calls: AtomicUsize,
    pub persist_calls: AtomicUsize,
}

impl FlakyStorage {
    pub fn wrap(inner: Arc<dyn StorageBackend>) -> Self {
        Self {
            inner,
            exists_calls: AtomicUsize::new(0),
            persist_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StorageBackend for FlakyStorage {
    fn kind(&self) -> StorageKind {
        self.inner.kind()
    }

    async fn exists(&self, _locator: &StorageLocator) -> Result<bool, StorageError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "access denied",
        )))
    }

    async fn persist(
        &self,
        bytes: &[u8],
        identifier: &str,
        employee_key: &str,
        file_name: &str,
    ) -> Result<StorageLocator, StorageError> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.persist(bytes, identifier, employee_key, file_name).await
    }

    async fn fetch(&self, locator: &StorageLocator) -> Result<Vec<u8>, StorageError> {
        self.inner.fetch(locator).await
    }
}

/// Backend that never answers within any reasonable bound
pub struct StalledStorage;

#[async_trait]
impl StorageBackend for StalledStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Object
    }

    async fn exists(&self, _locator: &StorageLocator) -> Result<bool, StorageError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(true)
    }

    async fn persist(
        &self,
        _bytes: &[u8],
        _identifier: &str,
        _employee_key: &str,
        _file_name: &str,
    ) -> Result<StorageLocator, StorageError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(StorageError::Config("unreachable".to_string()))
    }

    async fn fetch(&self, _locator: &StorageLocator) -> Result<Vec<u8>, StorageError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }
}
