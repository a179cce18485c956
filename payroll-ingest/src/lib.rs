//! payroll-ingest library interface
//!
//! Batch ingestion of payroll receipts: a zip archive of PDFs goes in, every
//! document is matched to an employee, its bytes are stored idempotently and
//! a ledger row is written (or repaired) for it.
//!
//! The entry point is [`BatchDriver::ingest_archive`]; stored receipts are
//! read back with [`ReceiptReader::fetch`]. Collaborators are
//! injected as trait objects: [`StorageBackend`], [`LedgerStore`] and
//! [`DirectoryProvider`].

pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod types;
pub mod utils;

pub use crate::error::{DocumentError, FetchError, IngestError, IngestResult, UnparsableReason};
pub use crate::models::{BatchResult, DocumentFailure, DocumentOutcome};
pub use crate::services::{BatchDriver, ReceiptReader};
pub use crate::storage::{StorageBackend, StorageError, StorageLocator};
pub use crate::types::{DirectoryProvider, InsertOutcome, LedgerStore, ReceiptKey};

use payroll_common::config::Settings;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Wire a [`BatchDriver`] from resolved settings and an open database
///
/// Builds the configured storage backend once; the SQLite pool serves both
/// the ledger and the directory snapshot.
pub fn build_batch_driver(settings: &Settings, pool: SqlitePool) -> Result<BatchDriver, StorageError> {
    let storage = storage::build_backend(&settings.storage)?;
    let ledger = Arc::new(db::SqliteLedger::new(pool.clone(), settings.ingest.max_lock_wait_ms));
    let directory = Arc::new(db::SqliteDirectory::new(pool));

    Ok(BatchDriver::new(
        storage,
        ledger,
        directory,
        &settings.ingest,
        Duration::from_millis(settings.storage.timeout_ms),
    ))
}

/// Wire a [`ReceiptReader`] over the configured storage backend
pub fn build_receipt_reader(settings: &Settings, pool: SqlitePool) -> Result<ReceiptReader, StorageError> {
    let storage = storage::build_backend(&settings.storage)?;
    let ledger = Arc::new(db::SqliteLedger::new(pool, settings.ingest.max_lock_wait_ms));

    Ok(ReceiptReader::new(
        storage,
        ledger,
        Duration::from_millis(settings.storage.timeout_ms),
    ))
}
