//! Boundary traits for the ingest pipeline
//!
//! The pipeline consumes two external collaborators besides storage:
//! - [`DirectoryProvider`]: the employee directory snapshot (owned by the
//!   roster subsystem)
//! - [`LedgerStore`]: the receipt ledger
//!
//! SQLite implementations live in [`crate::db`].

use async_trait::async_trait;
use payroll_common::db::{DirectoryRecord, NewReceipt, ReceiptRecord};
use payroll_common::Result;

/// Dedup key of a ledger row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptKey {
    pub employee_key: String,
    pub identifier: String,
    /// Canonical period string, `"D al D"`
    pub period: String,
    pub file_name: String,
}

impl ReceiptKey {
    pub fn of(receipt: &NewReceipt) -> Self {
        Self {
            employee_key: receipt.employee_key.clone(),
            identifier: receipt.identifier.clone(),
            period: receipt.period.clone(),
            file_name: receipt.file_name.clone(),
        }
    }
}

/// Result of an atomic insert-if-absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// This call created the row
    Inserted(ReceiptRecord),
    /// A row with the same dedup key already existed (e.g. a concurrent batch won)
    Conflict(ReceiptRecord),
}

/// Source of the employee directory snapshot
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    /// All directory entries as of call time
    async fn load_snapshot(&self) -> Result<Vec<DirectoryRecord>>;
}

/// Receipt ledger
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Row matching the exact dedup key, if any
    async fn find_receipt(&self, key: &ReceiptKey) -> Result<Option<ReceiptRecord>>;

    /// Row by primary key, if any
    async fn get_receipt(&self, id: i64) -> Result<Option<ReceiptRecord>>;

    /// Insert unless a row with the same dedup key exists; never duplicates
    async fn insert_receipt(&self, receipt: &NewReceipt) -> Result<InsertOutcome>;

    /// Replace the locator of an existing row
    async fn update_locator(&self, id: i64, locator: &str) -> Result<()>;
}
