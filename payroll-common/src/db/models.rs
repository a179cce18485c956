//! Database models
//!
//! Row types for the two tables the ingest pipeline touches. `employees` is
//! owned by the roster subsystem and read-only here; `receipts` is the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One employee as seen by a directory snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    /// Opaque internal employee id ("clave")
    pub employee_key: String,
    /// Canonical tax-style identifier, unique per person
    pub identifier: String,
    pub display_name: String,
}

/// A persisted ledger row
///
/// At most one row exists per (employee_key, identifier, period, file_name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub id: i64,
    pub employee_key: String,
    pub identifier: String,
    /// Canonical period string, `"D al D"`
    pub period: String,
    /// Canonical artifact file name
    pub file_name: String,
    /// Text form of the storage locator
    pub locator: String,
    pub ingested_at: DateTime<Utc>,
}

/// A ledger row that has not been inserted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReceipt {
    pub employee_key: String,
    pub identifier: String,
    pub period: String,
    pub file_name: String,
    pub locator: String,
    pub ingested_at: DateTime<Utc>,
}

impl NewReceipt {
    /// Attach the id assigned by the store
    pub fn into_record(self, id: i64) -> ReceiptRecord {
        ReceiptRecord {
            id,
            employee_key: self.employee_key,
            identifier: self.identifier,
            period: self.period,
            file_name: self.file_name,
            locator: self.locator,
            ingested_at: self.ingested_at,
        }
    }
}
