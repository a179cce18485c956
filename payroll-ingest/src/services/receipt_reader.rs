//! Receipt download
//!
//! Reads one stored receipt back by ledger id: row lookup, then a bounded
//! fetch through the configured [`StorageBackend`]. A missing row and a
//! missing artifact are distinct not-found cases.

use crate::error::FetchError;
use crate::storage::{with_timeout, StorageBackend, StorageLocator};
use crate::types::LedgerStore;
use payroll_common::db::ReceiptRecord;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct ReceiptReader {
    storage: Arc<dyn StorageBackend>,
    ledger: Arc<dyn LedgerStore>,
    storage_timeout: Duration,
}

impl ReceiptReader {
    pub fn new(storage: Arc<dyn StorageBackend>, ledger: Arc<dyn LedgerStore>, storage_timeout: Duration) -> Self {
        Self {
            storage,
            ledger,
            storage_timeout,
        }
    }

    /// Ledger row and stored bytes of receipt `id`
    pub async fn fetch(&self, id: i64) -> Result<(ReceiptRecord, Vec<u8>), FetchError> {
        let record = self
            .ledger
            .get_receipt(id)
            .await?
            .ok_or(FetchError::ReceiptNotFound(id))?;

        let locator = StorageLocator::parse(&record.locator);
        match with_timeout("fetch", self.storage_timeout, self.storage.fetch(&locator)).await {
            Ok(bytes) => {
                debug!(id, locator = %locator, size = bytes.len(), "Fetched receipt");
                Ok((record, bytes))
            }
            Err(err) if err.is_not_found() => {
                warn!(id, locator = %locator, "Ledger row points at a missing artifact");
                Err(FetchError::ArtifactMissing {
                    id,
                    locator: record.locator,
                })
            }
            Err(err) => Err(FetchError::Storage(err)),
        }
    }
}
