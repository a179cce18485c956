//! Ledger Reconciler
//!
//! Per-document state machine:
//!
//! ```text
//! Extracted -> Resolved -> Created | AlreadyPresent | Repaired
//!          \-> Unparsable  \-> Unmatched | Ambiguous
//! ```
//!
//! Storage faults are folded into [`DocumentOutcome::Skipped`]; ledger
//! faults abort the batch through [`crate::IngestError::Ledger`]. A panic
//! inside the PDF decoder counts as an unreadable document.

use crate::error::{DocumentError, IngestResult, UnparsableReason};
use crate::models::DocumentOutcome;
use crate::services::document_extractor::DocumentExtractor;
use crate::services::identity_resolver::{DirectoryIndex, IdentityResolver};
use crate::storage::{with_timeout, StorageBackend, StorageError, StorageLocator};
use crate::types::{InsertOutcome, LedgerStore, ReceiptKey};
use chrono::Utc;
use payroll_common::db::NewReceipt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Reconciler {
    extractor: DocumentExtractor,
    resolver: IdentityResolver,
    storage: Arc<dyn StorageBackend>,
    ledger: Arc<dyn LedgerStore>,
    storage_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        extractor: DocumentExtractor,
        resolver: IdentityResolver,
        storage: Arc<dyn StorageBackend>,
        ledger: Arc<dyn LedgerStore>,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            resolver,
            storage,
            ledger,
            storage_timeout,
        }
    }

    /// Drive one document to a terminal state
    ///
    /// `file_name` is the document's path inside the archive; it feeds the
    /// filename fast path and the filename candidate fallback.
    pub async fn process(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        index: &DirectoryIndex,
    ) -> IngestResult<DocumentOutcome> {
        let extractor = self.extractor;
        let name = file_name.to_string();
        let extracted = tokio::task::spawn_blocking(move || extractor.extract(&name, &bytes).map(|doc| (doc, bytes)))
            .await
            .unwrap_or_else(|e| Err(UnparsableReason::Unreadable(format!("extraction failed: {}", e))));

        let (document, bytes) = match extracted {
            Ok(pair) => pair,
            Err(reason) => {
                if matches!(reason, UnparsableReason::Unreadable(_)) {
                    warn!(file = %file_name, %reason, "Document unreadable");
                } else {
                    debug!(file = %file_name, %reason, "Document unparsable");
                }
                return Ok(DocumentOutcome::Skipped(reason.into()));
            }
        };

        let identity = match self.resolver.resolve(&document.candidates, index) {
            Ok(identity) => identity,
            Err(err) => {
                debug!(file = %file_name, candidates = ?document.candidates, "Document not resolved: {}", err);
                return Ok(DocumentOutcome::Skipped(err));
            }
        };

        let key = ReceiptKey {
            employee_key: identity.employee_key,
            file_name: document.period.file_name(&identity.identifier),
            identifier: identity.identifier,
            period: document.period.ledger_string(),
        };

        debug!(
            file = %file_name,
            identifier = %key.identifier,
            employee_key = %key.employee_key,
            source = ?document.source,
            "Document resolved"
        );

        self.reconcile(&key, &bytes).await
    }

    /// Create, confirm or repair the ledger row and artifact for `key`
    pub async fn reconcile(&self, key: &ReceiptKey, bytes: &[u8]) -> IngestResult<DocumentOutcome> {
        match self.ledger.find_receipt(key).await? {
            None => self.create(key, bytes).await,
            Some(existing) => {
                let locator = StorageLocator::parse(&existing.locator);
                let present = match self.exists(&locator).await {
                    Ok(present) => present,
                    Err(err) => return Ok(storage_fault(key, err)),
                };

                if present {
                    debug!(file = %key.file_name, locator = %locator, "Artifact already present");
                    return Ok(DocumentOutcome::AlreadyPresent);
                }

                let stored = match self.persist(key, bytes).await {
                    Ok(stored) => stored,
                    Err(err) => return Ok(storage_fault(key, err)),
                };
                self.ledger.update_locator(existing.id, &stored.to_string()).await?;

                info!(
                    file = %key.file_name,
                    employee_key = %key.employee_key,
                    previous = %locator,
                    locator = %stored,
                    "Repaired missing artifact"
                );
                Ok(DocumentOutcome::Repaired)
            }
        }
    }

    async fn create(&self, key: &ReceiptKey, bytes: &[u8]) -> IngestResult<DocumentOutcome> {
        let stored = match self.persist(key, bytes).await {
            Ok(stored) => stored,
            Err(err) => return Ok(storage_fault(key, err)),
        };

        let receipt = NewReceipt {
            employee_key: key.employee_key.clone(),
            identifier: key.identifier.clone(),
            period: key.period.clone(),
            file_name: key.file_name.clone(),
            locator: stored.to_string(),
            ingested_at: Utc::now(),
        };

        match self.ledger.insert_receipt(&receipt).await? {
            InsertOutcome::Inserted(record) => {
                info!(
                    file = %record.file_name,
                    employee_key = %record.employee_key,
                    locator = %record.locator,
                    "Receipt created"
                );
                Ok(DocumentOutcome::Created)
            }
            InsertOutcome::Conflict(record) => {
                debug!(file = %record.file_name, id = record.id, "Concurrent ingestion already recorded receipt");
                Ok(DocumentOutcome::AlreadyPresent)
            }
        }
    }

    async fn exists(&self, locator: &StorageLocator) -> Result<bool, StorageError> {
        with_timeout("exists", self.storage_timeout, self.storage.exists(locator)).await
    }

    async fn persist(&self, key: &ReceiptKey, bytes: &[u8]) -> Result<StorageLocator, StorageError> {
        with_timeout(
            "persist",
            self.storage_timeout,
            self.storage
                .persist(bytes, &key.identifier, &key.employee_key, &key.file_name),
        )
        .await
    }
}

fn storage_fault(key: &ReceiptKey, err: StorageError) -> DocumentOutcome {
    warn!(file = %key.file_name, employee_key = %key.employee_key, "Storage fault: {}", err);
    DocumentOutcome::Skipped(DocumentError::Storage(err))
}
