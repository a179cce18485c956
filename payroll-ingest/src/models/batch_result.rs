//! Batch results and per-document outcomes

use crate::error::DocumentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal state of one document
#[derive(Debug)]
pub enum DocumentOutcome {
    /// New artifact persisted and ledger row inserted
    Created,
    /// Ledger row exists and its artifact is still in storage
    AlreadyPresent,
    /// Ledger row existed but its artifact was missing; re-persisted
    Repaired,
    /// Document skipped for the attached reason
    Skipped(DocumentError),
}

/// A skipped document, for operator follow-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFailure {
    /// Path of the document inside the archive
    pub file_name: String,

    /// Error code (e.g. "UNPARSABLE", "STORAGE_TIMEOUT")
    pub error_code: String,

    /// Human-readable error message
    pub error_message: String,

    /// Resubmitting the archive may succeed
    pub retryable: bool,

    pub occurred_at: DateTime<Utc>,
}

/// Aggregated result of one `ingest_archive` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: Uuid,
    pub created: usize,
    pub already_present: usize,
    pub repaired: usize,
    pub unmatched_identity: usize,
    pub unparsable: usize,
    /// Rejected under the `reject` ambiguity policy
    pub ambiguous: usize,
    /// Storage faults and timeouts
    pub failed: usize,
    pub total_documents: usize,
    /// Archive entries not unpacked because their names escape the scratch root
    pub rejected_entries: usize,
    pub failures: Vec<DocumentFailure>,
    pub duration_ms: u64,
}

impl BatchResult {
    /// Create new empty result
    pub fn new(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            created: 0,
            already_present: 0,
            repaired: 0,
            unmatched_identity: 0,
            unparsable: 0,
            ambiguous: 0,
            failed: 0,
            total_documents: 0,
            rejected_entries: 0,
            failures: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Fold one document outcome into the counters
    pub fn record(&mut self, file_name: &str, outcome: DocumentOutcome) {
        self.total_documents += 1;
        match outcome {
            DocumentOutcome::Created => self.created += 1,
            DocumentOutcome::AlreadyPresent => self.already_present += 1,
            DocumentOutcome::Repaired => self.repaired += 1,
            DocumentOutcome::Skipped(err) => {
                match &err {
                    DocumentError::Unparsable(_) => self.unparsable += 1,
                    DocumentError::Unmatched { .. } => self.unmatched_identity += 1,
                    DocumentError::Ambiguous { .. } => self.ambiguous += 1,
                    DocumentError::Storage(_) => self.failed += 1,
                }
                self.failures.push(DocumentFailure {
                    file_name: file_name.to_string(),
                    error_code: err.code().to_string(),
                    error_message: err.to_string(),
                    retryable: err.is_retryable(),
                    occurred_at: Utc::now(),
                });
            }
        }
    }

    /// Documents that ended with a ledger row backed by stored bytes
    pub fn succeeded(&self) -> usize {
        self.created + self.already_present + self.repaired
    }

    /// Documents skipped for any reason
    pub fn skipped(&self) -> usize {
        self.unmatched_identity + self.unparsable + self.ambiguous + self.failed
    }
}
