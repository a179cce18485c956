//! Error types for payroll-ingest
//!
//! Two layers:
//! - [`DocumentError`]: per-document faults. Caught by the batch driver,
//!   folded into [`BatchResult`](crate::models::BatchResult) counters, never
//!   abort the batch.
//! - [`IngestError`]: fatal faults. Abort the whole call, no partial result.
//!
//! [`FetchError`] covers reading a stored receipt back by ledger id.

use crate::services::document_scanner::ScanError;
use crate::storage::StorageError;
use thiserror::Error;

/// Why a document yielded no identifier/period
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnparsableReason {
    /// The document could not be opened as a PDF
    #[error("document could not be opened: {0}")]
    Unreadable(String),

    /// No extractable text (image-only document)
    #[error("no extractable text")]
    NoText,

    /// Text present but no "Periodo del: D al D" phrase
    #[error("no pay period phrase found")]
    NoPeriod,

    /// Text present but no identifier-shaped token
    #[error("no identifier found")]
    NoIdentifier,
}

/// Per-document fault
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Unparsable document: {0}")]
    Unparsable(#[from] UnparsableReason),

    /// None of the candidates is present in the directory snapshot
    #[error("No directory match for candidates [{}]", .candidates.join(", "))]
    Unmatched { candidates: Vec<String> },

    /// Candidates match more than one employee and the policy rejects it
    #[error("Candidates match several employees [{}]", .employee_keys.join(", "))]
    Ambiguous { employee_keys: Vec<String> },

    /// Storage backend fault (including timeouts); never means "absent"
    #[error("Storage fault: {0}")]
    Storage(#[from] StorageError),
}

impl DocumentError {
    /// Stable machine-readable code for reporting
    pub fn code(&self) -> &'static str {
        match self {
            DocumentError::Unparsable(_) => "UNPARSABLE",
            DocumentError::Unmatched { .. } => "UNMATCHED",
            DocumentError::Ambiguous { .. } => "AMBIGUOUS",
            DocumentError::Storage(err) if err.is_timeout() => "STORAGE_TIMEOUT",
            DocumentError::Storage(_) => "STORAGE_FAULT",
        }
    }

    /// True for faults worth retrying by re-submitting the archive
    pub fn is_retryable(&self) -> bool {
        matches!(self, DocumentError::Storage(_))
    }
}

/// Batch-aborting fault
#[derive(Debug, Error)]
pub enum IngestError {
    /// The archive container is invalid
    #[error("Archive is corrupt: {0}")]
    ArchiveCorrupt(String),

    /// The scratch area could not be created, written or read
    #[error("Scratch area error: {0}")]
    Scratch(#[from] std::io::Error),

    /// The unpacked scratch area could not be walked
    #[error("Scratch scan error: {0}")]
    Scan(#[from] ScanError),

    /// Directory snapshot or ledger store failure
    #[error("Ledger store error: {0}")]
    Ledger(#[from] payroll_common::Error),

    /// A worker task failed unexpectedly
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<zip::result::ZipError> for IngestError {
    fn from(err: zip::result::ZipError) -> Self {
        IngestError::ArchiveCorrupt(err.to_string())
    }
}

/// Result type for fatal ingest operations
pub type IngestResult<T> = Result<T, IngestError>;

/// Failure to read back a stored receipt
#[derive(Debug, Error)]
pub enum FetchError {
    /// No ledger row has this id
    #[error("Receipt {0} not found")]
    ReceiptNotFound(i64),

    /// The row exists but its artifact is gone from storage
    #[error("Artifact of receipt {id} is missing at {locator}")]
    ArtifactMissing { id: i64, locator: String },

    #[error("Storage fault: {0}")]
    Storage(StorageError),

    #[error("Ledger store error: {0}")]
    Ledger(#[from] payroll_common::Error),
}

impl FetchError {
    /// Either the row or its artifact does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::ReceiptNotFound(_) | FetchError::ArtifactMissing { .. })
    }
}
