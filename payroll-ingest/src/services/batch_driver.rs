//! Batch Driver
//!
//! Entry point of the pipeline: one call ingests one zip archive.
//!
//! 1. Validate the container (fatal [`IngestError::ArchiveCorrupt`])
//! 2. Unpack into a scratch [`TempDir`] owned by the call
//! 3. Load one directory snapshot and index it
//! 4. Run every document through the [`Reconciler`] in a bounded ordered
//!    stream, folding outcomes into a [`BatchResult`] in path order
//!
//! The scratch directory is removed when the call returns, on every path.

use crate::error::{IngestError, IngestResult, UnparsableReason};
use crate::models::{BatchResult, DocumentOutcome};
use crate::services::archive::{open_archive, unpack_archive, UnpackStats};
use crate::services::document_extractor::DocumentExtractor;
use crate::services::document_scanner::DocumentScanner;
use crate::services::identity_resolver::{DirectoryIndex, IdentityResolver};
use crate::services::reconciler::Reconciler;
use crate::storage::StorageBackend;
use crate::types::{DirectoryProvider, LedgerStore};
use futures::stream::{self, StreamExt};
use payroll_common::config::IngestConfig;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

const SCRATCH_PREFIX: &str = "payroll-batch-";

pub struct BatchDriver {
    directory: Arc<dyn DirectoryProvider>,
    reconciler: Reconciler,
    max_concurrent: usize,
}

impl BatchDriver {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        ledger: Arc<dyn LedgerStore>,
        directory: Arc<dyn DirectoryProvider>,
        config: &IngestConfig,
        storage_timeout: Duration,
    ) -> Self {
        let reconciler = Reconciler::new(
            DocumentExtractor::new(config.max_pages),
            IdentityResolver::new(config.ambiguity_policy),
            storage,
            ledger,
            storage_timeout,
        );
        Self {
            directory,
            reconciler,
            max_concurrent: config.max_concurrent_documents.max(1),
        }
    }

    /// Ingest one zip archive
    pub async fn ingest_archive(&self, bytes: &[u8]) -> IngestResult<BatchResult> {
        let batch_id = Uuid::new_v4();
        let span = tracing::info_span!("batch", %batch_id);
        self.run(batch_id, bytes).instrument(span).await
    }

    async fn run(&self, batch_id: Uuid, bytes: &[u8]) -> IngestResult<BatchResult> {
        let started = Instant::now();

        let entries = open_archive(bytes)?.len();
        info!(entries, size = bytes.len(), "Ingesting archive");

        let scratch = tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?;
        let unpacked = self.unpack(bytes, &scratch).await?;
        if unpacked.rejected > 0 {
            warn!(rejected = unpacked.rejected, "Archive entries with unsafe names were not unpacked");
        }

        let snapshot = self.directory.load_snapshot().await?;
        let index = DirectoryIndex::build(snapshot);
        debug!(employees = index.len(), "Directory snapshot loaded");

        let documents = DocumentScanner::new().scan(scratch.path())?;
        let root = scratch.path();
        let reconciler = &self.reconciler;
        let index = &index;

        let mut outcomes = stream::iter(documents)
            .map(move |path| async move {
                let name = document_name(root, &path);
                let outcome = match tokio::fs::read(&path).await {
                    Ok(contents) => reconciler.process(&name, contents, index).await?,
                    Err(e) => {
                        warn!(file = %name, "Failed to read unpacked document: {}", e);
                        DocumentOutcome::Skipped(UnparsableReason::Unreadable(e.to_string()).into())
                    }
                };
                Ok::<_, IngestError>((name, outcome))
            })
            .buffered(self.max_concurrent);

        let mut result = BatchResult::new(batch_id);
        result.rejected_entries = unpacked.rejected;
        while let Some(item) = outcomes.next().await {
            let (name, outcome) = item?;
            result.record(&name, outcome);
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            total = result.total_documents,
            created = result.created,
            already_present = result.already_present,
            repaired = result.repaired,
            unmatched = result.unmatched_identity,
            unparsable = result.unparsable,
            ambiguous = result.ambiguous,
            failed = result.failed,
            rejected_entries = result.rejected_entries,
            duration_ms = result.duration_ms,
            "Batch complete"
        );

        Ok(result)
    }

    async fn unpack(&self, bytes: &[u8], scratch: &TempDir) -> IngestResult<UnpackStats> {
        let owned = bytes.to_vec();
        let dest = scratch.path().to_path_buf();
        tokio::task::spawn_blocking(move || unpack_archive(&owned, &dest))
            .await
            .map_err(|e| IngestError::Internal(format!("unpack task failed: {}", e)))?
    }
}

/// Archive-relative name with `/` separators
fn document_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
