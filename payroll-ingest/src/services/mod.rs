//! Ingest pipeline services

pub mod archive;
pub mod batch_driver;
pub mod document_extractor;
pub mod document_scanner;
pub mod identity_resolver;
pub mod receipt_reader;
pub mod reconciler;

pub use batch_driver::BatchDriver;
pub use document_extractor::{DocumentExtractor, ExtractedDocument, ExtractionSource, PayPeriod};
pub use document_scanner::{DocumentScanner, ScanError};
pub use identity_resolver::{normalize_identifier, DirectoryIndex, IdentityResolver, ResolvedIdentity};
pub use receipt_reader::ReceiptReader;
pub use reconciler::Reconciler;
