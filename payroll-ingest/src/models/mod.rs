//! Data models for batch ingestion

pub mod batch_result;

pub use batch_result::{BatchResult, DocumentFailure, DocumentOutcome};
