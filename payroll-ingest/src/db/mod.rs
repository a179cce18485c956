//! SQLite access for the ingest pipeline
//!
//! Tables are created by [`payroll_common::db::init_database`]; this module
//! implements the [`LedgerStore`](crate::types::LedgerStore) and
//! [`DirectoryProvider`](crate::types::DirectoryProvider) boundaries on top.

pub mod employees;
pub mod receipts;

pub use employees::SqliteDirectory;
pub use receipts::SqliteLedger;
