//! # Payroll Common Library
//!
//! Shared code for the payroll receipt services including:
//! - Error and result types
//! - Configuration loading (TOML + environment)
//! - Database initialization and row models for the
//!   `employees` directory and the `receipts` ledger

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
