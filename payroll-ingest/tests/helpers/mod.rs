//! Shared helpers for payroll-ingest integration tests

#![allow(dead_code)]

pub mod archive_builder;
pub mod fixtures;
pub mod pdf_builder;
