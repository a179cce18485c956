//! Database initialization
//!
//! Opens (or creates) the SQLite database and makes sure the `employees`
//! directory table and the `receipts` ledger exist. Safe to call repeatedly.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets concurrent batches read while one writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create every table this pipeline touches (idempotent)
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    create_employees_table(pool).await?;
    create_receipts_table(pool).await?;
    Ok(())
}

/// Employee directory, maintained by the roster subsystem
pub async fn create_employees_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS employees (
            identifier TEXT PRIMARY KEY,
            employee_key TEXT NOT NULL,
            display_name TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_employees_key ON employees(employee_key)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Receipt ledger; the UNIQUE constraint is the dedup key
pub async fn create_receipts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS receipts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_key TEXT NOT NULL,
            identifier TEXT NOT NULL,
            period TEXT NOT NULL,
            file_name TEXT NOT NULL,
            locator TEXT NOT NULL,
            ingested_at TEXT NOT NULL,
            UNIQUE (employee_key, identifier, period, file_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_receipts_identifier ON receipts(identifier)")
        .execute(pool)
        .await?;

    Ok(())
}
