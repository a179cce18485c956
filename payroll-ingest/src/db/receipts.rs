//! Receipt ledger operations
//!
//! The insert is a single `INSERT ... ON CONFLICT DO NOTHING RETURNING id`
//! against the UNIQUE dedup key, so two batches racing on the same document
//! can never produce two rows.

use crate::types::{InsertOutcome, LedgerStore, ReceiptKey};
use crate::utils::retry_on_lock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use payroll_common::db::{NewReceipt, ReceiptRecord};
use payroll_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Ledger store backed by the `receipts` table
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            max_lock_wait_ms,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for SqliteLedger {
    async fn find_receipt(&self, key: &ReceiptKey) -> Result<Option<ReceiptRecord>> {
        find_receipt(&self.pool, key).await
    }

    async fn get_receipt(&self, id: i64) -> Result<Option<ReceiptRecord>> {
        find_receipt_by_id(&self.pool, id).await
    }

    async fn insert_receipt(&self, receipt: &NewReceipt) -> Result<InsertOutcome> {
        retry_on_lock("receipt insert", self.max_lock_wait_ms, || {
            insert_receipt(&self.pool, receipt)
        })
        .await
    }

    async fn update_locator(&self, id: i64, locator: &str) -> Result<()> {
        retry_on_lock("receipt locator update", self.max_lock_wait_ms, || {
            update_locator(&self.pool, id, locator)
        })
        .await
    }
}

/// Load the row matching the exact dedup key
pub async fn find_receipt(pool: &SqlitePool, key: &ReceiptKey) -> Result<Option<ReceiptRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, employee_key, identifier, period, file_name, locator, ingested_at
        FROM receipts
        WHERE employee_key = ? AND identifier = ? AND period = ? AND file_name = ?
        "#,
    )
    .bind(&key.employee_key)
    .bind(&key.identifier)
    .bind(&key.period)
    .bind(&key.file_name)
    .fetch_optional(pool)
    .await?;

    row.map(|r| receipt_from_row(&r)).transpose()
}

/// Load one row by id
pub async fn find_receipt_by_id(pool: &SqlitePool, id: i64) -> Result<Option<ReceiptRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, employee_key, identifier, period, file_name, locator, ingested_at
        FROM receipts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| receipt_from_row(&r)).transpose()
}

/// Insert a row unless its dedup key already exists
pub async fn insert_receipt(pool: &SqlitePool, receipt: &NewReceipt) -> Result<InsertOutcome> {
    let inserted: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO receipts (employee_key, identifier, period, file_name, locator, ingested_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(employee_key, identifier, period, file_name) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&receipt.employee_key)
    .bind(&receipt.identifier)
    .bind(&receipt.period)
    .bind(&receipt.file_name)
    .bind(&receipt.locator)
    .bind(receipt.ingested_at.to_rfc3339())
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(id) => Ok(InsertOutcome::Inserted(receipt.clone().into_record(id))),
        None => {
            let key = ReceiptKey::of(receipt);
            let existing = find_receipt(pool, &key).await?.ok_or_else(|| {
                Error::Internal(format!(
                    "Insert of {} conflicted but no row holds its dedup key",
                    receipt.file_name
                ))
            })?;
            Ok(InsertOutcome::Conflict(existing))
        }
    }
}

/// Replace the locator of an existing row
pub async fn update_locator(pool: &SqlitePool, id: i64, locator: &str) -> Result<()> {
    let result = sqlx::query("UPDATE receipts SET locator = ? WHERE id = ?")
        .bind(locator)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("receipt {}", id)));
    }
    Ok(())
}

/// Count total rows in the ledger
pub async fn count_receipts(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM receipts")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Receipts of one identifier, newest first
pub async fn list_receipts_for_identifier(
    pool: &SqlitePool,
    identifier: &str,
) -> Result<Vec<ReceiptRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, employee_key, identifier, period, file_name, locator, ingested_at
        FROM receipts
        WHERE identifier = ?
        ORDER BY ingested_at DESC, id DESC
        "#,
    )
    .bind(identifier.to_uppercase())
    .fetch_all(pool)
    .await?;

    rows.iter().map(receipt_from_row).collect()
}

fn receipt_from_row(row: &SqliteRow) -> Result<ReceiptRecord> {
    let ingested_at_str: String = row.get("ingested_at");
    let ingested_at = DateTime::parse_from_rfc3339(&ingested_at_str)
        .map_err(|e| Error::InvalidInput(format!("ingested_at '{}': {}", ingested_at_str, e)))?
        .with_timezone(&Utc);

    Ok(ReceiptRecord {
        id: row.get("id"),
        employee_key: row.get("employee_key"),
        identifier: row.get("identifier"),
        period: row.get("period"),
        file_name: row.get("file_name"),
        locator: row.get("locator"),
        ingested_at,
    })
}
