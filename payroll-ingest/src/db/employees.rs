//! Employee directory reads
//!
//! The `employees` table belongs to the roster subsystem; the pipeline only
//! reads it. `save_employee` exists for seeding databases.

use crate::types::DirectoryProvider;
use async_trait::async_trait;
use payroll_common::db::DirectoryRecord;
use payroll_common::Result;
use sqlx::{Row, SqlitePool};

/// Directory snapshot provider backed by the `employees` table
#[derive(Clone)]
pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl SqliteDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DirectoryProvider for SqliteDirectory {
    async fn load_snapshot(&self) -> Result<Vec<DirectoryRecord>> {
        load_all_employees(&self.pool).await
    }
}

/// Load every directory entry
pub async fn load_all_employees(pool: &SqlitePool) -> Result<Vec<DirectoryRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT employee_key, identifier, display_name
        FROM employees
        ORDER BY identifier
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| DirectoryRecord {
            employee_key: row.get("employee_key"),
            identifier: row.get("identifier"),
            display_name: row.get("display_name"),
        })
        .collect())
}

/// Insert or update a directory entry keyed by identifier
pub async fn save_employee(pool: &SqlitePool, record: &DirectoryRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO employees (identifier, employee_key, display_name)
        VALUES (?, ?, ?)
        ON CONFLICT(identifier) DO UPDATE SET
            employee_key = excluded.employee_key,
            display_name = excluded.display_name
        "#,
    )
    .bind(&record.identifier)
    .bind(&record.employee_key)
    .bind(&record.display_name)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        payroll_common::db::init_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_snapshot_returns_saved_employees() {
        let pool = test_pool().await;
        save_employee(
            &pool,
            &DirectoryRecord {
                employee_key: "1234".to_string(),
                identifier: "ABCD850101XYZ".to_string(),
                display_name: "Ana Beltrán".to_string(),
            },
        )
        .await
        .unwrap();

        let snapshot = SqliteDirectory::new(pool).load_snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].employee_key, "1234");
        assert_eq!(snapshot[0].display_name, "Ana Beltrán");
    }

    #[tokio::test]
    async fn test_save_employee_updates_in_place() {
        let pool = test_pool().await;
        let mut record = DirectoryRecord {
            employee_key: "1234".to_string(),
            identifier: "ABCD850101XYZ".to_string(),
            display_name: String::new(),
        };
        save_employee(&pool, &record).await.unwrap();

        record.employee_key = "9999".to_string();
        save_employee(&pool, &record).await.unwrap();

        let all = load_all_employees(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].employee_key, "9999");
    }
}
