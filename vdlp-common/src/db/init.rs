//! Database initialization
//!
//! Opens (or creates) the SQLite database and makes sure the corpus,
//! reservation and identity tables exist. Safe to call on every start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// SQLite busy timeout applied to every pooled connection
pub const BUSY_TIMEOUT_MS: u64 = 250;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas go on the connect options so every pooled connection gets them.
    // WAL keeps readers unblocked while the gating transaction holds the write lock.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table the proof pipeline needs (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_fingerprints_table(pool).await?;
    create_fingerprint_reservations_table(pool).await?;
    create_identities_table(pool).await?;
    Ok(())
}

/// Append-only corpus of accepted fingerprints
pub async fn create_fingerprints_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fingerprints (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            duration REAL NOT NULL CHECK (duration > 0),
            fingerprint BLOB NOT NULL,
            fingerprint_hash TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Pending corpus entries held between gating and the validity decision
pub async fn create_fingerprint_reservations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fingerprint_reservations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            duration REAL NOT NULL CHECK (duration > 0),
            fingerprint BLOB NOT NULL,
            fingerprint_hash TEXT NOT NULL UNIQUE,
            reserved_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Contributor identities and their violation counters
pub async fn create_identities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS identities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identity TEXT NOT NULL UNIQUE,
            violation_count INTEGER DEFAULT 0 CHECK (violation_count >= 0),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn table_names(pool: &SqlitePool) -> Vec<String> {
        sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_init_creates_tables() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("vdlp.db");

        let pool = init_database(&db_path).await.unwrap();
        assert!(db_path.exists());

        let tables = table_names(&pool).await;
        assert_eq!(
            tables,
            vec!["fingerprint_reservations", "fingerprints", "identities"]
        );
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("vdlp.db");

        let pool = init_database(&db_path).await.unwrap();
        sqlx::query("INSERT INTO identities (identity) VALUES ('0xabc')")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let pool = init_database(&db_path).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM identities")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_fingerprint_hash_is_unique() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("vdlp.db")).await.unwrap();

        let insert = "INSERT INTO fingerprints (duration, fingerprint, fingerprint_hash) VALUES (1.5, x'0102', 'abc')";
        sqlx::query(insert).execute(&pool).await.unwrap();
        let second = sqlx::query(insert).execute(&pool).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_identity_defaults_to_zero_violations() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("vdlp.db")).await.unwrap();

        sqlx::query("INSERT INTO identities (identity) VALUES ('someone@example.com')")
            .execute(&pool)
            .await
            .unwrap();
        let count: Option<i64> =
            sqlx::query_scalar("SELECT violation_count FROM identities WHERE identity = ?")
                .bind("someone@example.com")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, Some(0));
    }
}
