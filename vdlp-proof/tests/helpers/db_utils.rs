//! Database Test Utilities

use anyhow::Result;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create a temporary database with the full schema
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let pool = vdlp_common::db::init_database(&temp_dir.path().join("test_vdlp.db")).await?;
    Ok((temp_dir, pool))
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Make every INSERT into `table` fail with an SQL error
pub async fn inject_insert_failure(pool: &SqlitePool, table: &str) {
    let sql = format!(
        "CREATE TRIGGER fail_insert_{table} BEFORE INSERT ON {table} \
         BEGIN SELECT RAISE(ABORT, 'injected failure'); END"
    );
    sqlx::query(&sql).execute(pool).await.unwrap();
}

/// Create or overwrite an identity with the given violation count
pub async fn set_violations(pool: &SqlitePool, identity: &str, count: i64) {
    sqlx::query(
        "INSERT INTO identities (identity, violation_count) VALUES (?, ?) \
         ON CONFLICT(identity) DO UPDATE SET violation_count = excluded.violation_count",
    )
    .bind(identity)
    .bind(count)
    .execute(pool)
    .await
    .unwrap();
}
