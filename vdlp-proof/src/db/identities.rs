//! Identity / violation store
//!
//! One row per contributor identity. The proof pipeline only reads the
//! violation counter; `increment_violations` exists for moderation tooling.

use sqlx::SqliteConnection;
use vdlp_common::db::IdentityRecord;
use vdlp_common::{Error, Result};

/// Load an identity record
pub async fn find(conn: &mut SqliteConnection, identity: &str) -> Result<Option<IdentityRecord>> {
    let record = sqlx::query_as::<_, IdentityRecord>(
        "SELECT id, identity, violation_count FROM identities WHERE identity = ?",
    )
    .bind(identity)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(record)
}

/// Create an identity with zero violations
pub async fn create(conn: &mut SqliteConnection, identity: &str) -> Result<IdentityRecord> {
    let result = sqlx::query("INSERT INTO identities (identity, violation_count) VALUES (?, 0)")
        .bind(identity)
        .execute(&mut *conn)
        .await?;

    tracing::info!(identity = %identity, "Registered new contributor identity");

    Ok(IdentityRecord {
        id: result.last_insert_rowid(),
        identity: identity.to_string(),
        violation_count: Some(0),
    })
}

/// Load an identity, creating it on first sight. Returns `(record, created)`.
pub async fn find_or_create(
    conn: &mut SqliteConnection,
    identity: &str,
) -> Result<(IdentityRecord, bool)> {
    match find(conn, identity).await? {
        Some(record) => Ok((record, false)),
        None => Ok((create(conn, identity).await?, true)),
    }
}

/// Add `by` violations to an existing identity; returns the new count
pub async fn increment_violations(
    conn: &mut SqliteConnection,
    identity: &str,
    by: i64,
) -> Result<i64> {
    if by < 0 {
        return Err(Error::InvalidArgument(format!(
            "violation increment must be >= 0, got {}",
            by
        )));
    }

    let count: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE identities
        SET violation_count = COALESCE(violation_count, 0) + ?
        WHERE identity = ?
        RETURNING violation_count
        "#,
    )
    .bind(by)
    .bind(identity)
    .fetch_optional(&mut *conn)
    .await?;

    count.ok_or_else(|| Error::MissingIdentity(identity.to_string()))
}
