//! Monitored write transactions
//!
//! Wraps the gating transaction so connection wait and hold times show up in
//! the logs. A long hold here blocks every other submitter, because the
//! transaction owns the SQLite write lock from its first statement.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::time::Instant;
use vdlp_common::Result;

/// Write transaction that logs acquisition and release timing
///
/// Dropping it without `commit` rolls back (sqlx semantics).
pub struct MonitoredTransaction {
    tx: Transaction<'static, Sqlite>,
    caller: &'static str,
    acquired_at: Instant,
}

impl MonitoredTransaction {
    /// Connection to run statements on inside the transaction
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Commit the transaction and log release timing
    pub async fn commit(self) -> Result<()> {
        let held_ms = self.acquired_at.elapsed().as_millis();
        self.tx.commit().await?;

        if held_ms > 2000 {
            tracing::warn!(
                caller = self.caller,
                held_ms = held_ms,
                "LONG TRANSACTION - write lock held for extended period"
            );
        } else if held_ms > 1000 {
            tracing::info!(
                caller = self.caller,
                held_ms = held_ms,
                "Transaction held longer than expected (>1s)"
            );
        } else {
            tracing::debug!(caller = self.caller, held_ms = held_ms, "Connection released (commit)");
        }

        Ok(())
    }

    /// Roll the transaction back and log release timing
    pub async fn rollback(self) -> Result<()> {
        let held_ms = self.acquired_at.elapsed().as_millis();
        self.tx.rollback().await?;

        if held_ms > 2000 {
            tracing::warn!(
                caller = self.caller,
                held_ms = held_ms,
                "LONG TRANSACTION - write lock held for extended period before rollback"
            );
        } else {
            tracing::debug!(caller = self.caller, held_ms = held_ms, "Connection released (rollback)");
        }

        Ok(())
    }
}

/// Begin a `BEGIN IMMEDIATE` transaction with timing logs
///
/// IMMEDIATE takes the database write lock up front, so the
/// check-then-insert sequence of two concurrent submissions is serialized
/// and mutually near-duplicate files cannot both be accepted.
pub async fn begin_immediate(
    pool: &SqlitePool,
    caller: &'static str,
) -> Result<MonitoredTransaction> {
    let start = Instant::now();
    tracing::debug!(caller = caller, "Write transaction requested");

    let tx = pool.begin_with("BEGIN IMMEDIATE").await?;

    let wait_ms = start.elapsed().as_millis();
    if wait_ms > 1000 {
        tracing::warn!(
            caller = caller,
            wait_ms = wait_ms,
            "SLOW LOCK ACQUISITION - another submission holds the write lock"
        );
    } else {
        tracing::debug!(caller = caller, wait_ms = wait_ms, "Write transaction acquired");
    }

    Ok(MonitoredTransaction {
        tx,
        caller,
        acquired_at: Instant::now(),
    })
}
