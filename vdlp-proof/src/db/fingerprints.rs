//! Fingerprint corpus store
//!
//! The corpus (`fingerprints`) is append-only: rows are inserted once a
//! submission is confirmed unique and are never updated or deleted.
//! `fingerprint_reservations` holds pending entries under the deferred
//! insertion policy; they count as corpus members for duplicate detection
//! until promoted or released.
//!
//! All functions take a connection so they can run inside the caller's
//! transaction.

use sha2::{Digest, Sha256};
use sqlx::SqliteConnection;
use std::collections::VecDeque;
use vdlp_common::db::FingerprintRecord;
use vdlp_common::{Error, Result};

/// Where a duplicate-check hit lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySource {
    /// Accepted corpus row
    Corpus,
    /// Pending reservation of an in-flight submission
    Reservation,
}

/// One candidate yielded by a corpus scan
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    pub id: i64,
    pub duration: f64,
    pub fingerprint: Vec<u8>,
    pub source: EntrySource,
}

/// Hex SHA-256 of the fingerprint bytes
pub fn fingerprint_hash(fingerprint: &[u8]) -> String {
    format!("{:x}", Sha256::digest(fingerprint))
}

/// Exact-duplicate lookup across corpus and reservations
pub async fn lookup_by_hash(conn: &mut SqliteConnection, hash: &str) -> Result<Option<EntrySource>> {
    let in_corpus: Option<i64> =
        sqlx::query_scalar("SELECT id FROM fingerprints WHERE fingerprint_hash = ? LIMIT 1")
            .bind(hash)
            .fetch_optional(&mut *conn)
            .await?;
    if in_corpus.is_some() {
        return Ok(Some(EntrySource::Corpus));
    }

    let reserved: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM fingerprint_reservations WHERE fingerprint_hash = ? LIMIT 1",
    )
    .bind(hash)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(reserved.map(|_| EntrySource::Reservation))
}

/// Load an accepted corpus row by digest
pub async fn get_by_hash(
    conn: &mut SqliteConnection,
    hash: &str,
) -> Result<Option<FingerprintRecord>> {
    let record = sqlx::query_as::<_, FingerprintRecord>(
        "SELECT id, duration, fingerprint, fingerprint_hash FROM fingerprints WHERE fingerprint_hash = ?",
    )
    .bind(hash)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(record)
}

/// Insert an accepted fingerprint into the corpus
pub async fn insert(
    conn: &mut SqliteConnection,
    duration: f64,
    fingerprint: &[u8],
    hash: &str,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO fingerprints (duration, fingerprint, fingerprint_hash) VALUES (?, ?, ?)",
    )
    .bind(duration)
    .bind(fingerprint)
    .bind(hash)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(hash = %hash, id = result.last_insert_rowid(), "Fingerprint added to corpus");
    Ok(result.last_insert_rowid())
}

/// Reserve a fingerprint pending the submission's validity decision
pub async fn reserve(
    conn: &mut SqliteConnection,
    duration: f64,
    fingerprint: &[u8],
    hash: &str,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO fingerprint_reservations (duration, fingerprint, fingerprint_hash) VALUES (?, ?, ?)",
    )
    .bind(duration)
    .bind(fingerprint)
    .bind(hash)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(hash = %hash, id = result.last_insert_rowid(), "Fingerprint reserved");
    Ok(result.last_insert_rowid())
}

/// Move a reservation into the corpus. Returns false if no reservation existed.
///
/// Run inside a transaction so the corpus insert and the reservation delete
/// land together.
pub async fn promote_reservation(conn: &mut SqliteConnection, hash: &str) -> Result<bool> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO fingerprints (duration, fingerprint, fingerprint_hash)
        SELECT duration, fingerprint, fingerprint_hash
        FROM fingerprint_reservations
        WHERE fingerprint_hash = ?
        "#,
    )
    .bind(hash)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if inserted == 0 {
        return Ok(false);
    }

    sqlx::query("DELETE FROM fingerprint_reservations WHERE fingerprint_hash = ?")
        .bind(hash)
        .execute(&mut *conn)
        .await?;

    Ok(true)
}

/// Drop a reservation (submission invalid or aborted)
pub async fn release_reservation(conn: &mut SqliteConnection, hash: &str) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM fingerprint_reservations WHERE fingerprint_hash = ?")
        .bind(hash)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(deleted > 0)
}

/// Delete reservations left behind by runs that died between gating and
/// finalization
pub async fn purge_stale_reservations(conn: &mut SqliteConnection, ttl_secs: u64) -> Result<u64> {
    let purged = sqlx::query(
        "DELETE FROM fingerprint_reservations WHERE reserved_at < datetime('now', ?)",
    )
    .bind(format!("-{} seconds", ttl_secs))
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if purged > 0 {
        tracing::warn!(purged, ttl_secs, "Purged stale fingerprint reservations");
    }
    Ok(purged)
}

/// Number of accepted corpus rows
pub async fn corpus_size(conn: &mut SqliteConnection) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM fingerprints")
        .fetch_one(&mut *conn)
        .await?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanStage {
    Corpus,
    Reservations,
    Done,
}

/// Lazy, restartable scan over the corpus followed by pending reservations
///
/// Rows are fetched in pages of `page_size` using keyset pagination on the
/// row id, so memory stays O(page) and scan order is insertion order.
#[derive(Debug)]
pub struct CorpusScan {
    page_size: u32,
    stage: ScanStage,
    last_id: i64,
    buffer: VecDeque<CorpusEntry>,
    pages_fetched: u32,
}

impl CorpusScan {
    pub fn new(page_size: u32) -> Result<Self> {
        if page_size < 1 {
            return Err(Error::InvalidArgument("page_size must be >= 1".to_string()));
        }
        Ok(Self {
            page_size,
            stage: ScanStage::Corpus,
            last_id: 0,
            buffer: VecDeque::new(),
            pages_fetched: 0,
        })
    }

    /// Rewind to the first corpus row
    pub fn restart(&mut self) {
        self.stage = ScanStage::Corpus;
        self.last_id = 0;
        self.buffer.clear();
        self.pages_fetched = 0;
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Next candidate, fetching a new page when the buffer runs dry
    pub async fn next(&mut self, conn: &mut SqliteConnection) -> Result<Option<CorpusEntry>> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Ok(Some(entry));
            }

            let (sql, source) = match self.stage {
                ScanStage::Corpus => (
                    "SELECT id, duration, fingerprint FROM fingerprints WHERE id > ? ORDER BY id LIMIT ?",
                    EntrySource::Corpus,
                ),
                ScanStage::Reservations => (
                    "SELECT id, duration, fingerprint FROM fingerprint_reservations WHERE id > ? ORDER BY id LIMIT ?",
                    EntrySource::Reservation,
                ),
                ScanStage::Done => return Ok(None),
            };

            let rows: Vec<(i64, f64, Vec<u8>)> = sqlx::query_as(sql)
                .bind(self.last_id)
                .bind(self.page_size as i64)
                .fetch_all(&mut *conn)
                .await?;
            self.pages_fetched += 1;

            tracing::debug!(
                stage = ?self.stage,
                after_id = self.last_id,
                rows = rows.len(),
                "Fetched corpus page"
            );

            if (rows.len() as u32) < self.page_size {
                self.advance_stage();
            } else if let Some((id, _, _)) = rows.last() {
                self.last_id = *id;
            }

            self.buffer.extend(rows.into_iter().map(|(id, duration, fingerprint)| CorpusEntry {
                id,
                duration,
                fingerprint,
                source,
            }));
        }
    }

    fn advance_stage(&mut self) {
        self.stage = match self.stage {
            ScanStage::Corpus => ScanStage::Reservations,
            ScanStage::Reservations | ScanStage::Done => ScanStage::Done,
        };
        self.last_id = 0;
    }
}
