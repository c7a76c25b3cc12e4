//! Lock-contention retry for SQLite writers
//!
//! Each attempt must be a complete unit of work (a fresh transaction),
//! never a partial replay.

use std::time::{Duration, Instant};
use vdlp_common::Result;

const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Run `operation` until it succeeds, fails with something other than lock
/// contention, or `max_wait_ms` has passed since the first attempt.
///
/// Backoff starts at 10 ms and doubles up to 1 s. The last lock error is
/// returned unchanged so callers still see `Error::Database`.
pub async fn retry_on_lock<F, Fut, T>(
    label: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let deadline = Instant::now() + Duration::from_millis(max_wait_ms);
    let mut backoff = Duration::from_millis(10);
    let mut retries = 0u32;

    loop {
        match operation().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::debug!(label, retries, "Lock cleared");
                }
                return Ok(value);
            }
            Err(err) if err.is_lock_contention() && Instant::now() < deadline => {
                retries += 1;
                tracing::warn!(
                    label,
                    retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "Database locked, backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            Err(err) => {
                if err.is_lock_contention() {
                    tracing::error!(
                        label,
                        retries,
                        max_wait_ms,
                        "Gave up waiting for database lock"
                    );
                }
                return Err(err);
            }
        }
    }
}
