//! Uniqueness engine: exact and near-duplicate detection over the corpus
//!
//! **Algorithm:**
//! 1. SHA-256 the fingerprint bytes
//! 2. Exact fast path: same digest in the corpus or a pending reservation → 0
//! 3. Near-duplicate scan in insertion order, stopping at the first candidate
//!    whose similarity reaches the threshold → 0
//! 4. Otherwise record the fingerprint (insert or reserve, per policy) → 1
//!
//! Runs on the caller's connection. The orchestrator supplies a connection
//! inside its gating transaction so that check and insert are one atomic unit.

use crate::collaborators::FingerprintComparator;
use crate::db::fingerprints::{self, CorpusScan, EntrySource};
use sqlx::SqliteConnection;
use std::sync::Arc;
use vdlp_common::config::InsertionPolicy;
use vdlp_common::{Error, Result};

/// Why a submission was judged a duplicate
#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateReason {
    /// Same fingerprint digest already present
    ExactHash { source: EntrySource },
    /// A candidate scored at or above the similarity threshold
    NearDuplicate {
        similarity: f64,
        matched_id: i64,
        source: EntrySource,
    },
}

/// Uniqueness decision plus what led to it
#[derive(Debug, Clone, PartialEq)]
pub struct UniquenessVerdict {
    /// 1 = unique, 0 = duplicate
    pub uniqueness: u8,
    pub fingerprint_hash: String,
    pub reason: Option<DuplicateReason>,
    pub candidates_compared: u64,
    /// Where the fingerprint was recorded, if it was unique
    pub recorded: Option<EntrySource>,
}

impl UniquenessVerdict {
    pub fn is_unique(&self) -> bool {
        self.uniqueness == 1
    }

    fn duplicate(hash: String, reason: DuplicateReason, candidates_compared: u64) -> Self {
        Self {
            uniqueness: 0,
            fingerprint_hash: hash,
            reason: Some(reason),
            candidates_compared,
            recorded: None,
        }
    }
}

/// Uniqueness engine
pub struct UniquenessEngine {
    comparator: Arc<dyn FingerprintComparator>,
    page_size: u32,
    insertion_policy: InsertionPolicy,
}

impl UniquenessEngine {
    pub fn new(
        comparator: Arc<dyn FingerprintComparator>,
        page_size: u32,
        insertion_policy: InsertionPolicy,
    ) -> Result<Self> {
        if page_size < 1 {
            return Err(Error::InvalidArgument("page_size must be >= 1".to_string()));
        }
        Ok(Self {
            comparator,
            page_size,
            insertion_policy,
        })
    }

    pub fn insertion_policy(&self) -> InsertionPolicy {
        self.insertion_policy
    }

    /// Decide uniqueness of `fingerprint` and record it when unique
    ///
    /// Arguments are validated before the store is touched. Comparator
    /// errors abort the evaluation; the caller's transaction discards any
    /// partial work.
    pub async fn evaluate(
        &self,
        conn: &mut SqliteConnection,
        fingerprint: &[u8],
        duration: f64,
        threshold: f64,
    ) -> Result<UniquenessVerdict> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidArgument(format!(
                "similarity threshold must be between 0.0 and 1.0, got {}",
                threshold
            )));
        }
        if !(duration.is_finite() && duration > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "duration must be positive, got {}",
                duration
            )));
        }
        if fingerprint.is_empty() {
            return Err(Error::InvalidArgument("fingerprint is empty".to_string()));
        }

        let hash = fingerprints::fingerprint_hash(fingerprint);

        if let Some(source) = fingerprints::lookup_by_hash(conn, &hash).await? {
            tracing::info!(hash = %hash, ?source, "Exact duplicate fingerprint");
            return Ok(UniquenessVerdict::duplicate(
                hash,
                DuplicateReason::ExactHash { source },
                0,
            ));
        }

        let mut scan = CorpusScan::new(self.page_size)?;
        let mut compared: u64 = 0;
        while let Some(candidate) = scan.next(conn).await? {
            let similarity = self.comparator.compare(
                (duration, fingerprint),
                (candidate.duration, candidate.fingerprint.as_slice()),
            )?;
            compared += 1;

            // Comparator contract is [0,1]; NaN fails this check too
            if !(0.0..=1.0).contains(&similarity) {
                return Err(Error::Collaborator(format!(
                    "comparator returned {} for candidate {}, expected [0,1]",
                    similarity, candidate.id
                )));
            }

            tracing::debug!(candidate_id = candidate.id, similarity, "Compared fingerprint");

            if similarity >= threshold {
                tracing::info!(
                    hash = %hash,
                    matched_id = candidate.id,
                    source = ?candidate.source,
                    similarity,
                    compared,
                    "Near-duplicate fingerprint"
                );
                return Ok(UniquenessVerdict::duplicate(
                    hash,
                    DuplicateReason::NearDuplicate {
                        similarity,
                        matched_id: candidate.id,
                        source: candidate.source,
                    },
                    compared,
                ));
            }
        }

        let recorded = match self.insertion_policy {
            InsertionPolicy::Immediate => {
                fingerprints::insert(conn, duration, fingerprint, &hash).await?;
                EntrySource::Corpus
            }
            InsertionPolicy::Deferred => {
                fingerprints::reserve(conn, duration, fingerprint, &hash).await?;
                EntrySource::Reservation
            }
        };

        tracing::info!(
            hash = %hash,
            compared,
            pages = scan.pages_fetched(),
            ?recorded,
            "Fingerprint is unique"
        );

        Ok(UniquenessVerdict {
            uniqueness: 1,
            fingerprint_hash: hash,
            reason: None,
            candidates_compared: compared,
            recorded: Some(recorded),
        })
    }
}
