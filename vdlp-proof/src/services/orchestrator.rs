//! Proof orchestrator
//!
//! Sequences one submission end to end:
//!
//! ```text
//! submission -> extract fingerprint
//!            -> [BEGIN IMMEDIATE] ownership, uniqueness [COMMIT] (retried on lock)
//!            -> authenticity + quality inference              (one time budget)
//!            -> validity + score
//!            -> finalize reservation [promote | release]
//!            -> ProofRecord
//! ```
//!
//! Any error aborts the run with no record. Domain rejections (banned
//! contributor, duplicate, synthetic, low quality) are successful runs with
//! `valid = false`.

use crate::collaborators::{
    AuthenticityClassifier, ChromaprintComparator, ChromaprintExtractor, ExtractedFingerprint,
    FingerprintComparator, FingerprintExtractor, InferenceClient, InferenceQualityAssessor,
    QualityAssessor, SegmentedAuthenticity,
};
use crate::db::fingerprints::{self, EntrySource};
use crate::models::{ProofRecord, Submission};
use crate::services::ownership::OwnershipEvaluator;
use crate::services::scoring::{self, Assessment, Signals};
use crate::services::uniqueness::{DuplicateReason, UniquenessEngine, UniquenessVerdict};
use crate::utils::{begin_immediate, retry_on_lock};
use serde_json::{json, Map, Value};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use vdlp_common::config::EvaluationOrder;
use vdlp_common::{Error, ProofConfig, Result};

/// Collaborator set used by the orchestrator
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn FingerprintExtractor>,
    pub comparator: Arc<dyn FingerprintComparator>,
    pub authenticity: Arc<dyn AuthenticityClassifier>,
    pub quality: Arc<dyn QualityAssessor>,
}

impl Collaborators {
    /// Production wiring: libchromaprint, Chromaprint matcher, inference service
    pub fn from_config(config: &ProofConfig) -> Result<Self> {
        let client = Arc::new(InferenceClient::new(&config.inference)?);
        Ok(Self {
            extractor: Arc::new(ChromaprintExtractor::new(config.fingerprint_length_secs)),
            comparator: Arc::new(ChromaprintComparator::new()),
            authenticity: Arc::new(SegmentedAuthenticity::new(Arc::clone(&client))),
            quality: Arc::new(InferenceQualityAssessor::new(client)),
        })
    }
}

/// Result of the transactional phase
#[derive(Debug, Clone)]
struct GateOutcome {
    ownership: u8,
    uniqueness: UniquenessVerdict,
}

impl GateOutcome {
    fn passed(&self) -> bool {
        self.ownership == 1 && self.uniqueness.is_unique()
    }
}

/// Result of model inference
#[derive(Debug, Clone, Copy)]
struct InferenceOutcome {
    probability_real: f64,
    quality: f64,
}

pub struct ProofOrchestrator {
    pool: SqlitePool,
    config: ProofConfig,
    ownership: OwnershipEvaluator,
    uniqueness: UniquenessEngine,
    extractor: Arc<dyn FingerprintExtractor>,
    authenticity: Arc<dyn AuthenticityClassifier>,
    quality: Arc<dyn QualityAssessor>,
}

impl ProofOrchestrator {
    /// Build an orchestrator; rejects invalid configuration up front
    pub fn new(pool: SqlitePool, config: ProofConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let ownership =
            OwnershipEvaluator::new(config.identity_policy, config.violation_threshold)?;
        let uniqueness = UniquenessEngine::new(
            collaborators.comparator,
            config.scan_page_size,
            config.insertion_policy,
        )?;

        Ok(Self {
            pool,
            config,
            ownership,
            uniqueness,
            extractor: collaborators.extractor,
            authenticity: collaborators.authenticity,
            quality: collaborators.quality,
        })
    }

    /// Evaluate one submission and build its proof record
    pub async fn process(&self, submission: &Submission) -> Result<ProofRecord> {
        if !submission.audio_path.is_file() {
            return Err(Error::InputMissing(format!(
                "audio file not found: {}",
                submission.audio_path.display()
            )));
        }
        if submission.identity.trim().is_empty() {
            return Err(Error::InputMissing("identity is empty".to_string()));
        }

        tracing::info!(
            submission_id = %submission.submission_id,
            order = ?self.config.evaluation_order,
            policy = ?self.uniqueness.insertion_policy(),
            "Processing submission"
        );

        let fingerprint = self.extractor.extract(&submission.audio_path).await?;

        let (gate, inference) = match self.config.evaluation_order {
            EvaluationOrder::CheapFirst => {
                let gate = self.gate(&submission.identity, &fingerprint).await?;

                let inference = if gate.passed() || self.config.infer_rejected {
                    match self.infer(&submission.audio_path).await {
                        Ok(outcome) => Some(outcome),
                        Err(e) => {
                            self.abandon(&gate.uniqueness).await;
                            return Err(e);
                        }
                    }
                } else {
                    tracing::info!(
                        submission_id = %submission.submission_id,
                        "Gate rejected submission, skipping inference"
                    );
                    None
                };
                (gate, inference)
            }
            EvaluationOrder::ExpensiveFirst => {
                let inference = self.infer(&submission.audio_path).await?;
                let gate = self.gate(&submission.identity, &fingerprint).await?;
                (gate, Some(inference))
            }
        };

        let signals = Signals {
            ownership: gate.ownership,
            uniqueness: gate.uniqueness.uniqueness,
            authenticity: inference
                .map(|i| {
                    scoring::authenticity_signal(
                        i.probability_real,
                        self.config.authenticity_threshold,
                    )
                })
                .unwrap_or(0),
            quality: inference.map(|i| i.quality).unwrap_or(0.0),
        };
        let assessment = scoring::assess(&signals, self.config.quality_gate);

        self.finalize(&gate.uniqueness, assessment.valid).await?;

        tracing::info!(
            submission_id = %submission.submission_id,
            valid = assessment.valid,
            score = assessment.score,
            ownership = signals.ownership,
            uniqueness = signals.uniqueness,
            authenticity = signals.authenticity,
            quality = signals.quality,
            "Proof generated"
        );

        Ok(self.build_record(submission, &fingerprint, &gate, inference, &signals, &assessment))
    }

    /// Ownership then uniqueness inside one `BEGIN IMMEDIATE` transaction
    ///
    /// Each retry is a fresh transaction; a failed attempt is rolled back
    /// completely, including any identity row it created.
    async fn gate(&self, identity: &str, fingerprint: &ExtractedFingerprint) -> Result<GateOutcome> {
        retry_on_lock("proof_gate", self.config.max_lock_wait_ms, move || async move {
            let mut tx = begin_immediate(&self.pool, "proof_gate").await?;

            let outcome = async {
                let ownership = self.ownership.evaluate(tx.conn(), identity).await?;
                let uniqueness = self
                    .uniqueness
                    .evaluate(
                        tx.conn(),
                        &fingerprint.fingerprint,
                        fingerprint.duration,
                        self.config.similarity_threshold,
                    )
                    .await?;
                Ok::<_, Error>(GateOutcome {
                    ownership,
                    uniqueness,
                })
            }
            .await;

            match outcome {
                Ok(outcome) => {
                    tx.commit().await?;
                    Ok(outcome)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Gating transaction failed, rolling back");
                    if let Err(rollback_err) = tx.rollback().await {
                        tracing::error!(error = %rollback_err, "Rollback failed");
                    }
                    Err(e)
                }
            }
        })
        .await
    }

    /// Authenticity and quality inference under one shared time budget
    async fn infer(&self, audio: &Path) -> Result<InferenceOutcome> {
        let budget = Duration::from_secs(self.config.inference_timeout_secs);
        match tokio::time::timeout(budget, self.run_inference(audio)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    timeout_secs = self.config.inference_timeout_secs,
                    "Inference timed out"
                );
                Err(Error::Timeout(format!(
                    "inference exceeded {}s",
                    self.config.inference_timeout_secs
                )))
            }
        }
    }

    async fn run_inference(&self, audio: &Path) -> Result<InferenceOutcome> {
        let probability_real = self.authenticity.probability_real(audio).await?;
        if !(0.0..=1.0).contains(&probability_real) {
            return Err(Error::Collaborator(format!(
                "authenticity probability out of range: {}",
                probability_real
            )));
        }

        let quality = self.quality.assess(audio).await?.quality_score()?;

        tracing::debug!(probability_real, quality, "Inference complete");
        Ok(InferenceOutcome {
            probability_real,
            quality,
        })
    }

    /// Promote a valid submission's reservation into the corpus, release it otherwise
    async fn finalize(&self, verdict: &UniquenessVerdict, valid: bool) -> Result<()> {
        if verdict.recorded != Some(EntrySource::Reservation) {
            return Ok(());
        }
        let hash = verdict.fingerprint_hash.as_str();

        retry_on_lock("proof_finalize", self.config.max_lock_wait_ms, move || async move {
            let mut tx = begin_immediate(&self.pool, "proof_finalize").await?;

            let result = if valid {
                fingerprints::promote_reservation(tx.conn(), hash).await
            } else {
                fingerprints::release_reservation(tx.conn(), hash).await
            };

            match result {
                Ok(true) => {
                    tx.commit().await?;
                    tracing::info!(hash = %hash, promoted = valid, "Reservation finalized");
                    Ok(())
                }
                Ok(false) => {
                    tx.rollback().await?;
                    Err(Error::Internal(format!(
                        "reservation {} vanished before finalization",
                        hash
                    )))
                }
                Err(e) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        tracing::error!(error = %rollback_err, "Rollback failed");
                    }
                    Err(e)
                }
            }
        })
        .await
    }

    /// Best-effort release after a failed run; the original error wins
    async fn abandon(&self, verdict: &UniquenessVerdict) {
        if verdict.recorded != Some(EntrySource::Reservation) {
            return;
        }
        if let Err(e) = self.finalize(verdict, false).await {
            tracing::error!(
                hash = %verdict.fingerprint_hash,
                error = %e,
                "Failed to release reservation; it will be purged after its TTL"
            );
        }
    }

    fn build_record(
        &self,
        submission: &Submission,
        fingerprint: &ExtractedFingerprint,
        gate: &GateOutcome,
        inference: Option<InferenceOutcome>,
        signals: &Signals,
        assessment: &Assessment,
    ) -> ProofRecord {
        let mut attributes = Map::new();
        attributes.insert("total_score".to_string(), json!(1));
        attributes.insert("score_threshold".to_string(), json!(self.config.quality_gate));
        attributes.insert("duration_seconds".to_string(), json!(fingerprint.duration));
        attributes.insert(
            "fingerprint_hash".to_string(),
            json!(gate.uniqueness.fingerprint_hash),
        );
        attributes.insert(
            "candidates_compared".to_string(),
            json!(gate.uniqueness.candidates_compared),
        );
        match inference {
            Some(i) => {
                attributes.insert(
                    "authenticity_probability".to_string(),
                    json!(i.probability_real),
                );
            }
            None => {
                attributes.insert("inference_skipped".to_string(), Value::Bool(true));
            }
        }
        match &gate.uniqueness.reason {
            Some(DuplicateReason::ExactHash { .. }) => {
                attributes.insert("duplicate_reason".to_string(), json!("exact_hash"));
            }
            Some(DuplicateReason::NearDuplicate { similarity, .. }) => {
                attributes.insert("duplicate_reason".to_string(), json!("near_duplicate"));
                attributes.insert("duplicate_similarity".to_string(), json!(similarity));
            }
            None => {}
        }

        let mut metadata = Map::new();
        metadata.insert("dlp_id".to_string(), json!(self.config.dlp_id));
        metadata.insert("version".to_string(), json!(env!("CARGO_PKG_VERSION")));
        metadata.insert("build".to_string(), json!(env!("VDLP_GIT_HASH")));
        metadata.insert(
            "submission_id".to_string(),
            json!(submission.submission_id.to_string()),
        );
        metadata.insert(
            "generated_at".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );

        ProofRecord {
            dlp_id: self.config.dlp_id,
            valid: assessment.valid,
            score: assessment.score,
            authenticity: signals.authenticity,
            ownership: signals.ownership,
            quality: signals.quality,
            uniqueness: signals.uniqueness,
            attributes,
            metadata,
        }
    }
}
