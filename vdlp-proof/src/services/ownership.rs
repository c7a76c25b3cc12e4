//! Ownership / ban-threshold evaluation
//!
//! A contributor is in good standing (1) until moderation has recorded
//! `violation_threshold` or more violations against them (0). The evaluator
//! only ever reads counts; at most it inserts a fresh identity row.

use crate::db::identities;
use sqlx::SqliteConnection;
use vdlp_common::config::IdentityPolicy;
use vdlp_common::{Error, Result};

/// Ownership evaluator
pub struct OwnershipEvaluator {
    policy: IdentityPolicy,
    violation_threshold: i64,
}

impl OwnershipEvaluator {
    pub fn new(policy: IdentityPolicy, violation_threshold: i64) -> Result<Self> {
        if violation_threshold < 0 {
            return Err(Error::InvalidArgument(format!(
                "violation_threshold must be >= 0, got {}",
                violation_threshold
            )));
        }
        Ok(Self {
            policy,
            violation_threshold,
        })
    }

    /// Ownership signal for `identity`
    ///
    /// **Algorithm:**
    /// 1. Look up the identity record
    /// 2. Absent: bootstrap creates it (count 0) and returns 1; strict fails
    /// 3. Count zero/absent: 1 regardless of threshold
    /// 4. Count at or above threshold: 0, otherwise 1
    pub async fn evaluate(&self, conn: &mut SqliteConnection, identity: &str) -> Result<u8> {
        if identity.trim().is_empty() {
            return Err(Error::InputMissing("identity is empty".to_string()));
        }

        let record = match self.policy {
            IdentityPolicy::Bootstrap => identities::find_or_create(conn, identity).await?.0,
            IdentityPolicy::Strict => identities::find(conn, identity)
                .await?
                .ok_or_else(|| Error::MissingIdentity(identity.to_string()))?,
        };

        let violations = record.violation_count.unwrap_or(0);
        let ownership = if violations == 0 {
            1
        } else {
            u8::from(violations < self.violation_threshold)
        };

        tracing::info!(
            identity = %identity,
            violations,
            threshold = self.violation_threshold,
            ownership,
            "Ownership evaluated"
        );

        Ok(ownership)
    }
}
