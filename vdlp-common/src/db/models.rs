//! Database models

use serde::{Deserialize, Serialize};

/// Accepted corpus entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FingerprintRecord {
    pub id: i64,
    /// Seconds; the comparator is duration-aware
    pub duration: f64,
    /// Opaque extractor output, stored verbatim
    pub fingerprint: Vec<u8>,
    /// Hex SHA-256 of `fingerprint`
    pub fingerprint_hash: String,
}

/// Contributor ban-tracking row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdentityRecord {
    pub id: i64,
    pub identity: String,
    /// NULL is treated as zero violations
    pub violation_count: Option<i64>,
}
