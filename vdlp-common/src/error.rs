//! Common error types for the proof pipeline

use thiserror::Error;

/// Common result type for proof operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every vdlp crate
///
/// Domain rejections (banned identity, duplicate fingerprint, low quality,
/// failed authenticity) are NOT errors: they produce a proof with
/// `valid = false`. Everything here aborts proof generation.
#[derive(Error, Debug)]
pub enum Error {
    /// Out-of-range threshold or parameter; raised before any store access
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Identity must be pre-registered (strict policy) but is unknown
    #[error("Identity not registered: {0}")]
    MissingIdentity(String),

    /// Submission payload lacks the audio file or the identity
    #[error("Input missing: {0}")]
    InputMissing(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// External collaborator (extractor, classifier, assessor) failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// External work exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for SQLite lock contention, which is worth retrying
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Error::Database(db_err) => {
                let msg = db_err.to_string();
                msg.contains("database is locked") || msg.contains("database table is locked")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_contention_only_for_database_errors() {
        let err = Error::Internal("database is locked".to_string());
        assert!(!err.is_lock_contention());

        let err = Error::Database(sqlx::Error::Protocol("database is locked".to_string()));
        assert!(err.is_lock_contention());

        let err = Error::Database(sqlx::Error::RowNotFound);
        assert!(!err.is_lock_contention());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = Error::InvalidArgument("similarity_threshold must be between 0.0 and 1.0".into());
        assert_eq!(
            err.to_string(),
            "Invalid argument: similarity_threshold must be between 0.0 and 1.0"
        );
    }
}
