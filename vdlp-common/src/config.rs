//! Configuration loading and validation
//!
//! Resolution order (highest priority first):
//! 1. Command-line argument / environment variable (applied by the binary)
//! 2. TOML config file (`--config`, `VDLP_CONFIG`, or the platform default)
//! 3. Compiled defaults

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VDLP_CONFIG";

/// Legacy identity variables, checked in order when no identity is configured
pub const IDENTITY_ENV_VARS: [&str; 2] = ["USER_WALLET_ADDRESS", "USER_EMAIL"];

/// What to do with an identity that has never been seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// Create the identity with zero violations and grant ownership
    Bootstrap,
    /// Reject the submission with `MissingIdentity`
    Strict,
}

/// When an accepted fingerprint becomes part of the corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionPolicy {
    /// Insert into the corpus inside the gating transaction
    Immediate,
    /// Reserve during gating, promote only if the whole submission is valid
    Deferred,
}

/// Relative order of the transactional gate and model inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationOrder {
    /// Ownership + uniqueness first, inference only after commit
    CheapFirst,
    /// Inference first, then the transactional gate
    ExpensiveFirst,
}

/// Inference service settings (authenticity classifier, quality assessor)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8500".to_string(),
            request_timeout_secs: 120,
        }
    }
}

/// Proof generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProofConfig {
    /// Data pool identifier written into every proof
    pub dlp_id: u64,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// SQLite database; platform data dir when unset
    pub database_path: Option<PathBuf>,
    /// Submitter identity when the input directory carries none
    pub identity: Option<String>,
    pub identity_policy: IdentityPolicy,
    pub violation_threshold: i64,
    pub similarity_threshold: f64,
    pub scan_page_size: u32,
    pub quality_gate: f64,
    pub authenticity_threshold: f64,
    pub insertion_policy: InsertionPolicy,
    pub evaluation_order: EvaluationOrder,
    /// Run inference even when ownership/uniqueness already rejected
    pub infer_rejected: bool,
    pub inference_timeout_secs: u64,
    pub max_lock_wait_ms: u64,
    pub reservation_ttl_secs: u64,
    pub audio_extensions: Vec<String>,
    /// Leading seconds of audio fed to Chromaprint (AcoustID uses 120)
    pub fingerprint_length_secs: u32,
    pub inference: InferenceConfig,
}

impl Default for ProofConfig {
    fn default() -> Self {
        Self {
            dlp_id: 0,
            input_dir: PathBuf::from("/input"),
            output_dir: PathBuf::from("/output"),
            database_path: None,
            identity: None,
            identity_policy: IdentityPolicy::Bootstrap,
            violation_threshold: 5,
            similarity_threshold: 0.8,
            scan_page_size: 100,
            quality_gate: 0.5,
            authenticity_threshold: 0.5,
            insertion_policy: InsertionPolicy::Deferred,
            evaluation_order: EvaluationOrder::CheapFirst,
            infer_rejected: true,
            inference_timeout_secs: 600,
            max_lock_wait_ms: 5000,
            reservation_ttl_secs: 3600,
            audio_extensions: ["ogg", "wav", "mp3", "flac", "m4a"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fingerprint_length_secs: 120,
            inference: InferenceConfig::default(),
        }
    }
}

impl ProofConfig {
    /// Load configuration from an explicit file, `VDLP_CONFIG`, or the
    /// platform default location. Missing default file means compiled defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => match std::env::var(CONFIG_ENV_VAR) {
                Ok(p) => Some(PathBuf::from(p)),
                Err(_) => default_config_file().filter(|p| p.exists()),
            },
        };

        match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_toml_file(&path)
            }
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a TOML config file; absent keys keep their defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Fill `identity` from the legacy environment variables if still unset
    pub fn apply_identity_env(&mut self) {
        if self.identity.is_some() {
            return;
        }
        self.identity = IDENTITY_ENV_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty());
    }

    /// Database path, falling back to the platform data directory
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }

    /// Reject out-of-range parameters before anything touches the store
    pub fn validate(&self) -> Result<()> {
        if self.dlp_id == 0 {
            return Err(Error::Config("dlp_id must be set".to_string()));
        }
        check_unit_interval("similarity_threshold", self.similarity_threshold)?;
        check_unit_interval("quality_gate", self.quality_gate)?;
        check_unit_interval("authenticity_threshold", self.authenticity_threshold)?;
        if self.violation_threshold < 0 {
            return Err(Error::InvalidArgument(format!(
                "violation_threshold must be >= 0, got {}",
                self.violation_threshold
            )));
        }
        if self.scan_page_size < 1 {
            return Err(Error::InvalidArgument("scan_page_size must be >= 1".to_string()));
        }
        if self.inference_timeout_secs == 0 {
            return Err(Error::InvalidArgument(
                "inference_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.audio_extensions.is_empty() {
            return Err(Error::Config("audio_extensions must not be empty".to_string()));
        }
        Ok(())
    }
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::InvalidArgument(format!(
            "{} must be between 0.0 and 1.0, got {}",
            name, value
        )));
    }
    Ok(())
}

/// `~/.config/vdlp/proof.toml` (or the platform equivalent)
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vdlp").join("proof.toml"))
}

/// `~/.local/share/vdlp/vdlp.db` (or the platform equivalent)
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("vdlp"))
        .unwrap_or_else(|| PathBuf::from("./vdlp_data"))
        .join("vdlp.db")
}
