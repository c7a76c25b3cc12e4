//! Proof record: the output of one proof run
//!
//! Only `score` and `metadata` go on-chain; the full record is published
//! off-chain as `results.json`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use vdlp_common::Result;

pub const RESULTS_FILE: &str = "results.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofRecord {
    pub dlp_id: u64,
    pub valid: bool,
    pub score: f64,
    pub authenticity: u8,
    pub ownership: u8,
    pub quality: f64,
    pub uniqueness: u8,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ProofRecord {
    /// Write `results.json` (pretty-printed) into `output_dir`
    ///
    /// The file is written to a temporary name and renamed, so a reader never
    /// sees a partial record.
    pub fn write_results(&self, output_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir)?;

        let path = output_dir.join(RESULTS_FILE);
        let tmp = output_dir.join(format!(".{}.tmp", RESULTS_FILE));
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, &path)?;

        tracing::info!(path = %path.display(), valid = self.valid, score = self.score, "Proof written");
        Ok(path)
    }
}
