//! Perceptual quality assessment
//!
//! The assessor returns raw MOS-scale sub-metrics (1..5). The proof uses one
//! normalized score: the mean of the sub-metrics excluding `p808_mos`,
//! mapped by `x * 2 / 10` and clamped to [0,1].

use super::inference_client::InferenceClient;
use super::QualityAssessor;
use crate::utils::{decode_audio_file, peak_normalize};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use vdlp_common::{Error, Result};

pub const QUALITY_SAMPLE_RATE: u32 = 16_000;

/// Sub-metric left out of the aggregate
const EXCLUDED_METRIC: &str = "p808_mos";

/// Named quality sub-metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityMetrics(pub BTreeMap<String, f64>);

impl QualityMetrics {
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Normalized quality score in [0,1]
    ///
    /// A non-finite sub-metric is a collaborator failure, not a value to skip.
    pub fn quality_score(&self) -> Result<f64> {
        let mut used = Vec::with_capacity(self.0.len());
        for (name, value) in &self.0 {
            if name == EXCLUDED_METRIC {
                continue;
            }
            if !value.is_finite() {
                return Err(Error::Collaborator(format!(
                    "quality sub-metric {} is not finite: {}",
                    name, value
                )));
            }
            used.push(*value);
        }

        if used.is_empty() {
            return Err(Error::Collaborator(
                "quality assessor returned no usable metrics".to_string(),
            ));
        }

        let mean = used.iter().sum::<f64>() / used.len() as f64;
        Ok((mean * 2.0 / 10.0).clamp(0.0, 1.0))
    }
}

/// [`QualityAssessor`] backed by the inference service
pub struct InferenceQualityAssessor {
    client: Arc<InferenceClient>,
}

impl InferenceQualityAssessor {
    pub fn new(client: Arc<InferenceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QualityAssessor for InferenceQualityAssessor {
    async fn assess(&self, audio: &Path) -> Result<QualityMetrics> {
        let path = audio.to_path_buf();
        let decoded = tokio::task::spawn_blocking(move || {
            let mut decoded = decode_audio_file(&path)?.resampled(QUALITY_SAMPLE_RATE)?;
            peak_normalize(&mut decoded.samples);
            Ok::<_, anyhow::Error>(decoded)
        })
        .await
        .map_err(|e| Error::Internal(format!("decode task failed: {}", e)))?
        .map_err(|e| Error::Collaborator(format!("{:#}", e)))?;

        let metrics = self
            .client
            .quality(&decoded.samples, QUALITY_SAMPLE_RATE)
            .await?;

        tracing::debug!(?metrics, "Quality metrics received");
        Ok(QualityMetrics(metrics))
    }
}
