//! Segmented authenticity classification
//!
//! The model scores fixed 4 s windows at 24 kHz. A clip is cut into
//! consecutive full windows (trailing remainder dropped); a clip shorter
//! than one window is tiled until it fills one. The clip probability is the
//! mean of the window probabilities.

use super::AuthenticityClassifier;
use crate::utils::decode_audio_file;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use vdlp_common::{Error, Result};

pub const AUTHENTICITY_SAMPLE_RATE: u32 = 24_000;
pub const SEGMENT_SAMPLES: usize = 96_000;

/// Scores one fixed-length window
#[async_trait]
pub trait SegmentClassifier: Send + Sync {
    /// Probability in [0,1] that the window is a real recording
    async fn classify(&self, segment: &[f32], sample_rate: u32) -> Result<f64>;
}

#[async_trait]
impl<T: SegmentClassifier + ?Sized> SegmentClassifier for Arc<T> {
    async fn classify(&self, segment: &[f32], sample_rate: u32) -> Result<f64> {
        (**self).classify(segment, sample_rate).await
    }
}

/// Cut mono samples into model windows
pub fn segment_samples(samples: &[f32], segment_len: usize) -> Vec<Vec<f32>> {
    if samples.is_empty() || segment_len == 0 {
        return Vec::new();
    }
    if samples.len() < segment_len {
        return vec![samples.iter().copied().cycle().take(segment_len).collect()];
    }
    samples
        .chunks_exact(segment_len)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// [`AuthenticityClassifier`] over a per-window [`SegmentClassifier`]
pub struct SegmentedAuthenticity<C> {
    classifier: C,
}

impl<C: SegmentClassifier> SegmentedAuthenticity<C> {
    pub fn new(classifier: C) -> Self {
        Self { classifier }
    }

    /// Mean window probability of already decoded 24 kHz mono samples
    pub async fn score_samples(&self, samples: &[f32]) -> Result<f64> {
        let segments = segment_samples(samples, SEGMENT_SAMPLES);
        if segments.is_empty() {
            return Err(Error::Collaborator("no audio to classify".to_string()));
        }

        let mut total = 0.0;
        for segment in &segments {
            total += self
                .classifier
                .classify(segment, AUTHENTICITY_SAMPLE_RATE)
                .await?;
        }
        let probability = total / segments.len() as f64;

        tracing::debug!(segments = segments.len(), probability, "Authenticity scored");
        Ok(probability)
    }
}

#[async_trait]
impl<C: SegmentClassifier> AuthenticityClassifier for SegmentedAuthenticity<C> {
    async fn probability_real(&self, audio: &Path) -> Result<f64> {
        let path = audio.to_path_buf();
        let decoded = tokio::task::spawn_blocking(move || {
            decode_audio_file(&path)?.resampled(AUTHENTICITY_SAMPLE_RATE)
        })
        .await
        .map_err(|e| Error::Internal(format!("decode task failed: {}", e)))?
        .map_err(|e| Error::Collaborator(format!("{:#}", e)))?;

        self.score_samples(&decoded.samples).await
    }
}
