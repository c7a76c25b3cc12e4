//! External collaborators consumed by the proof pipeline
//!
//! The pipeline only sees these traits. Default implementations:
//! - [`ChromaprintExtractor`]: raw Chromaprint over decoded PCM
//! - [`ChromaprintComparator`]: alignment bit-error matcher
//! - [`SegmentedAuthenticity`]: 24 kHz segments scored by a [`SegmentClassifier`]
//! - [`InferenceQualityAssessor`]: DNSMOS-style sub-metrics from the inference service

pub mod authenticity;
pub mod chromaprint;
pub mod comparator;
pub mod inference_client;
pub mod quality;

pub use authenticity::{SegmentClassifier, SegmentedAuthenticity};
pub use chromaprint::ChromaprintExtractor;
pub use comparator::ChromaprintComparator;
pub use inference_client::InferenceClient;
pub use quality::{InferenceQualityAssessor, QualityMetrics};

use async_trait::async_trait;
use std::path::Path;
use vdlp_common::Result;

/// Extractor output: `(duration, fingerprint-bytes)`
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFingerprint {
    /// Seconds
    pub duration: f64,
    pub fingerprint: Vec<u8>,
}

/// Acoustic fingerprint extraction
#[async_trait]
pub trait FingerprintExtractor: Send + Sync {
    async fn extract(&self, audio: &Path) -> Result<ExtractedFingerprint>;
}

/// Pairwise similarity of two `(duration, fingerprint)` pairs
///
/// Contract: result in [0,1], symmetric in its arguments. The uniqueness
/// engine issues each comparison in one order only, so an asymmetric
/// comparator silently breaks near-duplicate detection.
pub trait FingerprintComparator: Send + Sync {
    fn compare(&self, a: (f64, &[u8]), b: (f64, &[u8])) -> Result<f64>;
}

/// Real-vs-synthetic classifier
#[async_trait]
pub trait AuthenticityClassifier: Send + Sync {
    /// Probability in [0,1] that the recording is real
    async fn probability_real(&self, audio: &Path) -> Result<f64>;
}

/// Perceptual quality assessor
#[async_trait]
pub trait QualityAssessor: Send + Sync {
    async fn assess(&self, audio: &Path) -> Result<QualityMetrics>;
}
