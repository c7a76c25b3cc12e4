//! Scripted collaborators
//!
//! Deterministic stand-ins for the Chromaprint extractor and matcher and
//! the inference service.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use vdlp_common::{Error, Result};
use vdlp_proof::collaborators::{
    AuthenticityClassifier, ExtractedFingerprint, FingerprintComparator, FingerprintExtractor,
    QualityAssessor, QualityMetrics,
};

/// Fingerprint whose first word is `family` and second word is `variant`.
/// Same family = near duplicates, same family and variant = exact duplicate.
pub fn fingerprint(family: u32, variant: u32) -> Vec<u8> {
    [family, variant]
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .collect()
}

/// Maps file names to scripted fingerprints
#[derive(Default)]
pub struct ScriptedExtractor {
    by_name: HashMap<String, ExtractedFingerprint>,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: &str, family: u32, variant: u32) -> Self {
        self.by_name.insert(
            file_name.to_string(),
            ExtractedFingerprint {
                duration: 30.0,
                fingerprint: fingerprint(family, variant),
            },
        );
        self
    }
}

#[async_trait]
impl FingerprintExtractor for ScriptedExtractor {
    async fn extract(&self, audio: &Path) -> Result<ExtractedFingerprint> {
        let name = audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Collaborator(format!("no scripted fingerprint for {}", name)))
    }
}

/// Similarity 1.0 when the first words match, else 0.0
pub struct FirstWordComparator;

impl FingerprintComparator for FirstWordComparator {
    fn compare(&self, a: (f64, &[u8]), b: (f64, &[u8])) -> Result<f64> {
        Ok(if a.1.get(..4) == b.1.get(..4) { 1.0 } else { 0.0 })
    }
}

/// Fixed probability; counts calls
pub struct FixedAuthenticity {
    probability: f64,
    calls: AtomicU32,
}

impl FixedAuthenticity {
    pub fn new(probability: f64) -> Self {
        Self {
            probability,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthenticityClassifier for FixedAuthenticity {
    async fn probability_real(&self, _audio: &Path) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.probability)
    }
}

/// Never answers within a test's timeout
pub struct SlowAuthenticity(pub Duration);

#[async_trait]
impl AuthenticityClassifier for SlowAuthenticity {
    async fn probability_real(&self, _audio: &Path) -> Result<f64> {
        tokio::time::sleep(self.0).await;
        Ok(1.0)
    }
}

/// Returns a single `ovrl_mos` sub-metric chosen so the normalized quality
/// equals `quality`; `p808_mos` is always present and always ignored
pub struct FixedQuality {
    quality: f64,
}

impl FixedQuality {
    pub fn new(quality: f64) -> Self {
        Self { quality }
    }
}

#[async_trait]
impl QualityAssessor for FixedQuality {
    async fn assess(&self, _audio: &Path) -> Result<QualityMetrics> {
        Ok(QualityMetrics::from_pairs([
            ("ovrl_mos", self.quality * 5.0),
            ("p808_mos", 1.0),
        ]))
    }
}

/// [`FixedQuality`] that takes `delay` to answer
pub struct SlowQuality {
    delay: Duration,
    inner: FixedQuality,
}

impl SlowQuality {
    pub fn new(delay: Duration, quality: f64) -> Self {
        Self {
            delay,
            inner: FixedQuality::new(quality),
        }
    }
}

#[async_trait]
impl QualityAssessor for SlowQuality {
    async fn assess(&self, audio: &Path) -> Result<QualityMetrics> {
        tokio::time::sleep(self.delay).await;
        self.inner.assess(audio).await
    }
}
