//! Chromaprint fingerprint extraction
//!
//! Decodes the submission with symphonia, feeds the leading
//! `length_secs` of mono PCM into a Chromaprint context and packs the raw
//! 32-bit sub-fingerprints little-endian. That byte form is what the corpus
//! stores and [`super::ChromaprintComparator`] reads back.

use super::{ExtractedFingerprint, FingerprintExtractor};
use crate::utils::decode_audio_file;
use async_trait::async_trait;
use chromaprint_rust::Context;
use std::path::Path;
use vdlp_common::{Error, Result};

/// Fingerprint extractor backed by libchromaprint
#[derive(Debug, Clone)]
pub struct ChromaprintExtractor {
    /// Use first N seconds for fingerprinting (AcoustID recommends 120)
    length_secs: u32,
}

impl ChromaprintExtractor {
    pub fn new(length_secs: u32) -> Self {
        Self { length_secs }
    }
}

impl Default for ChromaprintExtractor {
    fn default() -> Self {
        Self::new(120)
    }
}

#[async_trait]
impl FingerprintExtractor for ChromaprintExtractor {
    async fn extract(&self, audio: &Path) -> Result<ExtractedFingerprint> {
        let path = audio.to_path_buf();
        let length_secs = self.length_secs;

        // Decoding and the Chromaprint context are both blocking; the
        // context is !Send, so it lives entirely inside the task.
        let extracted = tokio::task::spawn_blocking(move || {
            let decoded =
                decode_audio_file(&path).map_err(|e| Error::Collaborator(format!("{:#}", e)))?;
            if decoded.samples.is_empty() {
                return Err(Error::Collaborator(format!(
                    "No audio decoded from {}",
                    path.display()
                )));
            }

            let limit = (decoded.sample_rate as usize).saturating_mul(length_secs as usize);
            let head = &decoded.samples[..decoded.samples.len().min(limit)];
            let fingerprint = fingerprint_samples(head, decoded.sample_rate)?;

            Ok(ExtractedFingerprint {
                duration: decoded.duration_seconds(),
                fingerprint,
            })
        })
        .await
        .map_err(|e| Error::Internal(format!("fingerprint task failed: {}", e)))??;

        tracing::debug!(
            path = %audio.display(),
            duration = extracted.duration,
            fingerprint_bytes = extracted.fingerprint.len(),
            "Fingerprint extracted"
        );

        Ok(extracted)
    }
}

/// Raw Chromaprint fingerprint of mono f32 PCM, packed little-endian
pub fn fingerprint_samples(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    if samples.is_empty() {
        return Err(Error::Collaborator("Empty sample buffer".to_string()));
    }

    let pcm: Vec<i16> = samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect();

    let mut ctx = Context::default();
    ctx.start(sample_rate, 1)
        .map_err(|e| Error::Collaborator(format!("Failed to start Chromaprint: {}", e)))?;
    ctx.feed(&pcm)
        .map_err(|e| Error::Collaborator(format!("Failed to feed audio to Chromaprint: {}", e)))?;
    ctx.finish()
        .map_err(|e| Error::Collaborator(format!("Failed to finish Chromaprint: {}", e)))?;

    let raw = ctx
        .get_fingerprint_raw()
        .map_err(|e| Error::Collaborator(format!("Failed to get fingerprint: {}", e)))?;

    let words = raw.get();
    if words.is_empty() {
        return Err(Error::Collaborator(
            "Chromaprint produced an empty fingerprint".to_string(),
        ));
    }

    let mut bytes = Vec::with_capacity(words.len() * 4);
    for word in words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{ChromaprintComparator, FingerprintComparator};
    use tempfile::TempDir;

    /// Tone sweep, so successive Chromaprint frames differ
    fn sweep(start_hz: f32, secs: f32, sample_rate: u32) -> Vec<f32> {
        let n = (secs * sample_rate as f32) as usize;
        let mut phase = 0.0f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                let freq = start_hz * (1.0 + t / 2.0);
                phase += 2.0 * std::f32::consts::PI * freq / sample_rate as f32;
                phase.sin() * 0.5
            })
            .collect()
    }

    fn write_wav(dir: &Path, name: &str, samples: &[f32], sample_rate: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in samples {
            writer.write_sample((s * 32767.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn test_empty_samples() {
        let result = fingerprint_samples(&[], 44100);
        assert!(matches!(result, Err(Error::Collaborator(msg)) if msg.contains("Empty")));
    }

    #[test]
    fn test_fingerprint_is_packed_words() {
        let fp = fingerprint_samples(&sweep(300.0, 10.0, 44100), 44100).unwrap();
        assert!(!fp.is_empty());
        assert_eq!(fp.len() % 4, 0);
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let samples = sweep(300.0, 10.0, 22050);
        assert_eq!(
            fingerprint_samples(&samples, 22050).unwrap(),
            fingerprint_samples(&samples, 22050).unwrap()
        );
    }

    #[tokio::test]
    async fn test_extract_wav_file() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(dir.path(), "voice.wav", &sweep(300.0, 10.0, 16000), 16000);

        let extracted = ChromaprintExtractor::default().extract(&path).await.unwrap();
        assert!((extracted.duration - 10.0).abs() < 0.01);
        assert!(!extracted.fingerprint.is_empty());

        // The stored byte form round-trips through the comparator
        let same = ChromaprintComparator
            .compare(
                (extracted.duration, extracted.fingerprint.as_slice()),
                (extracted.duration, extracted.fingerprint.as_slice()),
            )
            .unwrap();
        assert!(same > 0.99);
    }

    #[tokio::test]
    async fn test_length_limit_keeps_full_duration() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(dir.path(), "long.wav", &sweep(300.0, 12.0, 16000), 16000);

        let full = ChromaprintExtractor::new(120).extract(&path).await.unwrap();
        let head = ChromaprintExtractor::new(6).extract(&path).await.unwrap();

        assert!((head.duration - 12.0).abs() < 0.01);
        assert!(head.fingerprint.len() < full.fingerprint.len());
    }

    #[tokio::test]
    async fn test_missing_file_is_collaborator_error() {
        let result = ChromaprintExtractor::default()
            .extract(Path::new("/nonexistent/voice.ogg"))
            .await;
        assert!(matches!(result, Err(Error::Collaborator(_))));
    }
}
