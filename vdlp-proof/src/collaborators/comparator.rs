//! Chromaprint fingerprint similarity
//!
//! Histogram-of-offsets matcher over raw 32-bit sub-fingerprints: every pair
//! of frames within `MAX_ALIGN_OFFSET` of each other whose bit error is at
//! most `MAX_BIT_ERROR` votes for its alignment offset. The score is the best
//! offset's vote count over the shorter fingerprint's length.

use super::FingerprintComparator;
use vdlp_common::{Error, Result};

const MAX_BIT_ERROR: u32 = 2;
const MAX_ALIGN_OFFSET: usize = 120;

/// Relative duration difference tolerated without penalty
const DURATION_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, Default)]
pub struct ChromaprintComparator;

impl ChromaprintComparator {
    pub fn new() -> Self {
        Self
    }
}

/// Unpack little-endian u32 sub-fingerprints
pub fn unpack_fingerprint(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::InvalidArgument(format!(
            "fingerprint length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn check_duration(duration: f64) -> Result<()> {
    if !(duration.is_finite() && duration > 0.0) {
        return Err(Error::InvalidArgument(format!(
            "duration must be positive, got {}",
            duration
        )));
    }
    Ok(())
}

impl FingerprintComparator for ChromaprintComparator {
    fn compare(&self, a: (f64, &[u8]), b: (f64, &[u8])) -> Result<f64> {
        check_duration(a.0)?;
        check_duration(b.0)?;

        let fa = unpack_fingerprint(a.1)?;
        let fb = unpack_fingerprint(b.1)?;
        if fa.is_empty() || fb.is_empty() {
            return Ok(0.0);
        }

        // offset index = i - j + len(b), always in 0..=len(a)+len(b)
        let mut counts = vec![0u32; fa.len() + fb.len() + 1];
        for (i, &x) in fa.iter().enumerate() {
            let j_begin = i.saturating_sub(MAX_ALIGN_OFFSET);
            let j_end = fb.len().min(i + MAX_ALIGN_OFFSET + 1);
            for (j, &y) in fb.iter().enumerate().take(j_end).skip(j_begin) {
                if (x ^ y).count_ones() <= MAX_BIT_ERROR {
                    counts[i + fb.len() - j] += 1;
                }
            }
        }

        let top = counts.iter().copied().max().unwrap_or(0) as f64;
        let mut score = top / fa.len().min(fb.len()) as f64;

        let ratio = a.0.min(b.0) / a.0.max(b.0);
        if ratio < 1.0 - DURATION_TOLERANCE {
            score *= ratio;
        }

        Ok(score.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    /// Deterministic pseudo-random sub-fingerprints
    fn words(seed: u32, n: usize) -> Vec<u32> {
        let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
        (0..n)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state
            })
            .collect()
    }

    #[test]
    fn test_identical_fingerprints_score_one() {
        let fp = pack(&words(1, 200));
        let score = ChromaprintComparator.compare((30.0, &fp), (30.0, &fp)).unwrap();
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_unrelated_fingerprints_score_low() {
        let a = pack(&words(1, 200));
        let b = pack(&words(2, 200));
        let score = ChromaprintComparator.compare((30.0, &a), (30.0, &b)).unwrap();
        assert!(score < 0.1, "score {}", score);
    }

    #[test]
    fn test_shifted_and_noisy_copy_scores_high() {
        let base = words(7, 300);
        let mut shifted: Vec<u32> = base[5..].to_vec();
        for w in shifted.iter_mut().step_by(10) {
            *w ^= 0b1; // single bit flips stay under the bit-error bound
        }
        let a = pack(&base);
        let b = pack(&shifted);
        let score = ChromaprintComparator.compare((30.0, &a), (29.5, &b)).unwrap();
        assert!(score > 0.9, "score {}", score);
    }

    #[test]
    fn test_comparison_is_symmetric() {
        let a = pack(&words(3, 250));
        let mut b_words = words(3, 250)[40..].to_vec();
        b_words.extend(words(4, 60));
        let b = pack(&b_words);

        let ab = ChromaprintComparator.compare((25.0, &a), (22.0, &b)).unwrap();
        let ba = ChromaprintComparator.compare((22.0, &b), (25.0, &a)).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_duration_skew_penalizes() {
        let fp = pack(&words(5, 100));
        let same = ChromaprintComparator.compare((10.0, &fp), (10.5, &fp)).unwrap();
        let skewed = ChromaprintComparator.compare((10.0, &fp), (40.0, &fp)).unwrap();
        assert_eq!(same, 1.0);
        assert!((skewed - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_inputs() {
        let fp = pack(&words(5, 10));
        assert!(ChromaprintComparator.compare((0.0, &fp), (10.0, &fp)).is_err());
        assert!(ChromaprintComparator.compare((10.0, &fp[..5]), (10.0, &fp)).is_err());
        assert_eq!(ChromaprintComparator.compare((10.0, &[]), (10.0, &fp)).unwrap(), 0.0);
    }
}
