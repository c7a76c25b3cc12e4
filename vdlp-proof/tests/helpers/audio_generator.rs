//! Audio Test Fixture Generator
//!
//! The orchestrator only checks that the submission file exists; scripted
//! collaborators never decode it. A short valid WAV keeps fixtures realistic.

use std::path::{Path, PathBuf};

/// Write a 0.5 s, 16 kHz mono sine WAV named `name` into `dir`
pub fn generate_test_wav(dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(&path, spec)?;
    for i in 0..8_000 {
        let t = i as f32 / 16_000.0;
        let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.5;
        writer.write_sample((sample * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;

    Ok(path)
}
