//! Audio Decoding Utilities
//!
//! Decodes submissions to mono f32 PCM for the inference front-end
//! (authenticity segments at 24 kHz, quality assessment at 16 kHz).
//!
//! Uses symphonia for format-agnostic decoding and rubato for resampling.

use anyhow::{Context, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded audio result
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono audio samples (f32, range [-1.0, 1.0])
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Original channel count
    pub channels: usize,
}

impl DecodedAudio {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Resample to `target_rate`, keeping the signal mono
    pub fn resampled(self, target_rate: u32) -> Result<DecodedAudio> {
        if self.sample_rate == target_rate || self.samples.is_empty() {
            return Ok(DecodedAudio {
                sample_rate: target_rate,
                ..self
            });
        }

        let samples = resample_mono(&self.samples, self.sample_rate, target_rate)?;
        Ok(DecodedAudio {
            samples,
            sample_rate: target_rate,
            channels: self.channels,
        })
    }
}

/// Decode audio file to mono f32 PCM samples
///
/// **Algorithm:**
/// 1. Probe format using the file extension as a hint
/// 2. Decode every packet of the default audio track
/// 3. Average channels to mono
///
/// Corrupt packets are skipped; a file with no decodable audio is an error.
pub fn decode_audio_file(file_path: &Path) -> Result<DecodedAudio> {
    tracing::debug!(path = %file_path.display(), "Decoding audio file");

    let file = std::fs::File::open(file_path)
        .with_context(|| format!("Failed to open audio file: {}", file_path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = file_path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Failed to probe audio file: {}", file_path.display()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio track found in file")?;

    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.context("Sample rate unknown")?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .with_context(|| format!("Failed to create decoder for: {}", file_path.display()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(anyhow::anyhow!("Error reading packet: {}", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                tracing::debug!(path = %file_path.display(), error = msg, "Skipping corrupt packet");
                continue;
            }
            Err(e) => return Err(anyhow::anyhow!("Failed to decode packet: {}", e)),
        };

        let spec = *decoded.spec();
        let buf = sample_buf
            .get_or_insert_with(|| SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        if buf.capacity() < decoded.capacity() * spec.channels.count() {
            *buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        }
        buf.copy_interleaved_ref(decoded);

        let frame_channels = spec.channels.count().max(1);
        samples.extend(
            buf.samples()
                .chunks(frame_channels)
                .map(|frame| frame.iter().sum::<f32>() / frame_channels as f32),
        );
    }

    if samples.is_empty() {
        anyhow::bail!("No decodable audio in {}", file_path.display());
    }

    tracing::debug!(
        path = %file_path.display(),
        sample_rate,
        channels,
        total_samples = samples.len(),
        "Audio decoding complete"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Resample a mono signal in one pass
fn resample_mono(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        input.len(),
        1,
    )
    .context("Failed to create resampler")?;

    let mut output = resampler
        .process(&[input], None)
        .context("Resampling failed")?;

    Ok(output.pop().unwrap_or_default())
}

/// Scale so the loudest sample sits at full scale; silence is left as is
pub fn peak_normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > f32::EPSILON {
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }
}
