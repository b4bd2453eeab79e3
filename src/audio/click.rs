//! Click sample - synthesis, asset decoding and clock/frame conversion
//!
//! The click is loaded once at startup and shared read-only afterwards:
//! - A bundled WAV asset decoded with `hound` (first channel only)
//! - Or a deterministic 20ms noise burst when no asset is configured
//!
//! Frame conversion helpers map audio-clock seconds onto the frame counter
//! of a sample-accurate output stream.

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::AudioError;

/// Duration of the synthesized click in milliseconds
const CLICK_DURATION_MS: f32 = 20.0;

/// Immutable, shareable mono click buffer
pub type ClickSample = Arc<[f32]>;

/// Mono samples decoded from a click asset, at the asset's own rate
#[derive(Debug, Clone)]
pub struct DecodedClick {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Generates a metronome click sample (20ms white noise burst with a linear decay).
///
/// The noise is generated using a fixed seed so every call returns identical output.
///
/// # Arguments
/// * `sample_rate` - Sample rate in Hz (typically 48000)
///
/// # Returns
/// A `Vec<f32>` containing exactly 20ms worth of samples in range [-1.0, 1.0]
pub fn generate_click_sample(sample_rate: u32) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * CLICK_DURATION_MS / 1000.0) as usize;

    let mut rng = StdRng::seed_from_u64(42);

    let mut samples = Vec::with_capacity(num_samples);
    for i in 0..num_samples {
        let envelope = 1.0 - i as f32 / num_samples as f32;
        samples.push(rng.gen_range(-1.0..1.0) * envelope);
    }

    samples
}

/// Decode a WAV click asset.
///
/// Integer and float encodings are accepted; multi-channel files keep their
/// first channel.
///
/// # Errors
/// `AudioError::AssetLoadFailed` if the file can't be opened, decoded, or is empty.
pub fn load_click_wav(path: &Path) -> Result<DecodedClick, AudioError> {
    let load_failed = |reason: String| AudioError::AssetLoadFailed {
        path: path.display().to_string(),
        reason,
    };

    let mut reader = hound::WavReader::open(path).map_err(|e| load_failed(e.to_string()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .step_by(channels)
            .collect::<Result<_, _>>(),
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .step_by(channels)
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<_, _>>()
        }
    }
    .map_err(|e| load_failed(e.to_string()))?;

    if samples.is_empty() {
        return Err(load_failed("asset contains no samples".to_string()));
    }

    info!(
        "[Click] Decoded {} ({} frames @ {} Hz)",
        path.display(),
        samples.len(),
        spec.sample_rate
    );

    Ok(DecodedClick {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Turn an optional decoded asset into the click used by an output stream.
///
/// Falls back to the synthesized click when no asset is given. A rate
/// mismatch is played as-is (pitch-shifted) and logged.
pub fn prepare_click(asset: Option<DecodedClick>, stream_rate: u32) -> ClickSample {
    match asset {
        Some(decoded) => {
            if decoded.sample_rate != stream_rate {
                warn!(
                    "[Click] Asset rate {} Hz differs from stream rate {} Hz",
                    decoded.sample_rate, stream_rate
                );
            }
            Arc::from(decoded.samples)
        }
        None => Arc::from(generate_click_sample(stream_rate)),
    }
}

/// Load the configured asset, or synthesize a click for `stream_rate`.
pub fn load_or_generate(path: Option<&Path>, stream_rate: u32) -> Result<ClickSample, AudioError> {
    let asset = path.map(load_click_wav).transpose()?;
    Ok(prepare_click(asset, stream_rate))
}

/// Convert an audio-clock time to the nearest frame.
///
/// The result can be up to half a frame before `seconds`.
#[inline]
pub fn seconds_to_frames(seconds: f64, sample_rate: u32) -> u64 {
    (seconds.max(0.0) * sample_rate as f64).round() as u64
}

/// Convert a frame count to audio-clock seconds.
#[inline]
pub fn frames_to_seconds(frames: u64, sample_rate: u32) -> f64 {
    frames as f64 / sample_rate as f64
}
