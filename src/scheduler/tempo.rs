//! Tempo - the single source of truth for beat timing
//!
//! The beat interval is always derived from the tempo and never stored on
//! its own, so a retune can never leave a stale interval behind.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AudioError;

/// Slowest supported tempo
pub const MIN_BPM: u32 = 1;

/// Fastest supported tempo
pub const MAX_BPM: u32 = 300;

/// Tempo in beats per minute, guaranteed to lie in `MIN_BPM..=MAX_BPM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Tempo(u32);

impl Tempo {
    /// Build a tempo, rejecting values outside the supported range.
    pub fn new(bpm: u32) -> Result<Self, AudioError> {
        if (MIN_BPM..=MAX_BPM).contains(&bpm) {
            Ok(Self(bpm))
        } else {
            Err(AudioError::TempoInvalid { bpm })
        }
    }

    /// Build a tempo, clamping out-of-range values to the nearest bound.
    pub fn clamped(bpm: i64) -> Self {
        Self(bpm.clamp(MIN_BPM as i64, MAX_BPM as i64) as u32)
    }

    #[inline]
    pub fn bpm(self) -> u32 {
        self.0
    }

    /// Seconds between consecutive pulses: `60.0 / bpm`.
    ///
    /// # Examples
    /// ```
    /// use metronome_core::scheduler::Tempo;
    /// assert_eq!(Tempo::new(120).unwrap().beat_interval(), 0.5);
    /// ```
    #[inline]
    pub fn beat_interval(self) -> f64 {
        60.0 / self.0 as f64
    }

    /// Beat interval as a timer period.
    pub fn beat_period(self) -> Duration {
        Duration::from_secs_f64(self.beat_interval())
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self(120)
    }
}

impl TryFrom<u32> for Tempo {
    type Error = AudioError;

    fn try_from(bpm: u32) -> Result<Self, Self::Error> {
        Self::new(bpm)
    }
}

impl From<Tempo> for u32 {
    fn from(tempo: Tempo) -> Self {
        tempo.0
    }
}
