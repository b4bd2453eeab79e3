//! Audio-service abstractions consumed by the schedulers.
//!
//! Two capability tiers exist: a sample-accurate clock that accepts pulses at
//! future timestamps (`PreciseClock`) and a fire-and-play player
//! (`CoarsePlayer`). One of them is selected once at startup and injected into
//! the controller as an [`AudioService`].

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::audio::{click, ClickSample};
use crate::config::{AudioConfig, BackendPreference};
use crate::error::{log_audio_error, AudioError};
use crate::scheduler::ClockTime;

/// Opaque handle to a click loaded into a coarse backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoundHandle(pub u32);

/// Backend exposing a sample-accurate clock with scheduled sound start.
pub trait PreciseClock: Send + Sync {
    /// Monotonic seconds since backend activation.
    fn now(&self) -> ClockTime;

    /// Commit `click` to start exactly at clock time `at`. Fire-and-forget:
    /// there is no handle to cancel a committed pulse.
    fn schedule_pulse(&self, click: &ClickSample, at: ClockTime) -> Result<(), AudioError>;

    /// Whether the backend must be resumed before scheduling.
    fn is_suspended(&self) -> bool;

    /// Reactivate a suspended backend.
    fn resume(&self) -> Result<(), AudioError>;
}

/// Backend that can only restart an already-loaded sound right now.
pub trait CoarsePlayer: Send + Sync {
    /// Decode the click once; `None` selects the built-in click.
    fn load_once(&self, path: Option<&Path>) -> Result<SoundHandle, AudioError>;

    /// Restart playback of `sound` from its first sample.
    fn replay(&self, sound: SoundHandle) -> Result<(), AudioError>;
}

/// Which capability tier the metronome is driving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Precise,
    Coarse,
    Unavailable,
}

/// The audio capability selected for this session
#[derive(Clone)]
pub enum AudioService {
    Precise {
        clock: Arc<dyn PreciseClock>,
        click: ClickSample,
    },
    Coarse {
        player: Arc<dyn CoarsePlayer>,
        sound: SoundHandle,
    },
    /// Initialization failed; the metronome stays silent for the session
    Unavailable { reason: String },
}

impl AudioService {
    pub fn kind(&self) -> BackendKind {
        match self {
            AudioService::Precise { .. } => BackendKind::Precise,
            AudioService::Coarse { .. } => BackendKind::Coarse,
            AudioService::Unavailable { .. } => BackendKind::Unavailable,
        }
    }

    /// Open the audio service matching the configured preference.
    ///
    /// `Auto` prefers the sample-accurate clock and falls back to the coarse
    /// player. Failures never propagate: they yield `Unavailable`.
    pub fn detect(config: &AudioConfig) -> Self {
        let opened = match config.backend {
            BackendPreference::Precise => Self::open_precise(config),
            BackendPreference::Coarse => Self::open_coarse(config),
            BackendPreference::Auto => Self::open_precise(config).or_else(|err| {
                warn!(
                    "[AudioService] Precise clock unavailable ({}), falling back to coarse player",
                    err
                );
                Self::open_coarse(config)
            }),
        };

        match opened {
            Ok(service) => {
                info!("[AudioService] Using {:?} backend", service.kind());
                service
            }
            Err(err) => {
                log_audio_error(&err, "AudioService::detect");
                AudioService::Unavailable {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn open_precise(config: &AudioConfig) -> Result<Self, AudioError> {
        let backend = CpalClockBackend::open(config.pulse_queue_capacity)?;
        let click = click::load_or_generate(config.click_asset.as_deref(), backend.sample_rate())?;
        Ok(AudioService::Precise {
            clock: Arc::new(backend),
            click,
        })
    }

    fn open_coarse(config: &AudioConfig) -> Result<Self, AudioError> {
        let player = CpalReplayBackend::open()?;
        let sound = player.load_once(config.click_asset.as_deref())?;
        Ok(AudioService::Coarse {
            player: Arc::new(player),
            sound,
        })
    }
}

mod cpal;
pub use self::cpal::{CpalClockBackend, CpalReplayBackend};

mod manual;
pub use manual::{ManualClock, RecordingPlayer};
