// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants exposed to Dart via FFI
///
/// These constants provide a single source of truth for error codes
/// shared between Rust and Dart.
///
/// Error code range: 1001-1011
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Tempo outside the supported 1-300 BPM range
    pub const TEMPO_INVALID: i32 = 1001;

    /// Audio backend failed to initialize for this session
    pub const BACKEND_UNAVAILABLE: i32 = 1002;

    /// Suspended clock backend refused to resume
    pub const RESUME_FAILED: i32 = 1003;

    /// Backend rejected a single scheduled pulse
    pub const PULSE_REJECTED: i32 = 1004;

    /// Backend failed to replay the loaded click
    pub const REPLAY_FAILED: i32 = 1005;

    /// Click asset could not be read or decoded
    pub const ASSET_LOAD_FAILED: i32 = 1006;

    /// Failed to open audio stream
    pub const STREAM_OPEN_FAILED: i32 = 1007;

    /// Hardware error occurred
    pub const HARDWARE_ERROR: i32 = 1008;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1009;

    /// Control thread is gone or its command queue is full
    pub const CONTROL_CHANNEL_CLOSED: i32 = 1010;

    /// Coarse backend already holds its click sound
    pub const SOUND_ALREADY_LOADED: i32 = 1011;

    // Getter methods for FFI exposure (flutter_rust_bridge requires methods not const)

    /// Get TEMPO_INVALID error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn tempo_invalid() -> i32 {
        Self::TEMPO_INVALID
    }

    /// Get BACKEND_UNAVAILABLE error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn backend_unavailable() -> i32 {
        Self::BACKEND_UNAVAILABLE
    }

    /// Get RESUME_FAILED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn resume_failed() -> i32 {
        Self::RESUME_FAILED
    }

    /// Get PULSE_REJECTED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn pulse_rejected() -> i32 {
        Self::PULSE_REJECTED
    }

    /// Get REPLAY_FAILED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn replay_failed() -> i32 {
        Self::REPLAY_FAILED
    }

    /// Get ASSET_LOAD_FAILED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn asset_load_failed() -> i32 {
        Self::ASSET_LOAD_FAILED
    }

    /// Get STREAM_OPEN_FAILED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn stream_open_failed() -> i32 {
        Self::STREAM_OPEN_FAILED
    }

    /// Get HARDWARE_ERROR error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn hardware_error() -> i32 {
        Self::HARDWARE_ERROR
    }

    /// Get LOCK_POISONED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn lock_poisoned() -> i32 {
        Self::LOCK_POISONED
    }

    /// Get CONTROL_CHANNEL_CLOSED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn control_channel_closed() -> i32 {
        Self::CONTROL_CHANNEL_CLOSED
    }

    /// Get SOUND_ALREADY_LOADED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn sound_already_loaded() -> i32 {
        Self::SOUND_ALREADY_LOADED
    }
}

/// Log an audio error with structured context
///
/// Emits the numeric code, the component and the human-readable message
/// together with the call site that observed the failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=Metronome, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover backend initialization, stream management,
/// per-pulse scheduling and the control thread.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Tempo outside the supported range
    TempoInvalid { bpm: u32 },

    /// Audio backend failed to initialize; the metronome stays silent
    BackendUnavailable { reason: String },

    /// Suspended clock backend could not be resumed
    ResumeFailed { reason: String },

    /// Backend rejected a pulse scheduled at a clock time
    PulseRejected { at: f64, reason: String },

    /// Backend failed to replay the loaded click
    ReplayFailed { reason: String },

    /// Click asset could not be read or decoded
    AssetLoadFailed { path: String, reason: String },

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Hardware error occurred
    HardwareError { details: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Control thread stopped or its queue is full
    ControlChannelClosed,

    /// Coarse backend already holds its click sound
    SoundAlreadyLoaded,
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::TempoInvalid { .. } => AudioErrorCodes::TEMPO_INVALID,
            AudioError::BackendUnavailable { .. } => AudioErrorCodes::BACKEND_UNAVAILABLE,
            AudioError::ResumeFailed { .. } => AudioErrorCodes::RESUME_FAILED,
            AudioError::PulseRejected { .. } => AudioErrorCodes::PULSE_REJECTED,
            AudioError::ReplayFailed { .. } => AudioErrorCodes::REPLAY_FAILED,
            AudioError::AssetLoadFailed { .. } => AudioErrorCodes::ASSET_LOAD_FAILED,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
            AudioError::ControlChannelClosed => AudioErrorCodes::CONTROL_CHANNEL_CLOSED,
            AudioError::SoundAlreadyLoaded => AudioErrorCodes::SOUND_ALREADY_LOADED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::TempoInvalid { bpm } => {
                format!("Tempo must be between 1 and 300 BPM (got {})", bpm)
            }
            AudioError::BackendUnavailable { reason } => {
                format!("Audio backend unavailable: {}", reason)
            }
            AudioError::ResumeFailed { reason } => {
                format!("Audio backend is suspended and could not resume: {}", reason)
            }
            AudioError::PulseRejected { at, reason } => {
                format!("Pulse at {:.4}s rejected: {}", at, reason)
            }
            AudioError::ReplayFailed { reason } => {
                format!("Click replay failed: {}", reason)
            }
            AudioError::AssetLoadFailed { path, reason } => {
                format!("Failed to load click asset {}: {}", path, reason)
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            AudioError::ControlChannelClosed => {
                "Metronome control thread is not accepting commands".to_string()
            }
            AudioError::SoundAlreadyLoaded => {
                "Click sound already loaded for this backend".to_string()
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError {
            details: err.to_string(),
        }
    }
}
