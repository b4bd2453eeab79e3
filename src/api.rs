// Public API for flutter_rust_bridge integration
// This module provides FFI functions for Flutter to drive the metronome

#![allow(dead_code)] // FFI functions are called from Dart, not detected by Rust analyzer

use anyhow::Result;
use once_cell::sync::Lazy;

use crate::config::AppConfig;
use crate::engine::{MetronomeHandle, MetronomeSnapshot};
use crate::error::AudioError;
use crate::input::parse_tempo_input;

// Re-export error code constants for FFI exposure
pub use crate::error::AudioErrorCodes;

/// Process-wide metronome, created on first use.
///
/// The audio service is detected once here; a failed detection leaves the
/// metronome in the unavailable state rather than failing this initializer.
static METRONOME: Lazy<Result<MetronomeHandle, AudioError>> = Lazy::new(|| {
    crate::init_logging();
    crate::log_startup_banner();
    MetronomeHandle::spawn(AppConfig::load())
});

fn metronome() -> Result<&'static MetronomeHandle, AudioError> {
    METRONOME.as_ref().map_err(Clone::clone)
}

/// Get the version of the metronome core
#[flutter_rust_bridge::frb(sync)]
pub fn get_version() -> Result<String> {
    Ok(env!("CARGO_PKG_VERSION").to_string())
}

/// Start the metronome if stopped, stop it if running
///
/// # Errors
/// - `BackendUnavailable` if audio could not be initialized this session
/// - `ResumeFailed` if the suspended audio clock refused to resume
#[flutter_rust_bridge::frb]
pub fn toggle() -> Result<(), AudioError> {
    metronome()?.toggle()
}

/// Set the tempo in BPM
///
/// Values outside 1-300 are clamped. A running metronome restarts after a
/// short settle delay; this call returns once it is running again.
#[flutter_rust_bridge::frb]
pub fn retune(bpm: u32) -> Result<(), AudioError> {
    metronome()?.retune(bpm)
}

/// Apply raw tempo text from the input field
///
/// # Returns
/// * `Ok(Some(bpm))` - the clamped tempo that was applied
/// * `Ok(None)` - the text was not a number; tempo unchanged
#[flutter_rust_bridge::frb]
pub fn submit_tempo_input(raw: String) -> Result<Option<u32>, AudioError> {
    match parse_tempo_input(&raw) {
        Some(tempo) => {
            metronome()?.retune(tempo.bpm())?;
            Ok(Some(tempo.bpm()))
        }
        None => Ok(None),
    }
}

/// Current run state, tempo and backend
#[flutter_rust_bridge::frb]
pub fn metronome_state() -> Result<MetronomeSnapshot, AudioError> {
    metronome()?.snapshot()
}
