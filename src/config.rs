//! Configuration management for the metronome core
//!
//! This module provides runtime configuration loading from JSON files so
//! timing constants and backend selection can be tuned without recompiling.
//! Invalid values never reach the schedulers: a loaded config is sanitized
//! before use and falls back to defaults section by section.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scheduler::Tempo;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub metronome: MetronomeConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

/// Tempo settings applied at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetronomeConfig {
    /// Tempo used until the first retune
    pub default_bpm: u32,
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self { default_bpm: 120 }
    }
}

/// Scheduler timing constants
///
/// `tick_period_ms` must stay below `lookahead_ms`, otherwise the lookahead
/// loop leaves gaps between consecutive wake-ups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// How far ahead of the audio clock pulses are committed
    pub lookahead_ms: u64,
    /// Wake-up period of the precision polling loop
    pub tick_period_ms: u64,
    /// Offset added to the clock when (re)starting so the first pulse is never in the past
    pub start_lead_ms: u64,
    /// Pause between stop and start when retuning a running metronome
    pub settle_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            lookahead_ms: 100,
            tick_period_ms: 25,
            start_lead_ms: 10,
            settle_delay_ms: 50,
        }
    }
}

impl TimingConfig {
    pub fn lookahead_secs(&self) -> f64 {
        self.lookahead_ms as f64 / 1000.0
    }

    pub fn start_lead_secs(&self) -> f64 {
        self.start_lead_ms as f64 / 1000.0
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Check the lookahead invariants
    ///
    /// # Returns
    /// * `Ok(())` - Timing can drive the precision scheduler
    /// * `Err(String)` - Description of the violated constraint
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_period_ms == 0 {
            return Err("tick_period_ms must be greater than 0".to_string());
        }
        if self.tick_period_ms >= self.lookahead_ms {
            return Err(format!(
                "tick_period_ms ({}) must be smaller than lookahead_ms ({})",
                self.tick_period_ms, self.lookahead_ms
            ));
        }
        Ok(())
    }
}

/// Which audio capability tier to drive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// Prefer the sample-accurate clock, fall back to the coarse player
    #[default]
    Auto,
    Precise,
    Coarse,
}

/// Audio backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub backend: BackendPreference,
    /// WAV file used as the click; a synthesized click is used when absent
    #[serde(default)]
    pub click_asset: Option<PathBuf>,
    /// Capacity of the queue carrying scheduled pulses to the audio thread
    pub pulse_queue_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            click_asset: None,
            pulse_queue_capacity: 64,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The sanitized configuration. If the file doesn't exist or the JSON is
    /// invalid, the defaults are returned.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config.sanitized()
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration on Android
    ///
    /// Flutter assets live inside the APK and are only reachable through the
    /// AssetManager, so Android runs on defaults.
    #[cfg(target_os = "android")]
    pub fn load_android() -> Self {
        log::info!("[Config] Using default configuration on Android");
        Self::default()
    }

    /// Load configuration for the current platform
    pub fn load() -> Self {
        #[cfg(target_os = "android")]
        {
            Self::load_android()
        }
        #[cfg(not(target_os = "android"))]
        {
            Self::load_from_file("assets/metronome_config.json")
        }
    }

    /// Replace out-of-range values so the schedulers only ever see valid input
    pub fn sanitized(mut self) -> Self {
        let tempo = Tempo::clamped(self.metronome.default_bpm as i64);
        if tempo.bpm() != self.metronome.default_bpm {
            log::warn!(
                "[Config] default_bpm {} out of range, using {}",
                self.metronome.default_bpm,
                tempo.bpm()
            );
            self.metronome.default_bpm = tempo.bpm();
        }

        if let Err(reason) = self.timing.validate() {
            log::warn!("[Config] Invalid timing ({}). Using timing defaults.", reason);
            self.timing = TimingConfig::default();
        }

        if self.audio.pulse_queue_capacity == 0 {
            log::warn!("[Config] pulse_queue_capacity must be positive, using default");
            self.audio.pulse_queue_capacity = AudioConfig::default().pulse_queue_capacity;
        }

        self
    }

    pub fn default_tempo(&self) -> Tempo {
        Tempo::clamped(self.metronome.default_bpm as i64)
    }
}
