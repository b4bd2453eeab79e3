//! Pulse scheduling core
//!
//! Two schedulers implement "one pulse per beat until stopped" against the
//! two audio capability tiers:
//! - `PrecisionScheduler`: lookahead loop against a sample-accurate clock
//! - `CoarseScheduler`: repeating timer that triggers playback directly
//!
//! Both are plain state machines; the `run_*` functions drive them from
//! Tokio timers on the control thread.

pub mod coarse;
pub mod precision;
pub mod tempo;

pub use coarse::{run_timer_loop, CoarseScheduler, CoarseState};
pub use precision::{run_polling_loop, PrecisionScheduler, PrecisionState};
pub use tempo::{Tempo, MAX_BPM, MIN_BPM};

/// Audio-clock timestamp in seconds since backend activation
pub type ClockTime = f64;
