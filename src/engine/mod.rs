//! Engine module housing the metronome core.
//!
//! `backend` defines the two audio capability tiers and their cpal and
//! in-process implementations. `controller` owns the scheduler lifecycle and
//! `handle` runs it on a dedicated control thread.

pub mod backend;
pub mod controller;
pub mod handle;

pub use backend::{
    AudioService, BackendKind, CoarsePlayer, CpalClockBackend, CpalReplayBackend, ManualClock,
    PreciseClock, RecordingPlayer, SoundHandle,
};
pub use controller::{
    MetronomeController, MetronomeSnapshot, SchedulerState, TelemetryEvent, TelemetryEventKind,
};
pub use handle::{ControlCommand, MetronomeHandle};
