//! PrecisionScheduler - lookahead scheduling against a sample-accurate clock
//!
//! A low-frequency tick wakes the scheduler, which commits every pulse whose
//! start time falls inside the lookahead window to the audio backend. The
//! start times are clock timestamps, so jitter in the wake-ups only changes
//! how far ahead pulses are queued, never when they sound.
//!
//! Pulse times are computed as `origin + k * beat_interval` rather than by
//! repeated addition, so long runs do not accumulate floating-point drift.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::time::MissedTickBehavior;

use super::{ClockTime, Tempo};
use crate::audio::ClickSample;
use crate::engine::backend::PreciseClock;

/// Polling state of the lookahead loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecisionState {
    Idle,
    Polling,
}

/// Lookahead scheduler for backends with a sample-accurate clock
#[derive(Debug, Clone)]
pub struct PrecisionScheduler {
    state: PrecisionState,
    lookahead: f64,
    beat_interval: f64,
    origin: ClockTime,
    beats_issued: u64,
}

impl PrecisionScheduler {
    /// Create an idle scheduler with the given lookahead window in seconds.
    pub fn new(lookahead: f64) -> Self {
        Self {
            state: PrecisionState::Idle,
            lookahead,
            beat_interval: Tempo::default().beat_interval(),
            origin: 0.0,
            beats_issued: 0,
        }
    }

    /// Begin polling with the first pulse due at `first_pulse`.
    pub fn start(&mut self, first_pulse: ClockTime, tempo: Tempo) {
        self.state = PrecisionState::Polling;
        self.origin = first_pulse;
        self.beat_interval = tempo.beat_interval();
        self.beats_issued = 0;
        debug!(
            "[PrecisionScheduler] Polling from {:.4}s, interval {:.4}s",
            first_pulse, self.beat_interval
        );
    }

    pub fn stop(&mut self) {
        self.state = PrecisionState::Idle;
    }

    pub fn state(&self) -> PrecisionState {
        self.state
    }

    /// Clock time of the next pulse that has not been handed to the backend yet.
    #[inline]
    pub fn next_pulse_time(&self) -> ClockTime {
        self.origin + self.beats_issued as f64 * self.beat_interval
    }

    /// Number of pulse slots consumed since the last start, rejected ones included.
    pub fn beats_issued(&self) -> u64 {
        self.beats_issued
    }

    /// One wake-up of the lookahead loop.
    ///
    /// Schedules, in chronological order, every pulse earlier than
    /// `clock.now() + lookahead`. A delayed wake-up therefore catches up on
    /// all pulses that became due in the meantime. A pulse the backend
    /// rejects is logged and its slot skipped.
    ///
    /// # Returns
    /// Number of pulses the backend accepted during this wake-up.
    pub fn tick<C>(&mut self, clock: &C, click: &ClickSample) -> usize
    where
        C: PreciseClock + ?Sized,
    {
        if self.state == PrecisionState::Idle {
            return 0;
        }

        let horizon = clock.now() + self.lookahead;
        let mut accepted = 0;

        while self.next_pulse_time() < horizon {
            let at = self.next_pulse_time();
            match clock.schedule_pulse(click, at) {
                Ok(()) => accepted += 1,
                Err(err) => warn!("[PrecisionScheduler] Skipping pulse at {:.4}s: {}", at, err),
            }
            self.beats_issued += 1;
        }

        accepted
    }
}

/// Drive a started scheduler once per `tick_period` until the task is aborted.
///
/// The first wake-up happens immediately so the opening pulse is committed
/// without waiting a full tick.
pub async fn run_polling_loop(
    mut scheduler: PrecisionScheduler,
    clock: Arc<dyn PreciseClock>,
    click: ClickSample,
    tick_period: Duration,
) {
    let mut ticker = tokio::time::interval(tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        scheduler.tick(clock.as_ref(), &click);
    }
}
