use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::time::Instant;

use crate::audio::ClickSample;
use crate::error::AudioError;
use crate::scheduler::ClockTime;

use super::{CoarsePlayer, PreciseClock, SoundHandle};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Consume one unit of a "fail the next N calls" budget.
fn take_failure(budget: &AtomicUsize) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

enum ClockSource {
    Fixed(ClockTime),
    Tokio(Instant),
}

/// In-process precise clock used for deterministic tests and CLI simulations.
///
/// Time is either set by hand (`new`) or follows Tokio's clock from the moment
/// of creation (`following_tokio`), which makes paused-time tests exact.
/// Every accepted pulse is recorded in scheduling order.
pub struct ManualClock {
    source: Mutex<ClockSource>,
    scheduled: Mutex<Vec<ClockTime>>,
    fail_pulses: AtomicUsize,
    suspended: AtomicBool,
    fail_resume: AtomicBool,
    resume_calls: AtomicUsize,
}

impl ManualClock {
    /// Clock fixed at 0.0 until moved with `set_now`/`advance`.
    pub fn new() -> Self {
        Self::with_source(ClockSource::Fixed(0.0))
    }

    /// Clock reading the elapsed Tokio time since this call.
    pub fn following_tokio() -> Self {
        Self::with_source(ClockSource::Tokio(Instant::now()))
    }

    fn with_source(source: ClockSource) -> Self {
        Self {
            source: Mutex::new(source),
            scheduled: Mutex::new(Vec::new()),
            fail_pulses: AtomicUsize::new(0),
            suspended: AtomicBool::new(false),
            fail_resume: AtomicBool::new(false),
            resume_calls: AtomicUsize::new(0),
        }
    }

    /// Pin the clock to `now` seconds.
    pub fn set_now(&self, now: ClockTime) {
        *lock(&self.source) = ClockSource::Fixed(now);
    }

    /// Move the clock forward by `seconds`.
    pub fn advance(&self, seconds: f64) {
        let now = self.now();
        self.set_now(now + seconds);
    }

    /// Reject the next `count` calls to `schedule_pulse`.
    pub fn fail_next_pulses(&self, count: usize) {
        self.fail_pulses.store(count, Ordering::SeqCst);
    }

    /// Start suspended; `fail_resume` makes every resume attempt fail.
    pub fn set_suspended(&self, suspended: bool, fail_resume: bool) {
        self.suspended.store(suspended, Ordering::SeqCst);
        self.fail_resume.store(fail_resume, Ordering::SeqCst);
    }

    pub fn resume_calls(&self) -> usize {
        self.resume_calls.load(Ordering::SeqCst)
    }

    /// Clock times of every accepted pulse, in scheduling order.
    pub fn scheduled_pulses(&self) -> Vec<ClockTime> {
        lock(&self.scheduled).clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PreciseClock for ManualClock {
    fn now(&self) -> ClockTime {
        match *lock(&self.source) {
            ClockSource::Fixed(now) => now,
            ClockSource::Tokio(origin) => origin.elapsed().as_secs_f64(),
        }
    }

    fn schedule_pulse(&self, _click: &ClickSample, at: ClockTime) -> Result<(), AudioError> {
        if take_failure(&self.fail_pulses) {
            return Err(AudioError::PulseRejected {
                at,
                reason: "injected failure".to_string(),
            });
        }
        lock(&self.scheduled).push(at);
        Ok(())
    }

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    fn resume(&self) -> Result<(), AudioError> {
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_resume.load(Ordering::SeqCst) {
            return Err(AudioError::ResumeFailed {
                reason: "backend refused to resume".to_string(),
            });
        }
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// In-process coarse player recording the Tokio instant of every replay.
pub struct RecordingPlayer {
    loaded: AtomicBool,
    fail_load: AtomicBool,
    fail_replays: AtomicUsize,
    replays: Mutex<Vec<Instant>>,
}

impl RecordingPlayer {
    pub fn new() -> Self {
        Self {
            loaded: AtomicBool::new(false),
            fail_load: AtomicBool::new(false),
            fail_replays: AtomicUsize::new(0),
            replays: Mutex::new(Vec::new()),
        }
    }

    /// Make `load_once` fail as if the asset could not be decoded.
    pub fn fail_load(&self) {
        self.fail_load.store(true, Ordering::SeqCst);
    }

    /// Reject the next `count` calls to `replay`.
    pub fn fail_next_replays(&self, count: usize) {
        self.fail_replays.store(count, Ordering::SeqCst);
    }

    pub fn replay_count(&self) -> usize {
        lock(&self.replays).len()
    }

    pub fn replay_instants(&self) -> Vec<Instant> {
        lock(&self.replays).clone()
    }
}

impl Default for RecordingPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl CoarsePlayer for RecordingPlayer {
    fn load_once(&self, path: Option<&Path>) -> Result<SoundHandle, AudioError> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(AudioError::AssetLoadFailed {
                path: path.map_or_else(|| "<built-in>".to_string(), |p| p.display().to_string()),
                reason: "injected failure".to_string(),
            });
        }
        if self.loaded.swap(true, Ordering::SeqCst) {
            return Err(AudioError::SoundAlreadyLoaded);
        }
        Ok(SoundHandle(0))
    }

    fn replay(&self, sound: SoundHandle) -> Result<(), AudioError> {
        if !self.loaded.load(Ordering::SeqCst) || sound != SoundHandle(0) {
            return Err(AudioError::ReplayFailed {
                reason: format!("no sound loaded for {:?}", sound),
            });
        }
        if take_failure(&self.fail_replays) {
            return Err(AudioError::ReplayFailed {
                reason: "injected failure".to_string(),
            });
        }
        lock(&self.replays).push(Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_manual_clock_moves_only_when_told() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), 0.0);
        clock.set_now(1.5);
        clock.advance(0.5);
        assert_eq!(clock.now(), 2.0);
    }

    #[test]
    fn test_failure_budget_is_consumed() {
        let clock = ManualClock::new();
        let click: ClickSample = Arc::from(vec![0.0_f32; 1]);
        clock.fail_next_pulses(2);

        assert!(clock.schedule_pulse(&click, 0.1).is_err());
        assert!(clock.schedule_pulse(&click, 0.2).is_err());
        assert!(clock.schedule_pulse(&click, 0.3).is_ok());
        assert_eq!(clock.scheduled_pulses(), vec![0.3]);
    }

    #[test]
    fn test_resume_failure_keeps_clock_suspended() {
        let clock = ManualClock::new();
        clock.set_suspended(true, true);

        assert!(matches!(clock.resume(), Err(AudioError::ResumeFailed { .. })));
        assert!(clock.is_suspended());

        clock.set_suspended(true, false);
        assert!(clock.resume().is_ok());
        assert!(!clock.is_suspended());
        assert_eq!(clock.resume_calls(), 2);
    }

    #[test]
    fn test_recording_player_requires_single_load() {
        let player = RecordingPlayer::new();
        assert!(player.replay(SoundHandle(0)).is_err());

        let sound = player.load_once(None).unwrap();
        assert_eq!(player.load_once(None), Err(AudioError::SoundAlreadyLoaded));
        assert!(player.replay(sound).is_ok());
        assert_eq!(player.replay_count(), 1);
    }
}
