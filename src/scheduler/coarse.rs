//! CoarseScheduler - fixed-period timer fallback
//!
//! Used when the backend can only "play now". Beat zero fires on start,
//! then a repeating timer with period = beat interval replays the click.
//! There is no lookahead and no clock compensation; timer drift is accepted.

use std::sync::Arc;
use std::time::Duration;

use log::warn;
use tokio::time::{Instant, MissedTickBehavior};

use super::Tempo;
use crate::engine::backend::{CoarsePlayer, SoundHandle};

/// Timer state of the fallback path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoarseState {
    Idle,
    TimerActive,
}

/// Interval-timer scheduler for fire-and-play backends
#[derive(Debug, Clone)]
pub struct CoarseScheduler {
    state: CoarseState,
    period: Duration,
    triggers: u64,
}

impl CoarseScheduler {
    pub fn new() -> Self {
        Self {
            state: CoarseState::Idle,
            period: Tempo::default().beat_period(),
            triggers: 0,
        }
    }

    /// Activate the timer state and fire beat zero immediately.
    pub fn start<P>(&mut self, player: &P, sound: SoundHandle, tempo: Tempo)
    where
        P: CoarsePlayer + ?Sized,
    {
        self.state = CoarseState::TimerActive;
        self.period = tempo.beat_period();
        self.triggers = 0;
        self.trigger(player, sound);
    }

    /// Handle one timer firing.
    ///
    /// # Returns
    /// `true` if the backend accepted the replay.
    pub fn on_timer<P>(&mut self, player: &P, sound: SoundHandle) -> bool
    where
        P: CoarsePlayer + ?Sized,
    {
        if self.state == CoarseState::Idle {
            return false;
        }
        self.trigger(player, sound)
    }

    pub fn stop(&mut self) {
        self.state = CoarseState::Idle;
    }

    pub fn state(&self) -> CoarseState {
        self.state
    }

    /// Timer period, equal to the beat interval of the tempo given to `start`.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Replays accepted by the backend since the last start.
    pub fn triggers(&self) -> u64 {
        self.triggers
    }

    fn trigger<P>(&mut self, player: &P, sound: SoundHandle) -> bool
    where
        P: CoarsePlayer + ?Sized,
    {
        match player.replay(sound) {
            Ok(()) => {
                self.triggers += 1;
                true
            }
            Err(err) => {
                warn!("[CoarseScheduler] Missed beat: {}", err);
                false
            }
        }
    }
}

impl Default for CoarseScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Replay the click once per period until the task is aborted.
///
/// Beat zero is expected to have been fired by `CoarseScheduler::start`, so
/// the first timer firing is one full period away. Late firings are not
/// compensated with bursts.
pub async fn run_timer_loop(
    mut scheduler: CoarseScheduler,
    player: Arc<dyn CoarsePlayer>,
    sound: SoundHandle,
) {
    let period = scheduler.period();
    let mut timer = tokio::time::interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        timer.tick().await;
        scheduler.on_timer(player.as_ref(), sound);
    }
}
