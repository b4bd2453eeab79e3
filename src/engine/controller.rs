//! MetronomeController: single authority over scheduler lifecycle and tempo.
//!
//! The controller owns the audio service, the tempo and the one live dispatch
//! loop. It must be driven from a Tokio runtime (the control thread); the
//! dispatch loop is a task spawned on that runtime and cancelled by aborting
//! it. Aborting only stops future scheduling: pulses already committed to a
//! precise backend still play.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::{AppConfig, TimingConfig};
use crate::engine::backend::{AudioService, BackendKind, PreciseClock};
use crate::error::{log_audio_error, AudioError};
use crate::scheduler::{
    run_polling_loop, run_timer_loop, CoarseScheduler, PrecisionScheduler, Tempo,
};

/// Run state of the metronome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Telemetry event emitted by the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub timestamp_ms: u64,
    pub kind: TelemetryEventKind,
    pub detail: Option<String>,
}

/// Types of telemetry events supported by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEventKind {
    Started { bpm: u32, backend: BackendKind },
    Stopped,
    TempoChanged { bpm: u32 },
    Warning,
}

/// Read-only view of the controller for UI and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetronomeSnapshot {
    pub state: SchedulerState,
    pub bpm: u32,
    pub beat_interval_secs: f64,
    pub backend: BackendKind,
}

/// Counts live dispatch loops; decremented when the loop task is dropped.
struct LoopGuard(Arc<AtomicUsize>);

impl LoopGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MetronomeController {
    service: AudioService,
    timing: TimingConfig,
    tempo: Tempo,
    dispatch: Option<JoinHandle<()>>,
    live_loops: Arc<AtomicUsize>,
    telemetry_tx: broadcast::Sender<TelemetryEvent>,
    start_instant: Instant,
}

impl MetronomeController {
    /// Create a stopped controller with its own telemetry channel.
    pub fn new(service: AudioService, config: &AppConfig) -> Self {
        let (telemetry_tx, _) = broadcast::channel(128);
        Self::with_telemetry(service, config, telemetry_tx)
    }

    /// Create a stopped controller publishing on an existing telemetry channel.
    pub fn with_telemetry(
        service: AudioService,
        config: &AppConfig,
        telemetry_tx: broadcast::Sender<TelemetryEvent>,
    ) -> Self {
        let timing = match config.timing.validate() {
            Ok(()) => config.timing.clone(),
            Err(reason) => {
                warn!("[Metronome] Invalid timing ({}). Using timing defaults.", reason);
                TimingConfig::default()
            }
        };

        Self {
            service,
            timing,
            tempo: config.default_tempo(),
            dispatch: None,
            live_loops: Arc::new(AtomicUsize::new(0)),
            telemetry_tx,
            start_instant: Instant::now(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.telemetry_tx.subscribe()
    }

    /// A dispatch task that ended on its own (it panicked) counts as stopped.
    pub fn state(&self) -> SchedulerState {
        if self.dispatch_alive() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    fn dispatch_alive(&self) -> bool {
        self.dispatch.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn beat_interval(&self) -> f64 {
        self.tempo.beat_interval()
    }

    pub fn backend(&self) -> BackendKind {
        self.service.kind()
    }

    /// Dispatch loops whose task has not been dropped yet.
    pub fn live_loops(&self) -> usize {
        self.live_loops.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> MetronomeSnapshot {
        MetronomeSnapshot {
            state: self.state(),
            bpm: self.tempo.bpm(),
            beat_interval_secs: self.beat_interval(),
            backend: self.backend(),
        }
    }

    /// Start emitting pulses. No-op if already running.
    ///
    /// # Errors
    /// - `BackendUnavailable` when the audio service failed to initialize
    /// - `ResumeFailed` when a suspended clock refuses to resume
    ///
    /// The controller stays stopped on error.
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.dispatch_alive() {
            debug!("[Metronome] start ignored: already running");
            return Ok(());
        }
        if self.dispatch.take().is_some() {
            warn!("[Metronome] Dispatch loop ended unexpectedly, restarting");
        }

        let task = match self.spawn_dispatch() {
            Ok(task) => task,
            Err(err) => {
                log_audio_error(&err, "MetronomeController::start");
                self.emit(TelemetryEventKind::Warning, Some(err.to_string()));
                return Err(err);
            }
        };

        self.dispatch = Some(task);
        info!(
            "[Metronome] Started at {} BPM ({:?} backend)",
            self.tempo.bpm(),
            self.service.kind()
        );
        self.emit(
            TelemetryEventKind::Started {
                bpm: self.tempo.bpm(),
                backend: self.service.kind(),
            },
            None,
        );
        Ok(())
    }

    /// Stop future pulses. No-op if already stopped.
    pub fn stop(&mut self) {
        let Some(task) = self.dispatch.take() else {
            debug!("[Metronome] stop ignored: not running");
            return;
        };

        task.abort();
        info!("[Metronome] Stopped");
        self.emit(TelemetryEventKind::Stopped, None);
    }

    /// Stop if running, start otherwise.
    pub fn toggle(&mut self) -> Result<(), AudioError> {
        if self.is_running() {
            self.stop();
            Ok(())
        } else {
            self.start()
        }
    }

    /// Apply a new tempo.
    ///
    /// Out-of-range values are clamped to 1-300 BPM. A running metronome is
    /// restarted: stop, wait the settle delay, start from a fresh pulse time.
    pub async fn retune(&mut self, bpm: u32) -> Result<(), AudioError> {
        let tempo = Tempo::clamped(bpm as i64);
        if tempo.bpm() != bpm {
            warn!(
                "[Metronome] Tempo {} outside 1-300 BPM, clamped to {}",
                bpm,
                tempo.bpm()
            );
        }

        self.tempo = tempo;
        self.emit(TelemetryEventKind::TempoChanged { bpm: tempo.bpm() }, None);

        if self.is_running() {
            self.stop();
            tokio::time::sleep(self.timing.settle_delay()).await;
            self.start()?;
        }

        Ok(())
    }

    fn spawn_dispatch(&self) -> Result<JoinHandle<()>, AudioError> {
        match &self.service {
            AudioService::Unavailable { reason } => Err(AudioError::BackendUnavailable {
                reason: reason.clone(),
            }),
            AudioService::Precise { clock, click } => {
                Self::resume_if_suspended(clock.as_ref())?;

                let mut scheduler = PrecisionScheduler::new(self.timing.lookahead_secs());
                scheduler.start(clock.now() + self.timing.start_lead_secs(), self.tempo);

                let guard = LoopGuard::enter(&self.live_loops);
                let clock = Arc::clone(clock);
                let click = click.clone();
                let tick_period = self.timing.tick_period();
                Ok(tokio::spawn(async move {
                    let _guard = guard;
                    run_polling_loop(scheduler, clock, click, tick_period).await;
                }))
            }
            AudioService::Coarse { player, sound } => {
                let mut scheduler = CoarseScheduler::new();
                scheduler.start(player.as_ref(), *sound, self.tempo);

                let guard = LoopGuard::enter(&self.live_loops);
                let player = Arc::clone(player);
                let sound = *sound;
                Ok(tokio::spawn(async move {
                    let _guard = guard;
                    run_timer_loop(scheduler, player, sound).await;
                }))
            }
        }
    }

    fn resume_if_suspended(clock: &dyn PreciseClock) -> Result<(), AudioError> {
        if !clock.is_suspended() {
            return Ok(());
        }
        clock.resume()?;
        debug!("[Metronome] Resumed suspended audio clock");
        Ok(())
    }

    fn emit(&self, kind: TelemetryEventKind, detail: Option<String>) {
        let timestamp_ms = self.start_instant.elapsed().as_millis() as u64;
        let _ = self.telemetry_tx.send(TelemetryEvent {
            timestamp_ms,
            kind,
            detail,
        });
    }
}

impl Drop for MetronomeController {
    fn drop(&mut self) {
        if let Some(task) = self.dispatch.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ClickSample;
    use crate::engine::backend::{CoarsePlayer, ManualClock, RecordingPlayer};
    use std::time::Duration;

    fn precise(clock: &Arc<ManualClock>) -> AudioService {
        AudioService::Precise {
            clock: clock.clone(),
            click: Arc::from(vec![0.5_f32; 8]),
        }
    }

    fn coarse(player: &Arc<RecordingPlayer>) -> AudioService {
        let sound = player.load_once(None).unwrap();
        AudioService::Coarse {
            player: player.clone(),
            sound,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_schedules_lead_pulse() {
        let clock = Arc::new(ManualClock::following_tokio());
        let mut controller = MetronomeController::new(precise(&clock), &AppConfig::default());

        controller.start().unwrap();
        settle().await;

        assert!(controller.is_running());
        assert_eq!(clock.scheduled_pulses(), vec![0.01]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_keeps_one_loop() {
        let clock = Arc::new(ManualClock::following_tokio());
        let mut controller = MetronomeController::new(precise(&clock), &AppConfig::default());

        controller.start().unwrap();
        controller.start().unwrap();
        settle().await;

        assert_eq!(controller.live_loops(), 1);
        assert_eq!(clock.scheduled_pulses().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_releases_loop_and_is_idempotent() {
        let player = Arc::new(RecordingPlayer::new());
        let mut controller = MetronomeController::new(coarse(&player), &AppConfig::default());

        controller.start().unwrap();
        controller.stop();
        controller.stop();
        settle().await;

        assert_eq!(controller.state(), SchedulerState::Stopped);
        assert_eq!(controller.live_loops(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(player.replay_count(), 1, "No beats after stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_alternates() {
        let player = Arc::new(RecordingPlayer::new());
        let mut controller = MetronomeController::new(coarse(&player), &AppConfig::default());

        controller.toggle().unwrap();
        assert!(controller.is_running());
        controller.toggle().unwrap();
        assert!(!controller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retune_while_stopped_only_changes_tempo() {
        let player = Arc::new(RecordingPlayer::new());
        let mut controller = MetronomeController::new(coarse(&player), &AppConfig::default());

        controller.retune(90).await.unwrap();

        assert_eq!(controller.tempo().bpm(), 90);
        assert!(!controller.is_running());
        assert_eq!(player.replay_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retune_clamps_out_of_range() {
        let player = Arc::new(RecordingPlayer::new());
        let mut controller = MetronomeController::new(coarse(&player), &AppConfig::default());

        controller.retune(0).await.unwrap();
        assert_eq!(controller.tempo().bpm(), 1);
        controller.retune(5000).await.unwrap();
        assert_eq!(controller.tempo().bpm(), 300);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retune_restarts_from_fresh_pulse_time() {
        let clock = Arc::new(ManualClock::following_tokio());
        let mut controller = MetronomeController::new(precise(&clock), &AppConfig::default());

        controller.start().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        controller.retune(60).await.unwrap();
        settle().await;

        assert_eq!(controller.live_loops(), 1);
        let pulses = clock.scheduled_pulses();
        // 0.01 from the first run, then 0.2 + 0.05 settle + 0.01 lead
        assert_eq!(pulses.len(), 2);
        assert!((pulses[0] - 0.01).abs() < 1e-9);
        assert!((pulses[1] - 0.26).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_tick_period_falls_back_to_default_timing() {
        let clock = Arc::new(ManualClock::following_tokio());
        let mut config = AppConfig::default();
        config.timing.tick_period_ms = 0;
        let mut controller = MetronomeController::new(precise(&clock), &config);

        assert_eq!(controller.timing, TimingConfig::default());

        controller.start().unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(controller.state(), SchedulerState::Running);
        assert_eq!(controller.live_loops(), 1);
        assert_eq!(clock.scheduled_pulses().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_not_below_lookahead_falls_back_to_default_timing() {
        let clock = Arc::new(ManualClock::following_tokio());
        let mut config = AppConfig::default();
        config.timing.tick_period_ms = 150;
        config.timing.lookahead_ms = 100;

        let controller = MetronomeController::new(precise(&clock), &config);

        assert_eq!(controller.timing, TimingConfig::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_custom_timing_is_kept() {
        let clock = Arc::new(ManualClock::following_tokio());
        let mut config = AppConfig::default();
        config.timing.settle_delay_ms = 80;

        let controller = MetronomeController::new(precise(&clock), &config);

        assert_eq!(controller.timing.settle_delay_ms, 80);
    }

    struct FaultyClock;

    impl PreciseClock for FaultyClock {
        fn now(&self) -> f64 {
            0.0
        }

        fn schedule_pulse(&self, _click: &ClickSample, _at: f64) -> Result<(), AudioError> {
            panic!("backend fault");
        }

        fn is_suspended(&self) -> bool {
            false
        }

        fn resume(&self) -> Result<(), AudioError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_dispatch_loop_reports_stopped_and_restarts() {
        let service = AudioService::Precise {
            clock: Arc::new(FaultyClock),
            click: Arc::from(vec![0.5_f32; 8]),
        };
        let mut controller = MetronomeController::new(service, &AppConfig::default());

        controller.start().unwrap();
        settle().await;

        assert_eq!(controller.state(), SchedulerState::Stopped);
        assert_eq!(controller.live_loops(), 0);

        controller.start().unwrap();
        assert_eq!(controller.live_loops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_backend_stays_stopped() {
        let service = AudioService::Unavailable {
            reason: "no output device".to_string(),
        };
        let mut controller = MetronomeController::new(service, &AppConfig::default());
        let mut events = controller.subscribe();

        let result = controller.start();

        assert!(matches!(result, Err(AudioError::BackendUnavailable { .. })));
        assert_eq!(controller.state(), SchedulerState::Stopped);
        assert_eq!(controller.live_loops(), 0);
        assert_eq!(events.try_recv().unwrap().kind, TelemetryEventKind::Warning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_failure_stays_stopped_and_can_retry() {
        let clock = Arc::new(ManualClock::following_tokio());
        clock.set_suspended(true, true);
        let mut controller = MetronomeController::new(precise(&clock), &AppConfig::default());

        assert!(matches!(
            controller.start(),
            Err(AudioError::ResumeFailed { .. })
        ));
        assert!(!controller.is_running());
        assert!(clock.scheduled_pulses().is_empty());

        clock.set_suspended(true, false);
        controller.start().unwrap();
        settle().await;
        assert!(controller.is_running());
        assert_eq!(clock.resume_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_telemetry_sequence() {
        let player = Arc::new(RecordingPlayer::new());
        let mut controller = MetronomeController::new(coarse(&player), &AppConfig::default());
        let mut events = controller.subscribe();

        controller.start().unwrap();
        controller.retune(100).await.unwrap();
        controller.stop();

        let kinds: Vec<TelemetryEventKind> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| event.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TelemetryEventKind::Started {
                    bpm: 120,
                    backend: BackendKind::Coarse
                },
                TelemetryEventKind::TempoChanged { bpm: 100 },
                TelemetryEventKind::Stopped,
                TelemetryEventKind::Started {
                    bpm: 100,
                    backend: BackendKind::Coarse
                },
                TelemetryEventKind::Stopped,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_reflects_state() {
        let player = Arc::new(RecordingPlayer::new());
        let mut controller = MetronomeController::new(coarse(&player), &AppConfig::default());
        controller.retune(150).await.unwrap();
        controller.start().unwrap();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.state, SchedulerState::Running);
        assert_eq!(snapshot.bpm, 150);
        assert_eq!(snapshot.beat_interval_secs, 0.4);
        assert_eq!(snapshot.backend, BackendKind::Coarse);
    }
}
