//! MetronomeHandle: thread-safe front door to the controller.
//!
//! The controller lives on a dedicated "metronome-control" thread running a
//! current-thread Tokio runtime. Callers on any thread send `ControlCommand`s
//! and block on a oneshot reply, so all lifecycle operations are serialized.

use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use log::{debug, error, info};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::config::AppConfig;
use crate::engine::backend::AudioService;
use crate::engine::controller::{MetronomeController, MetronomeSnapshot, TelemetryEvent};
use crate::error::AudioError;

const COMMAND_QUEUE_CAPACITY: usize = 64;
const TELEMETRY_CAPACITY: usize = 128;

type Reply<T> = oneshot::Sender<T>;

/// Commands processed in order by the control thread
pub enum ControlCommand {
    Start(Reply<Result<(), AudioError>>),
    Stop(Reply<()>),
    Toggle(Reply<Result<(), AudioError>>),
    Retune(u32, Reply<Result<(), AudioError>>),
    Snapshot(Reply<MetronomeSnapshot>),
    Shutdown,
}

pub struct MetronomeHandle {
    commands: Option<mpsc::Sender<ControlCommand>>,
    telemetry_tx: broadcast::Sender<TelemetryEvent>,
    worker: Option<JoinHandle<()>>,
}

impl MetronomeHandle {
    /// Spawn the control thread with the audio service detected from `config`.
    pub fn spawn(config: AppConfig) -> Result<Self, AudioError> {
        Self::spawn_with_service(config, |config| AudioService::detect(&config.audio))
    }

    /// Spawn the control thread with a caller-provided audio service.
    ///
    /// `make_service` runs on the control thread before any command is handled.
    pub fn spawn_with_service<F>(config: AppConfig, make_service: F) -> Result<Self, AudioError>
    where
        F: FnOnce(&AppConfig) -> AudioService + Send + 'static,
    {
        let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (telemetry_tx, _) = broadcast::channel(TELEMETRY_CAPACITY);
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);

        let worker_telemetry = telemetry_tx.clone();
        let worker = std::thread::Builder::new()
            .name("metronome-control".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        let _ = ready_tx.send(Err(AudioError::HardwareError {
                            details: format!("Failed to create control runtime: {}", err),
                        }));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let service = make_service(&config);
                    let controller =
                        MetronomeController::with_telemetry(service, &config, worker_telemetry);
                    let _ = ready_tx.send(Ok(()));
                    run_control_loop(controller, command_rx).await;
                });
            })
            .map_err(|err| AudioError::HardwareError {
                details: format!("Failed to spawn control thread: {}", err),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = worker.join();
                return Err(err);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(AudioError::ControlChannelClosed);
            }
        }

        info!("[MetronomeHandle] Control thread ready");
        Ok(Self {
            commands: Some(commands),
            telemetry_tx,
            worker: Some(worker),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.telemetry_tx.subscribe()
    }

    pub fn start(&self) -> Result<(), AudioError> {
        self.request(ControlCommand::Start)?
    }

    pub fn stop(&self) -> Result<(), AudioError> {
        self.request(ControlCommand::Stop)
    }

    pub fn toggle(&self) -> Result<(), AudioError> {
        self.request(ControlCommand::Toggle)?
    }

    /// Blocks for the settle delay when the metronome is running.
    pub fn retune(&self, bpm: u32) -> Result<(), AudioError> {
        self.request(|reply| ControlCommand::Retune(bpm, reply))?
    }

    pub fn snapshot(&self) -> Result<MetronomeSnapshot, AudioError> {
        self.request(ControlCommand::Snapshot)
    }

    fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> ControlCommand,
    ) -> Result<T, AudioError> {
        let commands = self
            .commands
            .as_ref()
            .ok_or(AudioError::ControlChannelClosed)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        commands
            .blocking_send(make(reply_tx))
            .map_err(|_| AudioError::ControlChannelClosed)?;
        reply_rx
            .blocking_recv()
            .map_err(|_| AudioError::ControlChannelClosed)
    }
}

impl Drop for MetronomeHandle {
    fn drop(&mut self) {
        // Closing the channel also ends the loop if the queue is full
        if let Some(commands) = self.commands.take() {
            let _ = commands.try_send(ControlCommand::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("[MetronomeHandle] Control thread panicked");
            }
        }
    }
}

async fn run_control_loop(
    mut controller: MetronomeController,
    mut commands: mpsc::Receiver<ControlCommand>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            ControlCommand::Start(reply) => {
                let _ = reply.send(controller.start());
            }
            ControlCommand::Stop(reply) => {
                controller.stop();
                let _ = reply.send(());
            }
            ControlCommand::Toggle(reply) => {
                let _ = reply.send(controller.toggle());
            }
            ControlCommand::Retune(bpm, reply) => {
                let _ = reply.send(controller.retune(bpm).await);
            }
            ControlCommand::Snapshot(reply) => {
                let _ = reply.send(controller.snapshot());
            }
            ControlCommand::Shutdown => break,
        }
    }

    controller.stop();
    debug!("[MetronomeHandle] Control loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::{BackendKind, CoarsePlayer, RecordingPlayer};
    use crate::engine::controller::{SchedulerState, TelemetryEventKind};
    use std::sync::Arc;

    fn spawn_recording() -> (MetronomeHandle, Arc<RecordingPlayer>) {
        let player = Arc::new(RecordingPlayer::new());
        let service_player = Arc::clone(&player);
        let handle = MetronomeHandle::spawn_with_service(AppConfig::default(), move |_| {
            let sound = service_player.load_once(None).unwrap();
            AudioService::Coarse {
                player: service_player,
                sound,
            }
        })
        .unwrap();
        (handle, player)
    }

    #[test]
    fn test_toggle_round_trip_through_control_thread() {
        let (handle, player) = spawn_recording();

        handle.toggle().unwrap();
        assert_eq!(handle.snapshot().unwrap().state, SchedulerState::Running);
        assert!(player.replay_count() >= 1);

        handle.toggle().unwrap();
        assert_eq!(handle.snapshot().unwrap().state, SchedulerState::Stopped);
    }

    #[test]
    fn test_retune_clamps_and_keeps_running() {
        let (handle, _player) = spawn_recording();
        handle.start().unwrap();

        handle.retune(1000).unwrap();

        let snapshot = handle.snapshot().unwrap();
        assert_eq!(snapshot.bpm, 300);
        assert_eq!(snapshot.state, SchedulerState::Running);
        assert_eq!(snapshot.backend, BackendKind::Coarse);
    }

    #[test]
    fn test_unavailable_service_reports_error() {
        let handle = MetronomeHandle::spawn_with_service(AppConfig::default(), |_| {
            AudioService::Unavailable {
                reason: "no device".to_string(),
            }
        })
        .unwrap();

        assert!(matches!(
            handle.toggle(),
            Err(AudioError::BackendUnavailable { .. })
        ));
        assert_eq!(handle.snapshot().unwrap().state, SchedulerState::Stopped);
    }

    #[test]
    fn test_subscribers_receive_events() {
        let (handle, _player) = spawn_recording();
        let mut events = handle.subscribe();

        handle.retune(90).unwrap();

        let event = events.blocking_recv().unwrap();
        assert_eq!(event.kind, TelemetryEventKind::TempoChanged { bpm: 90 });
    }
}
