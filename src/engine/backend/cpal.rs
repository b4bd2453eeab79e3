//! cpal-based audio backends
//!
//! - `CpalClockBackend`: sample-accurate clock. Time is the rendered frame
//!   count divided by the sample rate; pulses travel to the audio thread
//!   through an `rtrb` queue and start on their exact frame.
//! - `CpalReplayBackend`: fire-and-play fallback with one retriggerable voice.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::HostTrait;
use log::info;

use crate::audio::click::{self, frames_to_seconds, seconds_to_frames};
use crate::audio::{ClickSample, OutputStreamHost, PulseMixer, RetriggerVoice, ScheduledPulse};
use crate::error::{log_audio_error, AudioError, ErrorCode};
use crate::scheduler::ClockTime;

use super::{CoarsePlayer, PreciseClock, SoundHandle};

/// Precise-clock backend on the default output device
///
/// The stream opens paused, so the backend reports itself suspended until
/// the first `resume()`.
pub struct CpalClockBackend {
    host: OutputStreamHost,
    frame_counter: Arc<AtomicU64>,
    producer: Mutex<rtrb::Producer<ScheduledPulse>>,
    suspended: AtomicBool,
}

impl CpalClockBackend {
    /// Open the output stream with room for `queue_capacity` pending pulses.
    pub fn open(queue_capacity: usize) -> Result<Self, AudioError> {
        let frame_counter = Arc::new(AtomicU64::new(0));
        let (producer, consumer) = rtrb::RingBuffer::new(queue_capacity.max(1));

        let mixer_counter = Arc::clone(&frame_counter);
        let host = OutputStreamHost::spawn("metronome-clock", false, move |_format| {
            let mut mixer = PulseMixer::new(mixer_counter, consumer);
            move |data: &mut [f32], channels: usize| mixer.render(data, channels)
        })?;

        info!(
            "[CpalClockBackend] Opened output at {} Hz, {} channel(s)",
            host.format().sample_rate,
            host.format().channels
        );

        Ok(Self {
            host,
            frame_counter,
            producer: Mutex::new(producer),
            suspended: AtomicBool::new(true),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.host.format().sample_rate
    }
}

impl PreciseClock for CpalClockBackend {
    fn now(&self) -> ClockTime {
        frames_to_seconds(self.frame_counter.load(Ordering::Relaxed), self.sample_rate())
    }

    fn schedule_pulse(&self, click: &ClickSample, at: ClockTime) -> Result<(), AudioError> {
        let pulse = ScheduledPulse {
            start_frame: seconds_to_frames(at, self.sample_rate()),
            click: Arc::clone(click),
        };

        let mut producer = self.producer.lock().map_err(|_| AudioError::LockPoisoned {
            component: "pulse_queue".to_string(),
        })?;

        producer.push(pulse).map_err(|_| AudioError::PulseRejected {
            at,
            reason: "pulse queue full".to_string(),
        })
    }

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    fn resume(&self) -> Result<(), AudioError> {
        self.host.play().map_err(|err| AudioError::ResumeFailed {
            reason: err.message(),
        })?;
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }
}

struct LoadedClick {
    handle: SoundHandle,
    trigger: Arc<AtomicBool>,
    _host: OutputStreamHost,
}

/// Coarse backend: replays one loaded click from its start on demand
pub struct CpalReplayBackend {
    loaded: Mutex<Option<LoadedClick>>,
}

impl CpalReplayBackend {
    /// Check that an output device exists; the stream opens in `load_once`.
    pub fn open() -> Result<Self, AudioError> {
        cpal::default_host()
            .default_output_device()
            .ok_or_else(|| AudioError::StreamOpenFailed {
                reason: "No default output device found".to_string(),
            })?;

        Ok(Self {
            loaded: Mutex::new(None),
        })
    }

    fn lock_loaded(&self) -> Result<std::sync::MutexGuard<'_, Option<LoadedClick>>, AudioError> {
        self.loaded.lock().map_err(|_| {
            let err = AudioError::LockPoisoned {
                component: "replay_backend".to_string(),
            };
            log_audio_error(&err, "lock_loaded");
            err
        })
    }
}

impl CoarsePlayer for CpalReplayBackend {
    fn load_once(&self, path: Option<&Path>) -> Result<SoundHandle, AudioError> {
        let mut loaded = self.lock_loaded()?;
        if loaded.is_some() {
            return Err(AudioError::SoundAlreadyLoaded);
        }

        let asset = path.map(click::load_click_wav).transpose()?;
        let trigger = Arc::new(AtomicBool::new(false));
        let voice_trigger = Arc::clone(&trigger);

        let host = OutputStreamHost::spawn("metronome-replay", true, move |format| {
            let mut voice =
                RetriggerVoice::new(click::prepare_click(asset, format.sample_rate), voice_trigger);
            move |data: &mut [f32], channels: usize| voice.render(data, channels)
        })?;

        let handle = SoundHandle(0);
        *loaded = Some(LoadedClick {
            handle,
            trigger,
            _host: host,
        });
        Ok(handle)
    }

    fn replay(&self, sound: SoundHandle) -> Result<(), AudioError> {
        let loaded = self.lock_loaded()?;
        match loaded.as_ref() {
            Some(click) if click.handle == sound => {
                click.trigger.store(true, Ordering::Release);
                Ok(())
            }
            _ => Err(AudioError::ReplayFailed {
                reason: format!("no sound loaded for {:?}", sound),
            }),
        }
    }
}
