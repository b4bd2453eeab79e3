//! Render callbacks for the click output streams
//!
//! Both renderers run on the real-time audio thread:
//! - No heap allocations (voices are a fixed array, clicks are shared `Arc`s)
//! - No mutex locks (pulses arrive through an `rtrb` SPSC queue, triggers via atomics)
//! - Bounded execution time (one pass over the output buffer)
//!
//! `PulseMixer` starts each scheduled click on the exact frame it was
//! scheduled for. `RetriggerVoice` restarts a single click from its first
//! sample whenever it is triggered.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::click::ClickSample;

/// Simultaneously sounding clicks; at 300 BPM a 20ms click never overlaps
/// the next one, so this only matters for long custom assets.
pub const MAX_VOICES: usize = 8;

/// A click committed to start at an absolute output frame
#[derive(Debug, Clone)]
pub struct ScheduledPulse {
    pub start_frame: u64,
    pub click: ClickSample,
}

struct Voice {
    click: ClickSample,
    position: usize,
}

/// Pulses waiting in the mixer for their start frame.
pub const MAX_PENDING: usize = 16;

/// Sample-accurate mixer for scheduled pulses
///
/// Pulses may arrive in any order: a restart commits pulses earlier than
/// ones still pending from the previous run. Each pulse starts on its own
/// frame; a pulse whose frame has already been rendered starts on the next
/// rendered frame.
pub struct PulseMixer {
    frame_counter: Arc<AtomicU64>,
    incoming: rtrb::Consumer<ScheduledPulse>,
    pending: [Option<ScheduledPulse>; MAX_PENDING],
    earliest: u64,
    voices: [Option<Voice>; MAX_VOICES],
}

impl PulseMixer {
    /// Create a mixer reading pulses from `incoming` and advancing `frame_counter`.
    pub fn new(frame_counter: Arc<AtomicU64>, incoming: rtrb::Consumer<ScheduledPulse>) -> Self {
        Self {
            frame_counter,
            incoming,
            pending: Default::default(),
            earliest: u64::MAX,
            voices: Default::default(),
        }
    }

    /// Fill one interleaved output buffer.
    pub fn render(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let frame_count = data.len() / channels;
        let block_start = self.frame_counter.load(Ordering::Relaxed);

        self.accept_incoming();

        for (i, frame) in data.chunks_exact_mut(channels).enumerate() {
            let frame_index = block_start + i as u64;
            if self.earliest <= frame_index {
                self.start_due_pulses(frame_index);
            }

            let mut sample_val = 0.0_f32;
            for slot in self.voices.iter_mut() {
                if let Some(voice) = slot {
                    sample_val += voice.click[voice.position];
                    voice.position += 1;
                    if voice.position >= voice.click.len() {
                        *slot = None;
                    }
                }
            }

            frame.fill(sample_val.clamp(-1.0, 1.0));
        }

        self.frame_counter
            .fetch_add(frame_count as u64, Ordering::Relaxed);
    }

    /// Move queued pulses into free pending slots.
    fn accept_incoming(&mut self) {
        for slot in self.pending.iter_mut().filter(|slot| slot.is_none()) {
            match self.incoming.pop() {
                Ok(pulse) => {
                    self.earliest = self.earliest.min(pulse.start_frame);
                    *slot = Some(pulse);
                }
                Err(_) => break,
            }
        }
    }

    fn start_due_pulses(&mut self, frame: u64) {
        let mut earliest = u64::MAX;
        for index in 0..MAX_PENDING {
            let Some(start_frame) = self.pending[index].as_ref().map(|p| p.start_frame) else {
                continue;
            };
            if start_frame > frame {
                earliest = earliest.min(start_frame);
            } else if let Some(pulse) = self.pending[index].take() {
                self.start_voice(pulse.click);
            }
        }
        self.earliest = earliest;

        // Slots were freed; pulses that overflowed the pending set may now fit
        self.accept_incoming();
        if self.earliest <= frame {
            self.start_due_pulses(frame);
        }
    }

    fn start_voice(&mut self, click: ClickSample) {
        if click.is_empty() {
            return;
        }

        // Free slot first, otherwise steal the voice closest to its end
        let slot = match self.voices.iter().position(Option::is_none) {
            Some(index) => index,
            None => self
                .voices
                .iter()
                .enumerate()
                .max_by_key(|(_, voice)| voice.as_ref().map_or(0, |v| v.position))
                .map_or(0, |(index, _)| index),
        };

        self.voices[slot] = Some(Voice { click, position: 0 });
    }
}

/// Single click voice restarted from its beginning on every trigger
pub struct RetriggerVoice {
    click: ClickSample,
    trigger: Arc<AtomicBool>,
    position: usize,
}

impl RetriggerVoice {
    /// Create an idle voice; setting `trigger` restarts it on the next buffer.
    pub fn new(click: ClickSample, trigger: Arc<AtomicBool>) -> Self {
        let position = click.len();
        Self {
            click,
            trigger,
            position,
        }
    }

    /// Fill one interleaved output buffer.
    pub fn render(&mut self, data: &mut [f32], channels: usize) {
        if self.trigger.swap(false, Ordering::AcqRel) {
            self.position = 0;
        }

        for frame in data.chunks_exact_mut(channels.max(1)) {
            let sample_val = match self.click.get(self.position) {
                Some(&sample) => {
                    self.position += 1;
                    sample
                }
                None => 0.0,
            };
            frame.fill(sample_val);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(len: usize, value: f32) -> ClickSample {
        Arc::from(vec![value; len])
    }

    fn mixer(capacity: usize) -> (PulseMixer, rtrb::Producer<ScheduledPulse>, Arc<AtomicU64>) {
        let counter = Arc::new(AtomicU64::new(0));
        let (producer, consumer) = rtrb::RingBuffer::new(capacity);
        (PulseMixer::new(Arc::clone(&counter), consumer), producer, counter)
    }

    #[test]
    fn test_pulse_starts_on_exact_frame() {
        let (mut mixer, mut producer, counter) = mixer(4);
        producer
            .push(ScheduledPulse {
                start_frame: 5,
                click: click(3, 0.25),
            })
            .unwrap();

        let mut data = vec![1.0_f32; 16];
        mixer.render(&mut data, 1);

        let expected: Vec<f32> = (0..16)
            .map(|i| if (5..8).contains(&i) { 0.25 } else { 0.0 })
            .collect();
        assert_eq!(data, expected);
        assert_eq!(counter.load(Ordering::Relaxed), 16);
    }

    #[test]
    fn test_pulse_in_later_block_and_stereo_output() {
        let (mut mixer, mut producer, counter) = mixer(4);
        producer
            .push(ScheduledPulse {
                start_frame: 10,
                click: click(2, 0.5),
            })
            .unwrap();

        let mut first = vec![0.0_f32; 16];
        mixer.render(&mut first, 2);
        assert!(first.iter().all(|&s| s == 0.0));
        assert_eq!(counter.load(Ordering::Relaxed), 8);

        let mut second = vec![0.0_f32; 16];
        mixer.render(&mut second, 2);
        // Frames 10 and 11 are local frames 2 and 3 of this block
        assert_eq!(&second[4..8], &[0.5, 0.5, 0.5, 0.5]);
        assert_eq!(second.iter().filter(|&&s| s != 0.0).count(), 4);
    }

    #[test]
    fn test_late_pulse_starts_immediately() {
        let (mut mixer, mut producer, counter) = mixer(4);
        counter.store(100, Ordering::Relaxed);
        producer
            .push(ScheduledPulse {
                start_frame: 50,
                click: click(2, 0.5),
            })
            .unwrap();

        let mut data = vec![0.0_f32; 4];
        mixer.render(&mut data, 1);
        assert_eq!(data, vec![0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_earlier_pulse_pushed_after_later_one_keeps_its_frame() {
        let (mut mixer, mut producer, _) = mixer(4);
        producer
            .push(ScheduledPulse {
                start_frame: 100,
                click: click(1, 0.5),
            })
            .unwrap();
        producer
            .push(ScheduledPulse {
                start_frame: 60,
                click: click(1, 0.25),
            })
            .unwrap();

        let mut data = vec![0.0_f32; 200];
        mixer.render(&mut data, 1);

        let sounding: Vec<(usize, f32)> = data
            .iter()
            .enumerate()
            .filter(|(_, &s)| s != 0.0)
            .map(|(i, &s)| (i, s))
            .collect();
        assert_eq!(sounding, vec![(60, 0.25), (100, 0.5)]);
    }

    #[test]
    fn test_pulses_beyond_pending_capacity_still_play() {
        let (mut mixer, mut producer, _) = mixer(MAX_PENDING + 4);
        for k in 0..(MAX_PENDING + 4) as u64 {
            producer
                .push(ScheduledPulse {
                    start_frame: k * 2,
                    click: click(1, 0.5),
                })
                .unwrap();
        }

        let mut data = vec![0.0_f32; (MAX_PENDING + 4) * 2];
        mixer.render(&mut data, 1);

        let starts: Vec<usize> = (0..data.len()).filter(|&i| data[i] != 0.0).collect();
        let expected: Vec<usize> = (0..MAX_PENDING + 4).map(|k| k * 2).collect();
        assert_eq!(starts, expected);
    }

    #[test]
    fn test_overlapping_pulses_are_mixed_and_clamped() {
        let (mut mixer, mut producer, _) = mixer(4);
        for start_frame in [0, 1] {
            producer
                .push(ScheduledPulse {
                    start_frame,
                    click: click(4, 0.75),
                })
                .unwrap();
        }

        let mut data = vec![0.0_f32; 6];
        mixer.render(&mut data, 1);
        assert_eq!(data, vec![0.75, 1.0, 1.0, 1.0, 0.75, 0.0]);
    }

    #[test]
    fn test_retrigger_restarts_from_beginning() {
        let trigger = Arc::new(AtomicBool::new(false));
        let samples: ClickSample = Arc::from(vec![0.1_f32, 0.2, 0.3, 0.4]);
        let mut voice = RetriggerVoice::new(samples, Arc::clone(&trigger));

        let mut silent = vec![1.0_f32; 4];
        voice.render(&mut silent, 1);
        assert_eq!(silent, vec![0.0; 4]);

        trigger.store(true, Ordering::Release);
        let mut first = vec![0.0_f32; 2];
        voice.render(&mut first, 1);
        assert_eq!(first, vec![0.1, 0.2]);

        trigger.store(true, Ordering::Release);
        let mut again = vec![0.0_f32; 6];
        voice.render(&mut again, 1);
        assert_eq!(again, vec![0.1, 0.2, 0.3, 0.4, 0.0, 0.0]);
    }
}
