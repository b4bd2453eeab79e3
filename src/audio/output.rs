//! Output stream host - owns a cpal output stream on a dedicated thread
//!
//! `cpal::Stream` is not `Send` on every platform, so the stream is built
//! and kept alive by its own thread. The rest of the crate talks to it through
//! a command channel, which keeps the backend handles `Send + Sync`.

use std::sync::mpsc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error};

use crate::error::AudioError;

/// Negotiated format of the default output device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: usize,
}

enum StreamCommand {
    Play(mpsc::Sender<Result<(), AudioError>>),
    Pause(mpsc::Sender<Result<(), AudioError>>),
}

/// Handle to an output stream running on its own thread
///
/// Dropping the host closes the command channel, which drops the stream
/// and joins the thread.
pub struct OutputStreamHost {
    commands: Option<mpsc::Sender<StreamCommand>>,
    format: StreamFormat,
    thread: Option<JoinHandle<()>>,
}

impl OutputStreamHost {
    /// Open the default output device and start the stream thread.
    ///
    /// # Arguments
    /// * `name` - Thread name, used in logs
    /// * `start_playing` - Whether the stream plays right away or starts paused
    /// * `make_render` - Builds the render callback once the format is known
    ///
    /// # Errors
    /// `StreamOpenFailed` if there is no usable output device or the format
    /// is not F32, `HardwareError` if the stream refuses to start.
    pub fn spawn<M, R>(name: &str, start_playing: bool, make_render: M) -> Result<Self, AudioError>
    where
        M: FnOnce(StreamFormat) -> R + Send + 'static,
        R: FnMut(&mut [f32], usize) + Send + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<StreamFormat, AudioError>>();
        let (command_tx, command_rx) = mpsc::channel::<StreamCommand>();
        let thread_name = name.to_string();

        let thread = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let (stream, format) = match build_output_stream(make_render) {
                    Ok(opened) => opened,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                let initial = if start_playing {
                    stream.play().map_err(|e| AudioError::HardwareError {
                        details: format!("Output start failed: {}", e),
                    })
                } else {
                    // Some hosts start streams implicitly; failing to pause only
                    // means the clock runs before the first resume.
                    if let Err(e) = stream.pause() {
                        debug!("[{}] Initial pause not supported: {}", thread_name, e);
                    }
                    Ok(())
                };

                if let Err(err) = initial {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
                let _ = ready_tx.send(Ok(format));

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StreamCommand::Play(reply) => {
                            let _ = reply.send(stream.play().map_err(|e| {
                                AudioError::HardwareError {
                                    details: format!("Output start failed: {}", e),
                                }
                            }));
                        }
                        StreamCommand::Pause(reply) => {
                            let _ = reply.send(stream.pause().map_err(|e| {
                                AudioError::HardwareError {
                                    details: format!("Output pause failed: {}", e),
                                }
                            }));
                        }
                    }
                }

                debug!("[{}] Command channel closed, releasing stream", thread_name);
            })?;

        let format = ready_rx
            .recv()
            .map_err(|_| AudioError::StreamOpenFailed {
                reason: "Output thread exited before the stream opened".to_string(),
            })??;

        Ok(Self {
            commands: Some(command_tx),
            format,
            thread: Some(thread),
        })
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Start or resume rendering.
    pub fn play(&self) -> Result<(), AudioError> {
        self.request(StreamCommand::Play)
    }

    /// Pause rendering; the render callback stops being called.
    pub fn pause(&self) -> Result<(), AudioError> {
        self.request(StreamCommand::Pause)
    }

    fn request<F>(&self, command: F) -> Result<(), AudioError>
    where
        F: FnOnce(mpsc::Sender<Result<(), AudioError>>) -> StreamCommand,
    {
        let stream_gone = || AudioError::StreamOpenFailed {
            reason: "Output stream thread is not running".to_string(),
        };

        let commands = self.commands.as_ref().ok_or_else(stream_gone)?;
        let (reply_tx, reply_rx) = mpsc::channel();
        commands.send(command(reply_tx)).map_err(|_| stream_gone())?;
        reply_rx.recv().map_err(|_| stream_gone())?
    }
}

impl Drop for OutputStreamHost {
    fn drop(&mut self) {
        self.commands.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Output stream thread panicked");
            }
        }
    }
}

fn build_output_stream<M, R>(make_render: M) -> Result<(cpal::Stream, StreamFormat), AudioError>
where
    M: FnOnce(StreamFormat) -> R,
    R: FnMut(&mut [f32], usize) + Send + 'static,
{
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::StreamOpenFailed {
            reason: "No default output device found".to_string(),
        })?;

    let config = device
        .default_output_config()
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("Failed to get default output config: {:?}", e),
        })?;

    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(AudioError::StreamOpenFailed {
            reason: "Only F32 sample format is currently supported for output".to_string(),
        });
    }

    let stream_config: cpal::StreamConfig = config.into();
    let format = StreamFormat {
        sample_rate: stream_config.sample_rate.0,
        channels: stream_config.channels as usize,
    };

    let mut render = make_render(format);
    let channels = format.channels;
    let err_fn = |err: cpal::StreamError| error!("Output stream error: {}", err);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| render(data, channels),
            err_fn,
            None,
        )
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("{:?}", e),
        })?;

    Ok((stream, format))
}
