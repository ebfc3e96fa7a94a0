//! Microphone capture via cpal.
//!
//! The cpal `Stream` is not `Send`, so the stream lives on a dedicated
//! thread that owns it and services pause/resume/stop commands. Frames are
//! handed to the async side over a bounded channel with `try_send` so the
//! device callback can never block.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc as std_mpsc;
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::frame::{AudioFormat, AudioFrame};
use super::source::{AudioSource, CaptureError};

enum StreamCommand {
    Pause,
    Resume,
    Stop,
}

/// Microphone capture source (default input device).
///
/// Captures at the device's native sample rate, down-mixes to mono, and
/// converts to i16 PCM. The negotiated format is resolved at construction
/// so the WAV header and recognizer session can be opened before the
/// stream starts.
pub struct MicSource {
    format: AudioFormat,
    device_name: String,
    cmd_tx: Option<std_mpsc::Sender<StreamCommand>>,
    frame_ms: u64,
}

impl MicSource {
    /// Resolve the default input device and its native format.
    pub fn new() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".into());
        let default_config = device
            .default_input_config()
            .map_err(|e| map_config_error(&e.to_string()))?;

        let format = AudioFormat {
            sample_rate: default_config.sample_rate().0,
            channels: 1, // down-mixed in the capture callback
            bits_per_sample: 16,
        };

        info!(
            device = %device_name,
            sample_rate = format.sample_rate,
            "Resolved input device"
        );

        Ok(Self {
            format,
            device_name,
            cmd_tx: None,
            frame_ms: 100,
        })
    }
}

/// Reject a device whose rate no longer matches the session format.
///
/// The format is fixed when the WAV header and recognizer session are
/// opened; frames produced at any other rate would be recorded wrong-speed.
fn check_device_rate(expected: &AudioFormat, device_rate: u32) -> Result<(), CaptureError> {
    if device_rate != expected.sample_rate {
        return Err(CaptureError::StartFailed(format!(
            "input device sample rate changed: session is {} Hz, device now reports {} Hz",
            expected.sample_rate, device_rate
        )));
    }
    Ok(())
}

fn map_config_error(message: &str) -> CaptureError {
    // cpal reports OS-level permission refusals as device errors; the only
    // portable signal is the error text.
    let lower = message.to_ascii_lowercase();
    if lower.contains("permission") || lower.contains("access") {
        CaptureError::PermissionDenied
    } else {
        CaptureError::StartFailed(message.to_string())
    }
}

/// Down-mix interleaved f32 samples to mono i16 by averaging channels.
fn to_mono_i16(samples: &[f32], channels: u16) -> Vec<i16> {
    let ch = channels.max(1) as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| {
            let avg = frame.iter().sum::<f32>() / ch as f32;
            (avg.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
        })
        .collect()
}

#[async_trait::async_trait]
impl AudioSource for MicSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        if self.cmd_tx.is_some() {
            return Err(CaptureError::StartFailed("capture already running".into()));
        }

        let (frame_tx, frame_rx) = mpsc::channel::<AudioFrame>(64);
        let (cmd_tx, cmd_rx) = std_mpsc::channel::<StreamCommand>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), CaptureError>>();

        let format = self.format;
        let frame_ms = self.frame_ms;

        thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || {
                run_capture_thread(format, frame_ms, frame_tx, cmd_rx, ready_tx);
            })
            .map_err(|e| CaptureError::StartFailed(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                self.cmd_tx = Some(cmd_tx);
                info!("Microphone capture started");
                Ok(frame_rx)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CaptureError::StartFailed(
                "capture thread exited before reporting readiness".into(),
            )),
        }
    }

    async fn pause(&mut self) -> Result<(), CaptureError> {
        if let Some(tx) = &self.cmd_tx {
            tx.send(StreamCommand::Pause)
                .map_err(|_| CaptureError::StartFailed("capture thread gone".into()))?;
        }
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CaptureError> {
        if let Some(tx) = &self.cmd_tx {
            tx.send(StreamCommand::Resume)
                .map_err(|_| CaptureError::StartFailed("capture thread gone".into()))?;
        }
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            // Thread may already be gone; stop tolerates that.
            let _ = tx.send(StreamCommand::Stop);
        }
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn name(&self) -> &str {
        &self.device_name
    }
}

fn run_capture_thread(
    format: AudioFormat,
    frame_ms: u64,
    frame_tx: mpsc::Sender<AudioFrame>,
    cmd_rx: std_mpsc::Receiver<StreamCommand>,
    ready_tx: oneshot::Sender<Result<(), CaptureError>>,
) {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(d) => d,
        None => {
            let _ = ready_tx.send(Err(CaptureError::NoDevice));
            return;
        }
    };

    let default_config = match device.default_input_config() {
        Ok(c) => c,
        Err(e) => {
            let _ = ready_tx.send(Err(map_config_error(&e.to_string())));
            return;
        }
    };

    if let Err(e) = check_device_rate(&format, default_config.sample_rate().0) {
        let _ = ready_tx.send(Err(e));
        return;
    }

    let channels = default_config.channels();
    let stream_config = cpal::StreamConfig {
        channels,
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };

    let samples_per_frame = format.samples_for_ms(frame_ms);
    let mut chunk_buf: Vec<i16> = Vec::with_capacity(samples_per_frame * 2);
    let mut timestamp_ms = 0u64;

    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _info: &cpal::InputCallbackInfo| {
            chunk_buf.extend(to_mono_i16(data, channels));

            while chunk_buf.len() >= samples_per_frame {
                let samples: Vec<i16> = chunk_buf.drain(..samples_per_frame).collect();
                let frame = AudioFrame {
                    samples,
                    sample_rate: format.sample_rate,
                    channels: 1,
                    timestamp_ms,
                };
                timestamp_ms += frame_ms;

                // The device callback must never block; if the consumer is
                // behind, the frame is lost at the hardware boundary.
                if frame_tx.try_send(frame).is_err() {
                    warn!("Capture channel full, dropping frame");
                }
            }
        },
        move |err| {
            error!("Audio input stream error: {}", err);
        },
        None,
    );

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(map_config_error(&e.to_string())));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(CaptureError::StartFailed(e.to_string())));
        return;
    }

    let _ = ready_tx.send(Ok(()));

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            StreamCommand::Pause => {
                if let Err(e) = stream.pause() {
                    warn!("Failed to pause input stream: {}", e);
                }
            }
            StreamCommand::Resume => {
                if let Err(e) = stream.play() {
                    warn!("Failed to resume input stream: {}", e);
                }
            }
            StreamCommand::Stop => break,
        }
    }

    // Dropping the stream here closes the frame channel.
    info!("Microphone capture stopped");
}
