use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::frame::{AudioFormat, AudioFrame};

/// Errors from opening or starting an audio source.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Microphone access denied")]
    PermissionDenied,

    #[error("No audio input device available")]
    NoDevice,

    #[error("Failed to start audio capture: {0}")]
    StartFailed(String),
}

/// Audio capture source trait
///
/// Implementations:
/// - `MicSource`: cpal microphone capture (default input device)
/// - `ToneSource`: deterministic synthetic tone (demos, driverless tests)
#[async_trait::async_trait]
pub trait AudioSource: Send {
    /// Start capturing audio.
    ///
    /// Returns a channel receiver that will receive audio frames in
    /// hardware delivery order. At most one capture may be active at a
    /// time per source; the controller's state machine enforces this.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError>;

    /// Suspend frame delivery without tearing down the capture.
    async fn pause(&mut self) -> Result<(), CaptureError>;

    /// Resume frame delivery after a pause.
    async fn resume(&mut self) -> Result<(), CaptureError>;

    /// Stop capturing. Tolerates being called when already stopped.
    async fn stop(&mut self);

    /// The format frames will be delivered in, fixed per session.
    fn format(&self) -> AudioFormat;

    /// Get source name for logging
    fn name(&self) -> &str;
}

/// Synthetic sine-tone source.
///
/// Generates frames on a tokio interval at the configured cadence. Used by
/// the `record` CLI subcommand and by tests that need a real-time-ish
/// producer without an input device.
pub struct ToneSource {
    format: AudioFormat,
    frequency_hz: f32,
    frame_ms: u64,
    paused: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl ToneSource {
    pub fn new(format: AudioFormat, frequency_hz: f32) -> Self {
        Self {
            format,
            frequency_hz,
            frame_ms: 100,
            paused: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioSource for ToneSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        if self.task.is_some() {
            return Err(CaptureError::StartFailed("tone source already running".into()));
        }

        let (tx, rx) = mpsc::channel(64);
        let format = self.format;
        let frequency = self.frequency_hz;
        let frame_ms = self.frame_ms;
        let paused = Arc::clone(&self.paused);
        paused.store(false, Ordering::SeqCst);

        let task = tokio::spawn(async move {
            let samples_per_frame = format.samples_for_ms(frame_ms);
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(frame_ms));
            let mut timestamp_ms = 0u64;
            let mut phase = 0usize;

            loop {
                interval.tick().await;

                if paused.load(Ordering::SeqCst) {
                    continue;
                }

                let mut samples = Vec::with_capacity(samples_per_frame);
                for _ in 0..samples_per_frame {
                    let t = phase as f32 / format.sample_rate as f32;
                    let value = (2.0 * PI * frequency * t).sin();
                    samples.push((value * i16::MAX as f32 * 0.5) as i16);
                    phase += 1;
                }

                let frame = AudioFrame {
                    samples,
                    sample_rate: format.sample_rate,
                    channels: format.channels,
                    timestamp_ms,
                };
                timestamp_ms += frame_ms;

                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        self.task = Some(task);
        info!("Tone source started ({}Hz tone)", self.frequency_hz);

        Ok(rx)
    }

    async fn pause(&mut self) -> Result<(), CaptureError> {
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CaptureError> {
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn name(&self) -> &str {
        "tone"
    }
}
