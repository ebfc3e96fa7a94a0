//! Recording playback.
//!
//! `RodioPlayer` decodes a finished WAV with hound and plays it through the
//! default output device on a dedicated thread; `TimedPlayer` simulates
//! playback by sleeping the file's duration, for tests and headless use.
//! Every `play` produces exactly one terminal "finished" event, whether
//! playback runs to the end of the file or is stopped early.

use std::path::Path;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::audio::AudioFile;
use crate::error::RecorderError;

/// Handle to an in-flight playback. Dropping the handle does not stop
/// playback; `stop` does.
pub struct PlaybackHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    finished_rx: Option<oneshot::Receiver<()>>,
}

impl PlaybackHandle {
    /// Stop playback early. The finished event still fires exactly once.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Take the single-shot finished receiver. Yields `Some` exactly once.
    pub fn take_finished(&mut self) -> Option<oneshot::Receiver<()>> {
        self.finished_rx.take()
    }
}

/// Playback collaborator.
pub trait Player: Send + Sync {
    fn play(&self, path: &Path) -> Result<PlaybackHandle, RecorderError>;
}

/// Plays WAV files through the default output device via rodio.
pub struct RodioPlayer;

impl Player for RodioPlayer {
    fn play(&self, path: &Path) -> Result<PlaybackHandle, RecorderError> {
        let audio = AudioFile::open(path)
            .map_err(|e| RecorderError::PlaybackFailed(e.to_string()))?;

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let (finished_tx, finished_rx) = oneshot::channel::<()>();

        thread::Builder::new()
            .name("playback".into())
            .spawn(move || {
                let (stream, handle) = match rodio::OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("Failed to open audio output: {}", e);
                        let _ = finished_tx.send(());
                        return;
                    }
                };
                // Keep the stream alive for the lifetime of the sink.
                let _stream = stream;

                let sink = match rodio::Sink::try_new(&handle) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!("Failed to create audio sink: {}", e);
                        let _ = finished_tx.send(());
                        return;
                    }
                };

                let samples: Vec<f32> = audio
                    .samples
                    .iter()
                    .map(|&s| s as f32 / i16::MAX as f32)
                    .collect();
                let source =
                    rodio::buffer::SamplesBuffer::new(audio.channels, audio.sample_rate, samples);
                sink.append(source);

                info!("Playback started: {} ({:.1}s)", audio.path, audio.duration_seconds);

                loop {
                    if sink.empty() {
                        break;
                    }
                    if stop_rx.try_recv().is_ok() {
                        sink.stop();
                        break;
                    }
                    thread::sleep(Duration::from_millis(50));
                }

                let _ = finished_tx.send(());
            })
            .map_err(|e| RecorderError::PlaybackFailed(e.to_string()))?;

        Ok(PlaybackHandle {
            stop_tx: Some(stop_tx),
            finished_rx: Some(finished_rx),
        })
    }
}

/// Player that sleeps for the decoded duration instead of producing sound.
pub struct TimedPlayer;

impl Player for TimedPlayer {
    fn play(&self, path: &Path) -> Result<PlaybackHandle, RecorderError> {
        let audio = AudioFile::open(path)
            .map_err(|e| RecorderError::PlaybackFailed(e.to_string()))?;
        let duration = Duration::from_secs_f64(audio.duration_seconds);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (finished_tx, finished_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = stop_rx => {}
            }
            let _ = finished_tx.send(());
        });

        Ok(PlaybackHandle {
            stop_tx: Some(stop_tx),
            finished_rx: Some(finished_rx),
        })
    }
}
