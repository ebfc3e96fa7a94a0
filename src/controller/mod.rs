//! Recording controller
//!
//! Owns the idle/recording/paused/playing state machine, fans captured
//! frames out to the durable WAV writer and the speech session, reconciles
//! their callback streams into one observable snapshot, and emits a
//! `RecordingArtifact` to the persistence collaborator when a session stops.

mod timer;

pub use timer::SessionTimer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audio::{AudioSource, CaptureError, RecordingWriter};
use crate::error::RecorderError;
use crate::playback::{PlaybackHandle, Player};
use crate::store::{self, RecordingArtifact, TranscriptStore};
use crate::transcribe::{Recognizer, SpeechSession};

/// Bounded wait applied to session teardown steps; stop must never block
/// indefinitely on the recognizer or a wedged task.
const SHUTDOWN_WAIT: Duration = Duration::from_secs(2);

/// Controller state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    Idle,
    Recording,
    Paused,
    Playing,
}

/// Immutable observable state, published on a watch channel after every
/// accepted mutation.
#[derive(Debug, Clone, Serialize)]
pub struct RecorderSnapshot {
    pub state: RecorderState,
    pub elapsed_seconds: u64,
    pub transcript: String,
}

/// Controller tuning knobs.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Directory that receives one WAV file per session
    pub recordings_dir: PathBuf,
    /// Locale passed to the recognizer
    pub locale: String,
    /// Minimum time between accepted transcript publications
    pub transcript_throttle: Duration,
    /// Elapsed-counter tick period (1s in production; shrunk in tests)
    pub timer_period: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            recordings_dir: PathBuf::from("recordings"),
            locale: "en-US".to_string(),
            transcript_throttle: Duration::from_millis(500),
            timer_period: Duration::from_secs(1),
        }
    }
}

/// Everything alive only while a recording session runs.
struct ActiveSession {
    id: Uuid,
    recorded_at: DateTime<Utc>,
    path: PathBuf,
    writer: RecordingWriter,
    speech: Option<Arc<dyn SpeechSession>>,
    fanout: JoinHandle<()>,
    transcript_task: Option<JoinHandle<()>>,
    timer: SessionTimer,
    tick_tx: mpsc::UnboundedSender<()>,
    tick_task: JoinHandle<()>,
}

struct Inner {
    state: RecorderState,
    elapsed_seconds: u64,
    transcript: String,
    source: Box<dyn AudioSource>,
    session: Option<ActiveSession>,
    last_artifact: Option<RecordingArtifact>,
    playback: Option<PlaybackHandle>,
}

fn publish(inner: &Inner, tx: &watch::Sender<RecorderSnapshot>) {
    let _ = tx.send(RecorderSnapshot {
        state: inner.state,
        elapsed_seconds: inner.elapsed_seconds,
        transcript: inner.transcript.clone(),
    });
}

/// The capture/transcribe/persist controller.
///
/// Commands are serialized by an internal command lock; shared state is
/// mutated only under one mutex and every accepted mutation is published as
/// a snapshot, so observers never see a torn state.
pub struct RecordingController {
    config: ControllerConfig,
    inner: Arc<Mutex<Inner>>,
    cmd_lock: Mutex<()>,
    snapshot_tx: Arc<watch::Sender<RecorderSnapshot>>,
    error_tx: mpsc::UnboundedSender<RecorderError>,
    error_rx: StdMutex<Option<mpsc::UnboundedReceiver<RecorderError>>>,
    recognizer: Arc<dyn Recognizer>,
    player: Arc<dyn Player>,
    store: Arc<dyn TranscriptStore>,
}

impl RecordingController {
    pub fn new(
        config: ControllerConfig,
        source: Box<dyn AudioSource>,
        recognizer: Arc<dyn Recognizer>,
        player: Arc<dyn Player>,
        store: Arc<dyn TranscriptStore>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(RecorderSnapshot {
            state: RecorderState::Idle,
            elapsed_seconds: 0,
            transcript: String::new(),
        });
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        Self {
            config,
            inner: Arc::new(Mutex::new(Inner {
                state: RecorderState::Idle,
                elapsed_seconds: 0,
                transcript: String::new(),
                source,
                session: None,
                last_artifact: None,
                playback: None,
            })),
            cmd_lock: Mutex::new(()),
            snapshot_tx: Arc::new(snapshot_tx),
            error_tx,
            error_rx: StdMutex::new(Some(error_rx)),
            recognizer,
            player,
            store,
        }
    }

    /// Subscribe to state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<RecorderSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> RecorderSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Take the non-fatal error channel (write failures, recognition
    /// errors). Yields `Some` exactly once.
    pub fn take_errors(&self) -> Option<mpsc::UnboundedReceiver<RecorderError>> {
        self.error_rx.lock().expect("error channel lock").take()
    }

    /// Artifact of the most recently completed session, if any.
    pub async fn last_artifact(&self) -> Option<RecordingArtifact> {
        self.inner.lock().await.last_artifact.clone()
    }

    /// Begin a new recording session.
    ///
    /// Rejected unless idle. On a capture start failure the controller
    /// fully unwinds (speech closed, file removed) and returns to idle.
    pub async fn start(&self) -> Result<(), RecorderError> {
        let _cmd = self.cmd_lock.lock().await;
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        if inner.state != RecorderState::Idle {
            return Err(RecorderError::InvalidState {
                command: "start",
                state: inner.state,
            });
        }

        // Fresh session: transcript and elapsed counter reset.
        inner.transcript.clear();
        inner.elapsed_seconds = 0;

        let format = inner.source.format();
        let id = Uuid::new_v4();
        let recorded_at = Utc::now();

        fs::create_dir_all(&self.config.recordings_dir)
            .map_err(|e| RecorderError::CaptureStartFailed(e.to_string()))?;
        let path = self
            .config
            .recordings_dir
            .join(store::recording_file_name(recorded_at, id));

        let mut writer = RecordingWriter::create(path.clone(), format, self.error_tx.clone())
            .map_err(|e| RecorderError::CaptureStartFailed(e.to_string()))?;

        // An unavailable recognizer is non-fatal: record file-only.
        let speech: Option<Arc<dyn SpeechSession>> =
            match self.recognizer.open(&self.config.locale, format) {
                Ok(session) => Some(Arc::from(session)),
                Err(e) => {
                    warn!("Recognizer unavailable, recording file-only: {}", e);
                    let _ = self
                        .error_tx
                        .send(RecorderError::RecognizerUnavailable(e.to_string()));
                    None
                }
            };

        let mut frames = match inner.source.start().await {
            Ok(rx) => rx,
            Err(e) => {
                if let Some(session) = &speech {
                    session.finish();
                }
                writer.abort().await;
                error!("Capture failed to start: {}", e);
                return Err(match e {
                    CaptureError::PermissionDenied => RecorderError::PermissionDenied,
                    other => RecorderError::CaptureStartFailed(other.to_string()),
                });
            }
        };

        // Fan-out: every frame goes to the writer queue (lossless, ordered)
        // and is offered to the recognizer (best-effort). Both hand-offs are
        // non-blocking so neither consumer can stall the producer.
        let writer_tx = writer.sender();
        let fan_speech = speech.clone();
        let fanout = tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                if let Some(session) = &fan_speech {
                    session.append(&frame);
                }
                if writer_tx.send(frame).is_err() {
                    error!("Write queue closed while capturing");
                    break;
                }
            }
        });

        // Transcript consumer with throttled publication. Updates arriving
        // inside the throttle window are discarded, never queued; a final
        // update always lands so the artifact carries the converged text.
        let transcript_task = speech.as_ref().and_then(|s| s.take_events()).map(|mut events| {
            let inner_arc = Arc::clone(&self.inner);
            let snapshot_tx = Arc::clone(&self.snapshot_tx);
            let error_tx = self.error_tx.clone();
            let throttle = self.config.transcript_throttle;

            tokio::spawn(async move {
                let mut last_accepted: Option<Instant> = None;
                while let Some(event) = events.recv().await {
                    match event {
                        Ok(update) => {
                            let now = Instant::now();
                            let due = last_accepted
                                .map_or(true, |t| now.duration_since(t) >= throttle);
                            if !due && !update.is_final {
                                continue;
                            }
                            last_accepted = Some(now);

                            let mut inner = inner_arc.lock().await;
                            inner.transcript = update.text;
                            publish(&inner, &snapshot_tx);
                        }
                        Err(e) => {
                            // Recognition dies alone; the durable capture
                            // path keeps running (see DESIGN.md).
                            warn!("Speech recognition error: {}", e);
                            let _ = error_tx
                                .send(RecorderError::RecognitionError(e.to_string()));
                            break;
                        }
                    }
                }
            })
        });

        // Elapsed counter: one increment per tick, only while recording.
        let (tick_tx, mut tick_rx) = mpsc::unbounded_channel::<()>();
        let inner_arc = Arc::clone(&self.inner);
        let snapshot_tx = Arc::clone(&self.snapshot_tx);
        let tick_task = tokio::spawn(async move {
            while tick_rx.recv().await.is_some() {
                let mut inner = inner_arc.lock().await;
                if inner.state == RecorderState::Recording {
                    inner.elapsed_seconds += 1;
                    publish(&inner, &snapshot_tx);
                }
            }
        });
        let timer = SessionTimer::start(self.config.timer_period, tick_tx.clone());

        inner.session = Some(ActiveSession {
            id,
            recorded_at,
            path: path.clone(),
            writer,
            speech,
            fanout,
            transcript_task,
            timer,
            tick_tx,
            tick_task,
        });
        inner.state = RecorderState::Recording;
        publish(inner, &self.snapshot_tx);

        info!("Recording started: session {} -> {:?}", id, path);
        Ok(())
    }

    /// Suspend capture. The writer and speech session stay open so the
    /// session can resume without losing transcription context.
    pub async fn pause(&self) -> Result<(), RecorderError> {
        let _cmd = self.cmd_lock.lock().await;
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        if inner.state != RecorderState::Recording {
            return Err(RecorderError::InvalidState {
                command: "pause",
                state: inner.state,
            });
        }

        let session = inner.session.as_mut().expect("session present while recording");
        session.timer.stop();

        if let Err(e) = inner.source.pause().await {
            warn!("Failed to suspend capture: {}", e);
        }

        inner.state = RecorderState::Paused;
        publish(inner, &self.snapshot_tx);

        info!("Recording paused");
        Ok(())
    }

    /// Resume a paused session.
    pub async fn resume(&self) -> Result<(), RecorderError> {
        let _cmd = self.cmd_lock.lock().await;
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        if inner.state != RecorderState::Paused {
            return Err(RecorderError::InvalidState {
                command: "resume",
                state: inner.state,
            });
        }

        inner
            .source
            .resume()
            .await
            .map_err(|e| RecorderError::CaptureStartFailed(e.to_string()))?;

        let session = inner.session.as_mut().expect("session present while paused");
        session.timer = SessionTimer::start(self.config.timer_period, session.tick_tx.clone());

        inner.state = RecorderState::Recording;
        publish(inner, &self.snapshot_tx);

        info!("Recording resumed");
        Ok(())
    }

    /// Stop the current session and emit its artifact.
    ///
    /// Idempotent: stopping while idle is a no-op returning `None`. Teardown
    /// order: capture halts first, then the recognizer is asked for its
    /// trailing final result with a bounded wait, then the file finalizes.
    pub async fn stop(&self) -> Result<Option<RecordingArtifact>, RecorderError> {
        let _cmd = self.cmd_lock.lock().await;

        let mut session = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            match inner.state {
                RecorderState::Recording | RecorderState::Paused => {}
                _ => return Ok(None),
            }

            // Halting the source closes the frame channel, which lets the
            // fan-out drain and the write queue close in order.
            inner.source.stop().await;
            inner.state = RecorderState::Idle;
            inner.session.take().expect("session present while recording")
        };

        session.timer.stop();
        session.tick_task.abort();

        // Drain the fan-out before signaling end-of-audio: buffered frames
        // must reach the recognizer ahead of finish().
        if timeout(SHUTDOWN_WAIT, &mut session.fanout).await.is_err() {
            warn!("Fan-out did not drain in time; aborting");
            session.fanout.abort();
        }

        if let Some(speech) = &session.speech {
            speech.finish();
        }

        if let Some(mut task) = session.transcript_task.take() {
            if timeout(SHUTDOWN_WAIT, &mut task).await.is_err() {
                warn!("Recognizer did not close in time; cancelling");
                task.abort();
            }
        }

        match session.writer.finish().await {
            Ok(report) => {
                if report.failed_frames > 0 {
                    warn!(
                        "Recording finalized with {} failed frames",
                        report.failed_frames
                    );
                }
            }
            Err(e) => {
                error!("Failed to finalize recording file: {}", e);
                let _ = self.error_tx.send(RecorderError::WriteFailed(e.to_string()));
            }
        }

        let artifact = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            inner.elapsed_seconds = 0;

            let artifact = RecordingArtifact {
                id: session.id,
                path: session.path.clone(),
                recorded_at: session.recorded_at,
                transcript: inner.transcript.clone(),
            };
            inner.last_artifact = Some(artifact.clone());
            publish(inner, &self.snapshot_tx);
            artifact
        };

        if let Err(e) = self.store.save(&artifact) {
            error!("Failed to persist transcript: {}", e);
            let _ = self.error_tx.send(RecorderError::WriteFailed(e.to_string()));
        }

        info!("Recording stopped: session {}", artifact.id);
        Ok(Some(artifact))
    }

    /// Play back the most recently completed recording.
    pub async fn play(&self) -> Result<(), RecorderError> {
        let _cmd = self.cmd_lock.lock().await;
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        if inner.state != RecorderState::Idle {
            return Err(RecorderError::InvalidState {
                command: "play",
                state: inner.state,
            });
        }

        let artifact = inner
            .last_artifact
            .clone()
            .ok_or_else(|| RecorderError::PlaybackFailed("no completed recording".into()))?;

        let mut handle = self.player.play(&artifact.path)?;
        let finished = handle.take_finished();
        inner.playback = Some(handle);
        inner.state = RecorderState::Playing;
        publish(inner, &self.snapshot_tx);

        // Completion forces playing -> idle even without a caller command.
        if let Some(finished) = finished {
            let inner_arc = Arc::clone(&self.inner);
            let snapshot_tx = Arc::clone(&self.snapshot_tx);
            tokio::spawn(async move {
                let _ = finished.await;
                let mut inner = inner_arc.lock().await;
                if inner.state == RecorderState::Playing {
                    inner.state = RecorderState::Idle;
                    inner.playback = None;
                    publish(&inner, &snapshot_tx);
                    info!("Playback finished");
                }
            });
        }

        info!("Playback started: {:?}", artifact.path);
        Ok(())
    }

    /// Stop playback early. No-op when nothing is playing.
    pub async fn stop_playback(&self) -> Result<(), RecorderError> {
        let _cmd = self.cmd_lock.lock().await;
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        if inner.state != RecorderState::Playing {
            return Ok(());
        }

        if let Some(mut handle) = inner.playback.take() {
            handle.stop();
        }
        inner.state = RecorderState::Idle;
        publish(inner, &self.snapshot_tx);

        info!("Playback stopped");
        Ok(())
    }
}
