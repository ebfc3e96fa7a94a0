use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::session::{Recognizer, SpeechError, SpeechEvent, SpeechSession};
use super::TranscriptUpdate;
use crate::audio::{AudioFormat, AudioFrame};

/// One step of a scripted recognition timeline. Delays are relative to the
/// previous item.
#[derive(Debug, Clone)]
pub enum ScriptItem {
    Update {
        after_ms: u64,
        text: String,
        is_final: bool,
    },
    Error {
        after_ms: u64,
        message: String,
    },
}

impl ScriptItem {
    pub fn update(after_ms: u64, text: impl Into<String>) -> Self {
        Self::Update {
            after_ms,
            text: text.into(),
            is_final: false,
        }
    }

    pub fn error(after_ms: u64, message: impl Into<String>) -> Self {
        Self::Error {
            after_ms,
            message: message.into(),
        }
    }
}

/// Recognizer that replays a fixed timeline of updates.
///
/// Stands in for a real speech engine in the CLI demo and in tests that
/// exercise throttling, error policy, and session lifecycle.
pub struct ScriptedRecognizer {
    script: Vec<ScriptItem>,
    final_text: Option<String>,
    fail_open: bool,
    sessions_opened: AtomicUsize,
    frames_seen: Arc<AtomicUsize>,
    late_appends: Arc<AtomicUsize>,
}

impl ScriptedRecognizer {
    pub fn new(script: Vec<ScriptItem>) -> Self {
        Self {
            script,
            final_text: None,
            fail_open: false,
            sessions_opened: AtomicUsize::new(0),
            frames_seen: Arc::new(AtomicUsize::new(0)),
            late_appends: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Text emitted as the trailing final result when `finish` is called.
    pub fn with_final_text(mut self, text: impl Into<String>) -> Self {
        self.final_text = Some(text.into());
        self
    }

    /// Make `open` fail, simulating an unavailable engine.
    pub fn unavailable() -> Self {
        Self {
            script: Vec::new(),
            final_text: None,
            fail_open: true,
            sessions_opened: AtomicUsize::new(0),
            frames_seen: Arc::new(AtomicUsize::new(0)),
            late_appends: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of sessions opened so far (across the recognizer's lifetime).
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    /// Total frames appended across all sessions.
    pub fn frames_seen(&self) -> usize {
        self.frames_seen.load(Ordering::SeqCst)
    }

    /// Frames appended after `finish` signaled end-of-audio. Audio handed
    /// to a session once its final result was requested is a caller bug.
    pub fn appends_after_finish(&self) -> usize {
        self.late_appends.load(Ordering::SeqCst)
    }
}

impl Recognizer for ScriptedRecognizer {
    fn open(
        &self,
        locale: &str,
        _format: AudioFormat,
    ) -> Result<Box<dyn SpeechSession>, SpeechError> {
        if self.fail_open {
            return Err(SpeechError::Unavailable("scripted engine offline".into()));
        }

        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        info!("Scripted recognition session opened (locale={})", locale);

        let (tx, rx) = mpsc::unbounded_channel::<SpeechEvent>();

        let script = self.script.clone();
        let replay_tx = tx.clone();
        let replay = tokio::spawn(async move {
            for item in script {
                match item {
                    ScriptItem::Update {
                        after_ms,
                        text,
                        is_final,
                    } => {
                        tokio::time::sleep(Duration::from_millis(after_ms)).await;
                        let update = if is_final {
                            TranscriptUpdate::final_result(text)
                        } else {
                            TranscriptUpdate::partial(text)
                        };
                        if replay_tx.send(Ok(update)).is_err() {
                            return;
                        }
                    }
                    ScriptItem::Error { after_ms, message } => {
                        tokio::time::sleep(Duration::from_millis(after_ms)).await;
                        let _ = replay_tx.send(Err(SpeechError::Stream(message)));
                        // Terminal: nothing follows an error.
                        return;
                    }
                }
            }
        });

        Ok(Box::new(ScriptedSession {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
            replay: Mutex::new(Some(replay)),
            final_text: self.final_text.clone(),
            finished: AtomicBool::new(false),
            frames_seen: Arc::clone(&self.frames_seen),
            late_appends: Arc::clone(&self.late_appends),
        }))
    }
}

struct ScriptedSession {
    tx: Mutex<Option<mpsc::UnboundedSender<SpeechEvent>>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<SpeechEvent>>>,
    replay: Mutex<Option<JoinHandle<()>>>,
    final_text: Option<String>,
    finished: AtomicBool,
    frames_seen: Arc<AtomicUsize>,
    late_appends: Arc<AtomicUsize>,
}

impl SpeechSession for ScriptedSession {
    fn append(&self, _frame: &AudioFrame) {
        if self.finished.load(Ordering::SeqCst) {
            self.late_appends.fetch_add(1, Ordering::SeqCst);
        }
        self.frames_seen.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        // Cut the timeline short, emit the trailing final result, and close
        // the event stream by dropping the last sender.
        self.finished.store(true, Ordering::SeqCst);
        if let Some(replay) = self.replay.lock().expect("replay lock").take() {
            replay.abort();
        }
        if let Some(tx) = self.tx.lock().expect("sender lock").take() {
            if let Some(text) = &self.final_text {
                let _ = tx.send(Ok(TranscriptUpdate::final_result(text.clone())));
            }
        }
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<SpeechEvent>> {
        self.rx.lock().expect("receiver lock").take()
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        if let Some(replay) = self.replay.lock().expect("replay lock").take() {
            replay.abort();
        }
    }
}
