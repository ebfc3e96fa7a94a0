use thiserror::Error;
use tokio::sync::mpsc;

use super::TranscriptUpdate;
use crate::audio::{AudioFormat, AudioFrame};

/// Errors from the speech recognition seam.
#[derive(Debug, Clone, Error)]
pub enum SpeechError {
    #[error("Speech recognizer unavailable: {0}")]
    Unavailable(String),

    #[error("Recognition stream failed: {0}")]
    Stream(String),
}

/// Event emitted by a speech session: an update, or a terminal error after
/// which the session emits nothing further.
pub type SpeechEvent = Result<TranscriptUpdate, SpeechError>;

/// Factory for speech sessions. One session is opened per recording; a
/// session is never reused after its event stream ends.
pub trait Recognizer: Send + Sync {
    /// Open a recognition session for the given locale and audio format.
    ///
    /// Availability and authorization failures surface here, once; the
    /// recording then proceeds file-only.
    fn open(&self, locale: &str, format: AudioFormat)
        -> Result<Box<dyn SpeechSession>, SpeechError>;
}

/// An in-flight speech recognition session.
///
/// `append` and `finish` must not block the caller; queuing and backpressure
/// are internal to the implementation.
pub trait SpeechSession: Send + Sync {
    /// Offer a captured frame to the recognizer. Best-effort: a session
    /// that cannot keep up may discard frames.
    fn append(&self, frame: &AudioFrame);

    /// Signal that no more audio is coming and request a final result.
    /// The event stream closes after any trailing final update.
    fn finish(&self);

    /// Take the event receiver. Yields `Some` exactly once.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<SpeechEvent>>;
}

/// Recognizer that is never available. Used when no speech engine is
/// configured; recording proceeds file-only with an empty transcript.
pub struct NullRecognizer;

impl Recognizer for NullRecognizer {
    fn open(
        &self,
        _locale: &str,
        _format: AudioFormat,
    ) -> Result<Box<dyn SpeechSession>, SpeechError> {
        Err(SpeechError::Unavailable("no speech engine configured".into()))
    }
}
