use thiserror::Error;

use crate::controller::RecorderState;

/// Errors surfaced by the recording controller.
///
/// All of these are recoverable at the controller boundary: the controller
/// lands back in a well-defined state after each one. Start-time failures
/// (`PermissionDenied`, `CaptureStartFailed`) return to `Idle`; mid-session
/// failures (`WriteFailed`, `RecognitionError`) leave the session running
/// and are delivered on the controller's error channel.
#[derive(Debug, Clone, Error)]
pub enum RecorderError {
    #[error("Microphone or speech authorization denied")]
    PermissionDenied,

    #[error("Failed to start audio capture: {0}")]
    CaptureStartFailed(String),

    #[error("Speech recognizer unavailable: {0}")]
    RecognizerUnavailable(String),

    #[error("Audio file write failed: {0}")]
    WriteFailed(String),

    #[error("Speech recognition failed: {0}")]
    RecognitionError(String),

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Command {command} rejected in state {state:?}")]
    InvalidState {
        command: &'static str,
        state: RecorderState,
    },
}
