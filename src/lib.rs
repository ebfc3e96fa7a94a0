pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod playback;
pub mod store;
pub mod transcribe;

pub use audio::{
    AudioFile, AudioFormat, AudioFrame, AudioSource, CaptureError, MicSource, RecordingWriter,
    ToneSource, WriterReport,
};
pub use config::Config;
pub use controller::{
    ControllerConfig, RecorderSnapshot, RecorderState, RecordingController, SessionTimer,
};
pub use error::RecorderError;
pub use http::{create_router, AppState};
pub use playback::{PlaybackHandle, Player, RodioPlayer, TimedPlayer};
pub use store::{
    list_recordings, JsonTranscriptStore, MemoryTranscriptStore, RecordingArtifact, TranscriptStore,
};
pub use transcribe::{
    NullRecognizer, Recognizer, ScriptItem, ScriptedRecognizer, SpeechError, SpeechEvent,
    SpeechSession, TranscriptUpdate,
};
