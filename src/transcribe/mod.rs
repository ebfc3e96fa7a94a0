//! Speech recognition seam
//!
//! The controller feeds captured audio into a `SpeechSession` opened from a
//! `Recognizer` and consumes `TranscriptUpdate` events back. Recognition is
//! strictly best-effort: a session that falls behind may drop input frames,
//! and a recognition failure never interrupts the durable capture path.

mod scripted;
mod session;

pub use scripted::{ScriptItem, ScriptedRecognizer};
pub use session::{NullRecognizer, Recognizer, SpeechError, SpeechEvent, SpeechSession};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One incremental recognition result.
///
/// Updates carry cumulative text, not deltas: each update supersedes all
/// earlier ones, so the most recent accepted update is the whole transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptUpdate {
    /// Cumulative transcribed text
    pub text: String,
    /// Whether this is the recognizer's final result for the session
    pub is_final: bool,
    /// When this update was produced
    pub timestamp: DateTime<Utc>,
}

impl TranscriptUpdate {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            timestamp: Utc::now(),
        }
    }

    pub fn final_result(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            timestamp: Utc::now(),
        }
    }
}
