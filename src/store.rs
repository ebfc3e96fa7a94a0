//! Artifact persistence and recordings listing collaborators.
//!
//! The controller emits exactly one `RecordingArtifact` per completed
//! session; storage and listing live behind small injected traits so the
//! core stays independent of where transcripts end up.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// The durable output of one completed recording session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingArtifact {
    /// Session identifier
    pub id: Uuid,
    /// Path to the finalized WAV file
    pub path: PathBuf,
    /// When the session started
    pub recorded_at: DateTime<Utc>,
    /// Transcript text captured at stop time
    pub transcript: String,
}

/// Persistence collaborator receiving one artifact per completed session.
pub trait TranscriptStore: Send + Sync {
    fn save(&self, artifact: &RecordingArtifact) -> Result<()>;
}

/// Stores transcripts as one JSON object per line in a sidecar file next to
/// the recordings.
pub struct JsonTranscriptStore {
    path: PathBuf,
}

impl JsonTranscriptStore {
    pub fn new(recordings_dir: &Path) -> Self {
        Self {
            path: recordings_dir.join("transcripts.jsonl"),
        }
    }
}

impl TranscriptStore for JsonTranscriptStore {
    fn save(&self, artifact: &RecordingArtifact) -> Result<()> {
        let line = serde_json::to_string(artifact).context("Failed to serialize artifact")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open transcript store: {:?}", self.path))?;

        writeln!(file, "{}", line).context("Failed to append transcript record")?;

        info!("Transcript saved for session {}", artifact.id);
        Ok(())
    }
}

/// In-memory store for tests and the CLI demo.
#[derive(Default)]
pub struct MemoryTranscriptStore {
    saved: Mutex<Vec<RecordingArtifact>>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<RecordingArtifact> {
        self.saved.lock().expect("store lock poisoned").clone()
    }
}

impl TranscriptStore for MemoryTranscriptStore {
    fn save(&self, artifact: &RecordingArtifact) -> Result<()> {
        self.saved
            .lock()
            .expect("store lock poisoned")
            .push(artifact.clone());
        Ok(())
    }
}

/// List recordings in `dir`, newest first.
///
/// Filenames embed a sortable UTC timestamp, so a descending filename sort
/// is a descending time sort.
pub fn list_recordings(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut recordings = Vec::new();

    if !dir.exists() {
        return Ok(recordings);
    }

    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {:?}", dir))? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().map(|e| e == "wav").unwrap_or(false) {
            recordings.push(path);
        }
    }

    recordings.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    Ok(recordings)
}

/// Filename for a new session: sortable UTC timestamp plus the session ID.
pub fn recording_file_name(recorded_at: DateTime<Utc>, id: Uuid) -> String {
    format!("{}-{}.wav", recorded_at.format("%Y%m%dT%H%M%S%3f"), id)
}
