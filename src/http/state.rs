use crate::controller::RecordingController;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single recording controller instance
    pub controller: Arc<RecordingController>,
    /// Directory listed by GET /recordings
    pub recordings_dir: PathBuf,
}

impl AppState {
    pub fn new(controller: Arc<RecordingController>, recordings_dir: PathBuf) -> Self {
        Self {
            controller,
            recordings_dir,
        }
    }
}
