//! HTTP command surface wrapping the recording controller:
//! - POST /recorder/start | pause | resume | stop - Drive a recording
//! - POST /recorder/play | stop-playback - Drive playback
//! - GET /recorder/state - Current observable snapshot
//! - GET /recordings - List completed recordings, newest first
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
