use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::controller::ControllerConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub recorder: RecorderConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct RecorderConfig {
    pub recordings_dir: String,
    pub locale: String,
    pub transcript_throttle_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Recordings directory with `~` and environment variables expanded.
    pub fn recordings_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::full(&self.recorder.recordings_dir).map_or_else(
            |_| self.recorder.recordings_dir.clone(),
            |expanded| expanded.into_owned(),
        ))
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            recordings_dir: self.recordings_dir(),
            locale: self.recorder.locale.clone(),
            transcript_throttle: Duration::from_millis(self.recorder.transcript_throttle_ms),
            timer_period: Duration::from_secs(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recorder: RecorderConfig {
                recordings_dir: "recordings".to_string(),
                locale: "en-US".to_string(),
                transcript_throttle_ms: 500,
            },
            http: HttpConfig {
                bind: "127.0.0.1".to_string(),
                port: 8090,
            },
        }
    }
}
