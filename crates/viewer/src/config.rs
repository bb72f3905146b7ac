use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ViewerError};

fn default_initial_size() -> u32 {
    10
}

fn default_fps() -> u32 {
    10
}

fn default_max_capacity() -> usize {
    1000
}

fn default_stream_capacity() -> usize {
    1000
}

fn default_reconnect_delay_ms() -> u64 {
    2000
}

fn default_stream_path() -> String {
    "/ws".to_string()
}

/// Viewer tunables. Every field may be omitted from the JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Edge length of the cube created on start-up.
    #[serde(default = "default_initial_size")]
    pub initial_size: u32,
    /// Animation rate for local stepping.
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Upper bound on instance slots for locally computed universes.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: usize,
    /// Instance slots reserved for pushed universes, whose size is not known
    /// up front.
    #[serde(default = "default_stream_capacity")]
    pub stream_capacity: usize,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            initial_size: default_initial_size(),
            fps: default_fps(),
            max_capacity: default_max_capacity(),
            stream_capacity: default_stream_capacity(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            stream_path: default_stream_path(),
        }
    }
}

impl ViewerConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ViewerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no viewer config; using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ViewerError::Config(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_size == 0 {
            return Err(ViewerError::Config("initial_size must be positive".into()));
        }
        if self.fps == 0 {
            return Err(ViewerError::Config("fps must be positive".into()));
        }
        if self.max_capacity == 0 || self.stream_capacity == 0 {
            return Err(ViewerError::Config("capacities must be positive".into()));
        }
        if !self.stream_path.starts_with('/') {
            return Err(ViewerError::Config(format!(
                "stream_path must start with '/': {}",
                self.stream_path
            )));
        }
        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
