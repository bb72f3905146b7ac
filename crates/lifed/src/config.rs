//! Daemon settings: defaults, then an optional JSON file, then `LIFED_*`
//! environment variables.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use life3d::universe::MAX_CELLS;
use life3d::{patterns, Rule};

use crate::paths::AppPaths;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(String),

    #[error("could not determine config directory")]
    NoConfigDir,
}

fn default_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_size() -> u32 {
    32
}

fn default_pattern() -> String {
    "glider".to_string()
}

fn default_fps() -> u32 {
    10
}

fn default_rule() -> String {
    Rule::B6_S567.to_string()
}

fn default_path() -> String {
    "/ws".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifedConfig {
    #[serde(default = "default_addr")]
    pub addr: SocketAddr,
    /// Edge length of each client's universe.
    #[serde(default = "default_size")]
    pub size: u32,
    /// Pattern seeded near the centre of every new universe.
    #[serde(default = "default_pattern")]
    pub pattern: String,
    /// Snapshots pushed per second.
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_rule")]
    pub rule: String,
    /// Only WebSocket upgrades on this path are accepted.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for LifedConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            size: default_size(),
            pattern: default_pattern(),
            fps: default_fps(),
            rule: default_rule(),
            path: default_path(),
        }
    }
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

impl LifedConfig {
    /// Config file (`LIFED_CONFIG`, else `<config dir>/lifed/config.json`)
    /// overridden by environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match std::env::var_os("LIFED_CONFIG") {
            Some(path) => Some(PathBuf::from(path)),
            None => AppPaths::new().ok().map(|paths| paths.config_file()),
        };
        let base = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        base.with_overrides(|var| std::env::var(var).ok())
    }

    /// A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("LIFED_ADDR") {
            self.addr = parse_var("LIFED_ADDR", &v)?;
        }
        if let Some(v) = lookup("LIFED_SIZE") {
            self.size = parse_var("LIFED_SIZE", &v)?;
        }
        if let Some(v) = lookup("LIFED_PATTERN") {
            self.pattern = v.trim().to_string();
        }
        if let Some(v) = lookup("LIFED_FPS") {
            self.fps = parse_var("LIFED_FPS", &v)?;
        }
        if let Some(v) = lookup("LIFED_RULE") {
            parse_var::<Rule>("LIFED_RULE", &v)?;
            self.rule = v.trim().to_string();
        }
        if let Some(v) = lookup("LIFED_PATH") {
            self.path = v.trim().to_string();
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::Invalid("size must be positive".into()));
        }
        let fits = u64::from(self.size)
            .checked_pow(3)
            .is_some_and(|cells| cells <= MAX_CELLS as u64);
        if !fits {
            return Err(ConfigError::Invalid(format!(
                "size {} exceeds {MAX_CELLS} cells",
                self.size
            )));
        }
        if self.fps == 0 {
            return Err(ConfigError::Invalid("fps must be positive".into()));
        }
        if patterns::by_name(&self.pattern).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown pattern: {}",
                self.pattern
            )));
        }
        if !self.path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "path must start with '/': {}",
                self.path
            )));
        }
        self.rule()?;
        Ok(())
    }

    pub fn rule(&self) -> Result<Rule, ConfigError> {
        self.rule
            .parse()
            .map_err(|e: life3d::Error| ConfigError::Invalid(e.to_string()))
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_millis((1000 / self.fps.max(1) as u64).max(1))
    }

    /// Where the seed pattern's origin goes on every axis.
    pub fn seed_offset(&self) -> i64 {
        self.size as i64 / 2 - 2
    }
}
