use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no streams configured")]
    NoStreams,
    #[error("{section}.parallel must be at least 1")]
    InvalidParallel { section: &'static str },
}

/// A stream to observe. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamTarget {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RtspConfig {
    #[serde(default)]
    pub transport: TransportMode,
}

fn default_parallel() -> usize {
    4
}

fn default_check_secs() -> u64 {
    5
}

fn default_duration_secs() -> u64 {
    10
}

fn default_segment_secs() -> i64 {
    60
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_report_interval() -> u64 {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_parallel")]
    pub parallel: usize,
    #[serde(default = "default_check_secs")]
    pub check_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            check_secs: default_check_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_parallel")]
    pub parallel: usize,
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            duration_secs: default_duration_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordConfig {
    /// Zero or negative disables rotation.
    #[serde(default = "default_segment_secs")]
    pub segment_secs: i64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            segment_secs: default_segment_secs(),
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspectConfig {
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: default_report_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rtsp: RtspConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub record: RecordConfig,
    #[serde(default)]
    pub inspect: InspectConfig,
    #[serde(default)]
    pub streams: Vec<StreamTarget>,
}

impl Config {
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Like [`Config::load_from`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;

        if config.health.parallel == 0 {
            return Err(ConfigError::InvalidParallel { section: "health" });
        }
        if config.monitor.parallel == 0 {
            return Err(ConfigError::InvalidParallel { section: "monitor" });
        }

        Ok(config)
    }

    /// Streams for the pooled commands; an empty list is an error there.
    pub fn require_streams(&self) -> Result<&[StreamTarget], ConfigError> {
        if self.streams.is_empty() {
            return Err(ConfigError::NoStreams);
        }
        Ok(&self.streams)
    }
}
