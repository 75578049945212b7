//! Server configuration loaded from TOML.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::concurrency;
use crate::storage::DEFAULT_MAX_SIZE;

/// Which dispatch topology serves connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One reactor thread owns everything.
    Single,
    /// Acceptor reactor plus worker reactors.
    Multi,
}

/// Offload pool parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub name: String,
    pub low_watermark: usize,
    pub high_watermark: usize,
    pub max_queue_size: usize,
    pub idle_time_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: "lrucached".to_string(),
            low_watermark: 2,
            high_watermark: 8,
            max_queue_size: 64,
            idle_time_ms: 5000,
        }
    }
}

impl ExecutorConfig {
    /// Converts into pool options.
    pub fn options(&self) -> concurrency::Options {
        concurrency::Options {
            name: self.name.clone(),
            low_watermark: self.low_watermark,
            high_watermark: self.high_watermark,
            max_queue_size: self.max_queue_size,
            idle_time: Duration::from_millis(self.idle_time_ms),
        }
    }
}

/// Top-level server configuration. Every field has a default, so an
/// empty document is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address.
    pub listen: String,
    /// Store byte budget.
    pub max_size: usize,
    /// Dispatch topology.
    pub mode: Mode,
    /// Worker reactors in multi mode; zero means hardware concurrency.
    pub workers: usize,
    /// Optional command-offload pool.
    pub executor: Option<ExecutorConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:11211".to_string(),
            max_size: DEFAULT_MAX_SIZE,
            mode: Mode::Multi,
            workers: 0,
            executor: None,
        }
    }
}

/// Errors loading a configuration file.
#[derive(Debug)]
pub enum Error {
    /// The file could not be read.
    Io(io::Error),
    /// The document is not valid TOML for [`Config`].
    Parse(toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Config {
    /// Parses a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(Error::Parse)
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(Error::Io)?;
        Self::from_toml(&text)
    }
}
