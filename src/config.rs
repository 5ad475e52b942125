//! Configuration management for digestwatch
//!
//! This module provides configuration structures and defaults for the
//! watcher, the digest engine, the noise filter and the sinks. Values come
//! from defaults, an optional TOML file, then `DIGESTWATCH_*` environment
//! variables.

use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::digest::DEFAULT_CHUNK_SIZE;
use crate::error::MonitorError;

/// Global configuration for digestwatch
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// File watcher configuration
    pub watcher: WatcherConfig,
    /// Digest engine configuration
    pub digest: DigestConfig,
    /// Noise filter configuration
    pub filter: FilterConfig,
    /// Sink configuration
    pub sinks: SinkConfig,
    /// Optional tracing filter directive, e.g. `digestwatch=debug`
    pub log_filter: Option<String>,
}

/// Which notification facility feeds the watcher
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Native events with polling fallback
    #[default]
    Auto,
    /// Native file system events only
    Native,
    /// Periodic directory scans
    Polling,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Backend::Auto),
            "native" => Ok(Backend::Native),
            "polling" | "poll" => Ok(Backend::Polling),
            other => Err(format!("unknown watcher backend: {other}")),
        }
    }
}

/// Configuration for file watching
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatcherConfig {
    pub backend: Backend,
    /// Scan interval for the polling backend in milliseconds
    pub poll_interval_ms: u64,
    /// Quiet period before a write is considered finished, for backends
    /// that do not report file closes
    pub settle_ms: u64,
    /// How often the session checks for cancellation
    pub tick_ms: u64,
    /// Upper bound on waiting for the notifier to shut down
    pub stop_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DigestConfig {
    /// Bytes read per chunk
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    /// File name prefixes marking editor and OS temporaries
    pub temp_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SinkConfig {
    /// Write the `user.sha256` extended attribute where supported
    pub attributes: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Auto,
            poll_interval_ms: 1000,
            settle_ms: 500,
            tick_ms: 100,
            stop_timeout_ms: 5000,
        }
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            temp_prefixes: vec![".~".to_string()],
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self { attributes: true }
    }
}

impl WatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_duration(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Configuration loading and management
impl MonitorConfig {
    /// Load the TOML file if one is given, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, MonitorError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, MonitorError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| MonitorError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text)
            .map_err(|e| MonitorError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("DIGESTWATCH_BACKEND") {
            match val.parse() {
                Ok(backend) => self.watcher.backend = backend,
                Err(err) => tracing::warn!("Ignoring DIGESTWATCH_BACKEND: {}", err),
            }
        }

        if let Ok(val) = std::env::var("DIGESTWATCH_POLL_INTERVAL_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.watcher.poll_interval_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("DIGESTWATCH_SETTLE_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.watcher.settle_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("DIGESTWATCH_CHUNK_SIZE") {
            if let Ok(size) = val.parse::<usize>() {
                self.digest.chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("DIGESTWATCH_ATTRIBUTES") {
            if let Ok(enabled) = val.parse::<bool>() {
                self.sinks.attributes = enabled;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.digest.chunk_size == 0 {
            return Err(MonitorError::Config("chunk_size must be greater than 0".to_string()));
        }

        if self.watcher.poll_interval_ms == 0 {
            return Err(MonitorError::Config("poll_interval_ms must be greater than 0".to_string()));
        }

        if self.watcher.tick_ms == 0 {
            return Err(MonitorError::Config("tick_ms must be greater than 0".to_string()));
        }

        Ok(())
    }
}
