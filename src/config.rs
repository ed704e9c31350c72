//! Producer and consumer configuration
//!
//! Both configs deserialize from YAML with every field optional; missing
//! fields take the defaults below. Durations are written in milliseconds.
//!
//! ```yaml
//! # sender.yaml
//! port: 9999
//! width: 1280
//! height: 720
//! fps: 25
//! quality: 70
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::connection::{ReceiverOptions, RetryPolicy, SenderOptions};
use crate::types::Quality;
use crate::wire::{DEFAULT_MAX_FRAME_LEN, MAX_FRAME_LEN_LIMIT};
use crate::{Result, StreamError};

/// Highest frame rate the producer accepts
pub const MAX_FPS: u32 = 240;

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| StreamError::ConfigFile { path: path.to_path_buf(), source: Box::new(e) })?;
    serde_yaml_ng::from_str(&text)
        .map_err(|e| StreamError::ConfigFile { path: path.to_path_buf(), source: Box::new(e) })
}

/// Producer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SenderConfig {
    /// Address to listen on
    pub host: String,
    /// Port to listen on (0 picks a free port)
    pub port: u16,
    /// Capture device selector
    pub device: u32,
    pub width: u32,
    pub height: u32,
    /// Target acquisition rate
    pub fps: u32,
    pub quality: Quality,
    /// Frames held between acquisition and the network
    pub buffer_capacity: usize,
    /// Pending connections queued while a consumer is being served
    pub backlog: u32,
    pub write_timeout_ms: u64,
    /// Throughput log interval in frames (0 disables)
    pub report_every: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9999,
            device: 0,
            width: 640,
            height: 480,
            fps: 30,
            quality: Quality::default(),
            buffer_capacity: 30,
            backlog: 5,
            write_timeout_ms: 5_000,
            report_every: 100,
        }
    }
}

impl SenderConfig {
    /// Parse from a YAML document and validate
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml_ng::from_str(yaml).map_err(|e| StreamError::config("yaml", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file and validate
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = load_yaml(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(StreamError::config("host", "must not be empty"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(StreamError::config(
                "width/height",
                format!("{}x{} has zero area", self.width, self.height),
            ));
        }
        if !(1..=MAX_FPS).contains(&self.fps) {
            return Err(StreamError::config("fps", format!("{} is outside 1..={}", self.fps, MAX_FPS)));
        }
        if self.buffer_capacity == 0 {
            return Err(StreamError::config("buffer_capacity", "must be at least 1"));
        }
        if self.backlog == 0 {
            return Err(StreamError::config("backlog", "must be at least 1"));
        }
        if self.write_timeout_ms == 0 {
            return Err(StreamError::config("write_timeout_ms", "must be positive"));
        }
        Ok(())
    }

    /// `host:port` to bind
    pub fn addr(&self) -> String {
        join_host_port(&self.host, self.port)
    }

    /// Target time between captures
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }

    pub fn sender_options(&self) -> SenderOptions {
        SenderOptions {
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            report_every: self.report_every,
            ..SenderOptions::default()
        }
    }
}

/// Consumer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReceiverConfig {
    /// Producer address
    pub host: String,
    pub port: u16,
    /// Frames held between the network and presentation
    pub buffer_capacity: usize,
    /// Retries after the first failed connect
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub connect_timeout_ms: u64,
    /// Largest payload accepted from the wire
    pub max_frame_len: u64,
    /// Throughput log interval in frames (0 disables)
    pub report_every: u64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9999,
            buffer_capacity: 10,
            max_retries: 4,
            retry_delay_ms: 2_000,
            connect_timeout_ms: 5_000,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            report_every: 100,
        }
    }
}

impl ReceiverConfig {
    /// Parse from a YAML document and validate
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml_ng::from_str(yaml).map_err(|e| StreamError::config("yaml", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file and validate
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = load_yaml(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(StreamError::config("host", "must not be empty"));
        }
        if self.port == 0 {
            return Err(StreamError::config("port", "must name the producer's port"));
        }
        if self.buffer_capacity == 0 {
            return Err(StreamError::config("buffer_capacity", "must be at least 1"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(StreamError::config("connect_timeout_ms", "must be positive"));
        }
        if self.max_frame_len == 0 {
            return Err(StreamError::config("max_frame_len", "must be positive"));
        }
        if self.max_frame_len > MAX_FRAME_LEN_LIMIT {
            return Err(StreamError::config(
                "max_frame_len",
                format!("must be at most {} bytes", MAX_FRAME_LEN_LIMIT),
            ));
        }
        Ok(())
    }

    /// `host:port` of the producer
    pub fn addr(&self) -> String {
        join_host_port(&self.host, self.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }

    pub fn receiver_options(&self) -> ReceiverOptions {
        ReceiverOptions { max_frame_len: self.max_frame_len, report_every: self.report_every }
    }
}
