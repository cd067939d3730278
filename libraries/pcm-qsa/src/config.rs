//! Backend configuration
//!
//! Every value has a default matching what the QSA plugin layer expects, so
//! `BackendConfig::default()` is what a host normally uses. [`BackendConfig::load`]
//! lets deployments override individual values from a file or from
//! `QSA_AUDIO__*` environment variables.

use crate::error::{QsaError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `QSA_AUDIO__WAIT_TIMEOUT_MS=500`
pub const ENV_PREFIX: &str = "QSA_AUDIO";

/// Channel parameters submitted before the negotiated values are filled in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDefaults {
    /// Sample rate (default: 44100)
    #[serde(default = "default_rate")]
    pub rate: u32,

    /// Voices (default: 1)
    #[serde(default = "default_voices")]
    pub voices: u32,

    /// Fragment size requested from the driver (default: 4096)
    #[serde(default = "default_frag_size")]
    pub frag_size: u32,

    /// Minimum queued fragments (default: 1)
    #[serde(default = "default_frags")]
    pub frags_min: u32,

    /// Maximum queued fragments (default: 1)
    #[serde(default = "default_frags")]
    pub frags_max: u32,
}

impl Default for ChannelDefaults {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            voices: default_voices(),
            frag_size: default_frag_size(),
            frags_min: default_frags(),
            frags_max: default_frags(),
        }
    }
}

/// Configuration for the QSA backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// How long to wait for the device to accept a period (default: 2000 ms)
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,

    /// Pause between write attempts while the device reports EAGAIN (default: 1 ms)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Priority increase requested for streaming threads (default: 15)
    #[serde(default = "default_thread_priority_boost")]
    pub thread_priority_boost: i32,

    /// Longest card name the subsystem hands out, including the terminator (default: 97)
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,

    /// Flush on close only when the subsystem version is below this (default: 710)
    #[serde(default = "default_flush_version_limit")]
    pub flush_version_limit: u32,

    /// Initial channel parameters
    #[serde(default)]
    pub channel: ChannelDefaults,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: default_wait_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            thread_priority_boost: default_thread_priority_boost(),
            max_name_length: default_max_name_length(),
            flush_version_limit: default_flush_version_limit(),
            channel: ChannelDefaults::default(),
        }
    }
}

impl BackendConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// Values missing from both sources keep their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            settings = settings.add_source(config::File::from(path));
        }

        settings = settings.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.wait_timeout_ms == 0 {
            return Err(QsaError::Config(
                "wait_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.channel.frag_size == 0 {
            return Err(QsaError::Config(
                "channel.frag_size must be greater than zero".to_string(),
            ));
        }

        if self.channel.frags_min > self.channel.frags_max {
            return Err(QsaError::Config(format!(
                "channel.frags_min ({}) exceeds channel.frags_max ({})",
                self.channel.frags_min, self.channel.frags_max
            )));
        }

        if self.max_name_length < 2 {
            return Err(QsaError::Config(
                "max_name_length must leave room for at least one character".to_string(),
            ));
        }

        Ok(())
    }

    /// Wait timeout as a `Duration`
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    /// Retry delay as a `Duration`
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_wait_timeout_ms() -> u64 {
    2000
}

fn default_retry_delay_ms() -> u64 {
    1
}

fn default_thread_priority_boost() -> i32 {
    15
}

fn default_max_name_length() -> usize {
    81 + 16
}

fn default_flush_version_limit() -> u32 {
    710
}

fn default_rate() -> u32 {
    44_100
}

fn default_voices() -> u32 {
    1
}

fn default_frag_size() -> u32 {
    4096
}

fn default_frags() -> u32 {
    1
}
