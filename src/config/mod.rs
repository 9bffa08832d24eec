//! Configuration of a client context.
//!
//! Values are layered:
//! - Default values as code base
//! - Optional TOML file
//! - Environment variables with the `CA_CLIENT__` prefix (highest priority)
//!
//! Loading never validates; call [`ContextConfig::validate`] once every
//! override is applied.
mod pool;
pub use pool::*;

#[cfg(test)]
mod config_test;

use std::env;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ContextConfig {
    /// Time a new circuit may take to reach the connected state
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// Inbound silence on a circuit before it is probed with an echo
    #[serde(default = "default_echo_period_ms")]
    pub echo_period_ms: u64,

    /// Assumed server beacon period until two consecutive beacons from that
    /// server have been seen
    #[serde(default = "default_beacon_period_ms")]
    pub beacon_period_ms: u64,

    /// Largest value payload accepted or sent, in bytes
    #[serde(default = "default_max_array_bytes")]
    pub max_array_bytes: usize,

    /// Queued outbound bytes that force a circuit flush without waiting for
    /// an explicit `flush()`
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,

    /// Announced to servers in the client-name message
    #[serde(default = "default_user_name")]
    pub user_name: String,

    /// Announced to servers in the host-name message
    #[serde(default = "default_host_name")]
    pub host_name: String,

    #[serde(default)]
    pub pools: PoolConfig,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            connection_timeout_ms: default_connection_timeout_ms(),
            echo_period_ms: default_echo_period_ms(),
            beacon_period_ms: default_beacon_period_ms(),
            max_array_bytes: default_max_array_bytes(),
            flush_threshold: default_flush_threshold(),
            user_name: default_user_name(),
            host_name: default_host_name(),
            pools: PoolConfig::default(),
        }
    }
}

impl ContextConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Sources are merged in the following order (later sources override
    /// earlier):
    /// 1. Type defaults
    /// 2. The TOML file at `path`, when given
    /// 3. Environment variables with the `CA_CLIENT__` prefix
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CA_CLIENT__MAX_ARRAY_BYTES", "65536");
    /// let config = ContextConfig::load(Some("ca-client.toml"))?;
    /// config.validate()?;
    /// ```
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("CA_CLIENT")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Checks every value for consistency.
    ///
    /// # Errors
    /// `Error::Config` naming the first rule violated
    pub fn validate(&self) -> Result<()> {
        if self.connection_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "connection_timeout_ms must be greater than 0".into(),
            )));
        }

        if self.echo_period_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "echo_period_ms must be greater than 0".into(),
            )));
        }

        if self.beacon_period_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "beacon_period_ms must be greater than 0".into(),
            )));
        }

        if self.max_array_bytes < self.pools.small_buffer_size {
            return Err(Error::Config(ConfigError::Message(format!(
                "max_array_bytes {} is smaller than pools.small_buffer_size {}",
                self.max_array_bytes, self.pools.small_buffer_size
            ))));
        }

        if self.flush_threshold == 0 {
            return Err(Error::Config(ConfigError::Message(
                "flush_threshold must be greater than 0".into(),
            )));
        }

        if self.user_name.is_empty() || self.host_name.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "user_name and host_name cannot be empty".into(),
            )));
        }

        self.pools.validate()
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn echo_period(&self) -> Duration {
        Duration::from_millis(self.echo_period_ms)
    }

    pub fn beacon_period(&self) -> Duration {
        Duration::from_millis(self.beacon_period_ms)
    }
}

fn default_connection_timeout_ms() -> u64 {
    30_000
}
fn default_echo_period_ms() -> u64 {
    30_000
}
fn default_beacon_period_ms() -> u64 {
    15_000
}
fn default_max_array_bytes() -> usize {
    16_384
}
fn default_flush_threshold() -> usize {
    16_384
}
fn default_user_name() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".into())
}
fn default_host_name() -> String {
    env::var("HOSTNAME").unwrap_or_else(|_| "localhost".into())
}
