use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Growth chunks of the recycling pools and receive buffer sizing.
///
/// High-churn kinds (IO operations) grow in large chunks, low-churn kinds
/// (circuits) in small ones.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PoolConfig {
    /// Slots added per growth step of each IO operation pool
    #[serde(default = "default_io_chunk")]
    pub io_chunk: usize,

    #[serde(default = "default_channel_chunk")]
    pub channel_chunk: usize,

    #[serde(default = "default_circuit_chunk")]
    pub circuit_chunk: usize,

    #[serde(default = "default_group_chunk")]
    pub group_chunk: usize,

    /// Receive buffer every circuit starts with
    #[serde(default = "default_small_buffer_size")]
    pub small_buffer_size: usize,

    /// Released receive buffers kept per size class
    #[serde(default = "default_buffer_cache")]
    pub buffer_cache: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            io_chunk: default_io_chunk(),
            channel_chunk: default_channel_chunk(),
            circuit_chunk: default_circuit_chunk(),
            group_chunk: default_group_chunk(),
            small_buffer_size: default_small_buffer_size(),
            buffer_cache: default_buffer_cache(),
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        let chunks = [
            ("io_chunk", self.io_chunk),
            ("channel_chunk", self.channel_chunk),
            ("circuit_chunk", self.circuit_chunk),
            ("group_chunk", self.group_chunk),
            ("small_buffer_size", self.small_buffer_size),
        ];
        for (name, value) in chunks {
            if value == 0 {
                return Err(Error::Config(ConfigError::Message(format!(
                    "pools.{name} must be greater than 0"
                ))));
            }
        }
        Ok(())
    }
}

fn default_io_chunk() -> usize {
    1024
}
fn default_channel_chunk() -> usize {
    1024
}
fn default_circuit_chunk() -> usize {
    32
}
fn default_group_chunk() -> usize {
    128
}
fn default_small_buffer_size() -> usize {
    4096
}
fn default_buffer_cache() -> usize {
    32
}
