//! Service configuration
//!
//! Defaults, then an optional YAML/TOML/JSON file, then `VFDMON_*`
//! environment variables (`VFDMON_CONNECTION__BAUD_RATE=19200`), then
//! command-line overrides applied by the binary.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use vfd_modbus::{ConnectionConfig, ModbusError, Result};

pub const ENV_PREFIX: &str = "VFDMON_";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_DRAIN_INTERVAL_MS: u64 = 150;
pub const DEFAULT_HISTORY_LEN: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    /// Telemetry sampling interval
    pub poll_interval_ms: u64,
    /// Consumer drain tick
    pub drain_interval_ms: u64,
    /// Samples kept in the rolling window
    pub history_len: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            drain_interval_ms: DEFAULT_DRAIN_INTERVAL_MS,
            history_len: DEFAULT_HISTORY_LEN,
        }
    }
}

impl AppConfig {
    /// Load from defaults, `file` and the environment, then validate
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config: AppConfig = common::config_loader::load_layered(&Self::default(), file, ENV_PREFIX)
            .map_err(|e| match e {
                common::Error::Config(msg) => ModbusError::Config(msg),
                other => ModbusError::config(other.to_string()),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;
        if self.poll_interval_ms == 0 {
            return Err(ModbusError::config("Poll interval must be greater than 0"));
        }
        if self.drain_interval_ms == 0 {
            return Err(ModbusError::config("Drain interval must be greater than 0"));
        }
        if self.history_len == 0 {
            return Err(ModbusError::config("History length must be greater than 0"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }
}
