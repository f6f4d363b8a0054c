//! Runtime configuration for the plant simulator and the monitor.
//!
//! Every field has a default matching the fixed deployment (plant on
//! `127.0.0.1:5020`, monitor pointed at the gateway on `127.0.0.1:502`), so a
//! JSON file only needs the keys it changes.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PLC_ADDR: &str = "127.0.0.1:5020";
pub const DEFAULT_GATEWAY_ADDR: &str = "127.0.0.1:502";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub plc: PlcConfig,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlcConfig {
    pub bind: SocketAddr,
    pub tick_ms: u64,
    pub initial_pressure: f64,
    pub initial_temperature: f64,
    pub initial_pump_on: bool,
    /// Fixed seed for the pressure random walk; `None` seeds from the OS.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub endpoint: SocketAddr,
    pub unit_id: u8,
    pub poll_ms: u64,
    /// Upper bound for one connect attempt or one bus request.
    pub request_timeout_ms: u64,
    pub reconnect_min_ms: u64,
    pub reconnect_max_ms: u64,
    /// Coil writes allowed on the wire at once.
    pub max_in_flight: usize,
}

impl Default for PlcConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5020)),
            tick_ms: 1000,
            initial_pressure: crate::model::INITIAL_PRESSURE,
            initial_temperature: crate::model::INITIAL_TEMPERATURE,
            initial_pump_on: true,
            seed: None,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            endpoint: SocketAddr::from(([127, 0, 0, 1], 502)),
            unit_id: crate::map::UNIT_ID,
            poll_ms: 500,
            request_timeout_ms: 2000,
            reconnect_min_ms: 250,
            reconnect_max_ms: 5000,
            max_in_flight: 4,
        }
    }
}

impl PlcConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl MonitorConfig {
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let plc = &self.plc;
        if plc.tick_ms == 0 {
            return Err(ConfigError::Invalid("plc.tick_ms must be positive".into()));
        }
        if !(crate::model::PRESSURE_MIN..=crate::model::PRESSURE_MAX).contains(&plc.initial_pressure) {
            return Err(ConfigError::Invalid(format!(
                "plc.initial_pressure {} outside 0-100",
                plc.initial_pressure
            )));
        }
        if !plc.initial_temperature.is_finite() || plc.initial_temperature < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "plc.initial_temperature {} must be a non-negative number",
                plc.initial_temperature
            )));
        }

        let monitor = &self.monitor;
        if monitor.poll_ms == 0 {
            return Err(ConfigError::Invalid("monitor.poll_ms must be positive".into()));
        }
        if monitor.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "monitor.request_timeout_ms must be positive".into(),
            ));
        }
        if monitor.reconnect_min_ms == 0 || monitor.reconnect_min_ms > monitor.reconnect_max_ms {
            return Err(ConfigError::Invalid(format!(
                "monitor reconnect backoff {}..{} ms is not a valid range",
                monitor.reconnect_min_ms, monitor.reconnect_max_ms
            )));
        }
        if monitor.max_in_flight == 0 {
            return Err(ConfigError::Invalid("monitor.max_in_flight must be at least 1".into()));
        }
        Ok(())
    }
}
