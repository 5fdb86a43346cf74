//! Emulator configuration, stored as JSON.

use crate::cpu::memory::MEMORY_SIZE;
use crate::host::Pacer;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Settings shared by the CLI and the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmuConfig {
    /// Target tick rate.
    pub frequency_hz: f64,
    /// Log tick timing every this many ticks; 0 disables it.
    pub report_interval: u64,
    /// Words of memory; smaller memories wrap addresses.
    pub memory_size: usize,
    /// Where the program image is loaded.
    pub base_address: u16,
    /// Limit used by the `cycle-limit` observer.
    pub max_cycles: Option<u64>,
    /// Observers to attach, by registry name.
    pub observers: Vec<String>,
}

impl Default for EmuConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 100.0,
            report_interval: 100,
            memory_size: MEMORY_SIZE,
            base_address: 0,
            max_cycles: None,
            observers: Vec::new(),
        }
    }
}

impl EmuConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if Pacer::new(self.frequency_hz).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "frequency_hz",
                message: format!("{} does not give a usable tick period", self.frequency_hz),
            });
        }
        if self.memory_size == 0 || self.memory_size > MEMORY_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "memory_size",
                message: format!("must be between 1 and {}, got {}", MEMORY_SIZE, self.memory_size),
            });
        }
        Ok(())
    }

    /// Add an observer unless it is already listed.
    pub fn add_observer(&mut self, name: &str) {
        if !self.observers.iter().any(|o| o == name) {
            self.observers.push(name.to_string());
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("invalid {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}
