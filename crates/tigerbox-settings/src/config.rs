//! Configuration management for TigerBox
//!
//! Supports JSON and TOML files, chosen by extension. Configuration is
//! organized into two sections:
//! - Connection settings (port, baud rate, timeout, line terminators)
//! - Simulation settings (whether to use the in-memory controller, its axes)

use crate::error::{SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory under the platform config dir holding `config.toml`
pub const CONFIG_DIR_NAME: &str = "tigerbox";

/// Serial connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Serial port (e.g. "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Reply timeout in milliseconds
    pub timeout_ms: u64,
    /// Appended to every outgoing command
    pub command_terminator: String,
    /// Marks the end of one reply
    pub reply_terminator: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            timeout_ms: 1000,
            command_terminator: "\r".to_string(),
            reply_terminator: "\r\n".to_string(),
        }
    }
}

/// Simulated controller settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Use the simulated controller instead of the serial port
    pub enabled: bool,
    /// Lettered axes in hardware order
    pub motor_axes: Vec<String>,
    /// Clamp simulated moves to the travel limits
    pub enforce_limits: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            motor_axes: ["X", "Y", "Z", "M", "N"]
                .iter()
                .map(|a| a.to_string())
                .collect(),
            enforce_limits: false,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionSettings,
    pub simulation: SimulationSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(SettingsError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::LoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content).map_err(|e| SettingsError::SaveError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Load from `path` if it exists, otherwise return defaults
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let connection = &self.connection;
        if !self.simulation.enabled && connection.port.trim().is_empty() {
            return Err(SettingsError::invalid("connection.port", "must not be empty"));
        }
        if connection.baud_rate == 0 {
            return Err(SettingsError::invalid("connection.baud_rate", "must be > 0"));
        }
        if connection.timeout_ms == 0 {
            return Err(SettingsError::invalid("connection.timeout_ms", "must be > 0"));
        }
        if connection.command_terminator.is_empty() {
            return Err(SettingsError::invalid(
                "connection.command_terminator",
                "must not be empty",
            ));
        }
        if connection.reply_terminator.is_empty() {
            return Err(SettingsError::invalid(
                "connection.reply_terminator",
                "must not be empty",
            ));
        }

        let mut seen: Vec<char> = Vec::new();
        for axis in &self.simulation.motor_axes {
            let mut chars = axis.chars();
            let letter = match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => c.to_ascii_uppercase(),
                _ => {
                    return Err(SettingsError::invalid(
                        "simulation.motor_axes",
                        format!("'{axis}' is not a single letter"),
                    ))
                }
            };
            if seen.contains(&letter) {
                return Err(SettingsError::invalid(
                    "simulation.motor_axes",
                    format!("axis '{letter}' is listed twice"),
                ));
            }
            seen.push(letter);
        }
        Ok(())
    }
}

/// `<config_dir>/tigerbox/config.toml`
pub fn default_config_path() -> SettingsResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME).join("config.toml"))
        .ok_or_else(|| {
            SettingsError::ConfigDirectory("no platform configuration directory".to_string())
        })
}
