//! TigerBox Settings Crate
//!
//! Connection and simulation settings, loaded from and saved to JSON or TOML.

pub mod config;
pub mod error;

pub use config::{default_config_path, Config, ConnectionSettings, SimulationSettings};
pub use error::{SettingsError, SettingsResult};
