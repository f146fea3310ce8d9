//! # TigerBox
//!
//! Driver for ASI Tiger multi-axis motion controllers over a serial line,
//! with an in-memory simulated controller for offline use and tests.
//!
//! ## Architecture
//!
//! TigerBox is organized as a workspace with multiple crates:
//!
//! 1. **tigerbox-core** - Axis type, axis mapping, build configuration, errors
//! 2. **tigerbox-communication** - Serial transport, Tiger command set, controllers
//! 3. **tigerbox-settings** - Connection and simulation configuration
//! 4. **tigerbox** - Logging setup, controller factory and the `tigerbox` binary

pub use tigerbox_communication::{
    Ack, ArrayScanParams, ConnectionParams, ControlMode, JoystickInput, JoystickPolarity,
    RingBufferMode, ScanPattern, ScanRParams, ScanVParams, SendOptions, SerialTransport,
    SimTigerController, SimulatedTiger, StageController, TigerController, TtlIn0Mode,
    TtlOut0Mode, TtlPinModes,
};
pub use tigerbox_core::{
    ArgumentError, Axis, AxisError, AxisValues, BuildConfig, CardAddress, ConnectionError, Error,
    FirmwareError, ProtocolError, Result,
};
pub use tigerbox_settings::{Config, ConnectionSettings, SimulationSettings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Version and build date, as printed by `tigerbox --version`
pub const LONG_VERSION: &str = env!("TIGERBOX_LONG_VERSION");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Serial parameters for the configured connection
pub fn connection_params(settings: &ConnectionSettings) -> ConnectionParams {
    ConnectionParams {
        baud_rate: settings.baud_rate,
        timeout_ms: settings.timeout_ms,
        command_terminator: settings.command_terminator.clone(),
        reply_terminator: settings.reply_terminator.clone(),
        ..ConnectionParams::new(settings.port.clone())
    }
}

/// Open the controller the configuration asks for: the simulator when
/// simulation is enabled, otherwise the serial port.
pub fn open_controller(config: &Config) -> anyhow::Result<Box<dyn StageController>> {
    config.validate()?;

    if config.simulation.enabled {
        let axes: Vec<&str> = config
            .simulation
            .motor_axes
            .iter()
            .map(String::as_str)
            .collect();
        let build = BuildConfig::simulated(&axes)?;
        let controller = SimTigerController::with_build_config(build)?
            .with_limits_enforced(config.simulation.enforce_limits);
        tracing::info!("Using simulated controller with axes {:?}", axes);
        return Ok(Box::new(controller));
    }

    let params = connection_params(&config.connection);
    let controller = TigerController::connect(&params)?;
    Ok(Box::new(controller))
}
