use tempfile::TempDir;
use tigerbox::{connection_params, open_controller, Config, SendOptions};

#[test]
fn test_open_simulated_from_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[simulation]\nenabled = true\nmotor_axes = [\"X\", \"Y\", \"Z\"]\n",
    )
    .unwrap();

    let config = Config::load_from_file(&path).unwrap();
    let mut controller = open_controller(&config).unwrap();
    assert_eq!(controller.build_config().axes().len(), 3);

    controller
        .move_relative(&[("z", 12.5)], SendOptions::BLOCKING)
        .unwrap();
    let position = controller.get_position(&["z"]).unwrap();
    assert_eq!(position.values().copied().collect::<Vec<_>>(), vec![12.5]);
}

#[test]
fn test_invalid_config_is_refused() {
    let mut config = Config::new();
    config.simulation.enabled = true;
    config.simulation.motor_axes = vec!["X".to_string(), "X".to_string()];
    assert!(open_controller(&config).is_err());
}

#[test]
fn test_connection_params_from_settings() {
    let mut config = Config::new();
    config.connection.port = "COM7".to_string();
    config.connection.timeout_ms = 300;

    let params = connection_params(&config.connection);
    assert_eq!(params.port, "COM7");
    assert_eq!(params.timeout_ms, 300);
    assert_eq!(params.baud_rate, 115_200);
    assert_eq!(params.command_terminator, "\r");
    assert!(params.validate().is_ok());
}

#[test]
fn test_long_version_carries_build_date() {
    assert!(tigerbox::LONG_VERSION.starts_with(tigerbox::VERSION));
    assert!(tigerbox::LONG_VERSION.ends_with(&format!("(built {})", tigerbox::BUILD_DATE)));
}
