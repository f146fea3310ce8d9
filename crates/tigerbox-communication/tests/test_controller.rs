mod common;

use common::scripted_controller;
use tigerbox_communication::{
    Ack, Command, CommandCreator, ScanPattern, ScanRParams, SendOptions, StageController,
    TtlIn0Mode, TtlPinModes,
};
use tigerbox_core::{ArgumentError, Axis, Error, ProtocolError};

fn ack(_: &str) -> Option<String> {
    Some(":A".to_string())
}

#[test]
fn test_build_config_read_at_construction() {
    let (controller, channel) = scripted_controller(200, ack);
    let config = controller.build_config();
    assert_eq!(config.axes().len(), 3);
    assert_eq!(config.axis_type(Axis::new('Z').unwrap()), Some('z'));
    assert_eq!(channel.written(), vec!["BU X", "31BU X", "32BU X"]);
}

#[test]
fn test_unknown_axis_writes_nothing() {
    let (mut controller, channel) = scripted_controller(200, ack);
    let before = channel.write_count();

    let err = controller
        .move_absolute(&[("x", 1.0), ("q", 2.0)], SendOptions::BLOCKING)
        .unwrap_err();
    assert!(err.is_unknown_axis());
    assert_eq!(channel.write_count(), before);
}

#[test]
fn test_query_ignores_fire_and_forget() {
    let (mut controller, _channel) = scripted_controller(200, |line| match line {
        "S X?" => Some(":A X=1.5".to_string()),
        _ => Some(":A".to_string()),
    });
    let line = CommandCreator::new().queries(Command::Speed, &[Axis::new('X').unwrap()]);
    let reply = controller
        .send_command(&line, SendOptions::FIRE_AND_FORGET)
        .unwrap();
    assert_eq!(reply.as_deref(), Some(":A X=1.5"));
}

#[test]
fn test_axis_order_does_not_change_the_line() {
    let (mut controller, channel) = scripted_controller(200, ack);

    controller
        .zero_in_place(&["y", "x"], SendOptions::BLOCKING)
        .unwrap();
    let first = channel.last_written().unwrap();
    controller
        .zero_in_place(&["X", "Y"], SendOptions::BLOCKING)
        .unwrap();
    let second = channel.last_written().unwrap();

    assert_eq!(first, "H X=0 Y=0");
    assert_eq!(first, second);
}

#[test]
fn test_skipped_reply_error_is_attributed_to_earlier_command() {
    let (mut controller, _channel) = scripted_controller(200, |line| match line {
        "M X=5" => Some(":N-4".to_string()),
        "W X" => Some(":A 5".to_string()),
        _ => Some(":A".to_string()),
    });

    let ack = controller
        .move_absolute(&[("x", 5.0)], SendOptions::FIRE_AND_FORGET)
        .unwrap();
    assert_eq!(ack, Ack::Pending);

    let err = controller.get_position(&["x"]).unwrap_err();
    match err {
        Error::Protocol(ProtocolError::DeviceError { code, command, .. }) => {
            assert_eq!(code, 4);
            assert_eq!(command, "M X=5");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unanswered_query_times_out() {
    let (mut controller, _channel) = scripted_controller(50, |line| match line {
        "/" => None,
        _ => Some(":A".to_string()),
    });
    let err = controller.is_moving().unwrap_err();
    assert!(err.is_timeout());
    assert!(!err.is_transport_error());
}

#[test]
fn test_device_error_code() {
    let (mut controller, _channel) = scripted_controller(200, |line| match line {
        "S X=2" => Some(":N-2".to_string()),
        _ => Some(":A".to_string()),
    });
    let err = controller
        .set_speed(&[("x", 2.0)], SendOptions::BLOCKING)
        .unwrap_err();
    assert!(err.is_protocol_error());
    assert_eq!(err.device_error_code(), Some(2));
}

#[test]
fn test_malformed_reply_carries_raw_text() {
    let (mut controller, _channel) = scripted_controller(200, |line| match line {
        "S X?" => Some(":A X#5".to_string()),
        _ => Some(":A".to_string()),
    });
    let err = controller.get_speed(&["x"]).unwrap_err();
    match err {
        Error::Protocol(ProtocolError::MalformedReply { raw, .. }) => assert!(raw.contains("X#5")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_query_answered_with_bare_ack_is_malformed() {
    let (mut controller, _channel) = scripted_controller(200, ack);
    let err = controller.get_axis_backlash(&["y"]).unwrap_err();
    match err {
        Error::Protocol(ProtocolError::MalformedReply { reason, raw }) => {
            assert!(reason.contains("B Y?"));
            assert_eq!(raw, ":A");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_limits_are_rounded() {
    let (mut controller, channel) = scripted_controller(200, ack);
    controller
        .set_lower_travel_limit(&["y"], &[("x", -1.234_567)], SendOptions::BLOCKING)
        .unwrap();
    assert_eq!(channel.last_written().unwrap(), "SL X=-1.2346 Y+");
}

#[test]
fn test_ring_buffer_axis_byte() {
    let (mut controller, channel) = scripted_controller(200, ack);
    controller
        .setup_ring_buffer(&["z", "x"], Default::default(), SendOptions::BLOCKING)
        .unwrap();
    assert_eq!(channel.last_written().unwrap(), "RM X=0 Y=5 F=0");

    let err = controller
        .setup_ring_buffer(&[], Default::default(), SendOptions::BLOCKING)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Argument(ArgumentError::EmptyAxisSet { .. })
    ));
}

#[test]
fn test_scan_setup_sequence() {
    let (mut controller, channel) = scripted_controller(200, |line| match line {
        "Z2B X?" => Some(":A X=0".to_string()),
        "Z2B Y?" => Some(":A Y=1".to_string()),
        "CNTS X?" => Some(":A X=10000".to_string()),
        _ => Some(":A".to_string()),
    });

    let params = ScanRParams {
        start_mm: 1.0,
        pulse_interval_um: 10.0,
        num_pixels: Some(50),
        ..Default::default()
    };
    let err = controller
        .scanr(&params, SendOptions::BLOCKING)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Argument(ArgumentError::InvalidSequence { .. })
    ));

    controller
        .setup_scan("x", "y", ScanPattern::Raster, SendOptions::BLOCKING)
        .unwrap();
    assert_eq!(channel.last_written().unwrap(), "31SCAN Y=0 Z=1 F=0");

    controller.scanr(&params, SendOptions::BLOCKING).unwrap();
    assert_eq!(
        channel.last_written().unwrap(),
        "31SCANR X=1 Z=100 F=50 R=67"
    );

    let both = ScanRParams {
        stop_mm: Some(2.0),
        ..params
    };
    let err = controller.scanr(&both, SendOptions::BLOCKING).unwrap_err();
    assert!(err.is_invalid_argument());

    controller.start_scan(SendOptions::BLOCKING).unwrap();
    assert_eq!(channel.last_written().unwrap(), "31SCAN S");
    assert!(controller.start_scan(SendOptions::BLOCKING).is_err());
}

#[test]
fn test_scan_axes_must_share_a_card() {
    let (mut controller, _channel) = scripted_controller(200, ack);
    let err = controller
        .setup_scan("x", "z", ScanPattern::Serpentine, SendOptions::BLOCKING)
        .unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn test_ttl_card_follows_last_relative_move() {
    let (mut controller, channel) = scripted_controller(200, ack);
    let modes = TtlPinModes {
        in0_mode: Some(TtlIn0Mode::RepeatLastRelMove),
        ..Default::default()
    };

    let err = controller
        .set_ttl_pin_modes(&modes, None, SendOptions::BLOCKING)
        .unwrap_err();
    assert!(err.is_invalid_argument());

    controller
        .move_relative(&[("z", 10.0), ("x", 10.0)], SendOptions::BLOCKING)
        .unwrap();
    let before = channel.write_count();
    controller
        .set_ttl_pin_modes(&modes, None, SendOptions::BLOCKING)
        .unwrap();

    let written = channel.written();
    assert_eq!(&written[before..], &["31TTL X=2 F=1", "32TTL X=2 F=1"]);
}
