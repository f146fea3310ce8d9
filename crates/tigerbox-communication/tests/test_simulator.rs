use proptest::prelude::*;
use tigerbox_communication::{
    ArrayScanParams, SendOptions, SimTigerController, StageController, TtlIn0Mode, TtlPinModes,
};
use tigerbox_core::{Axis, BuildConfig, CardAddress};

fn axis(c: char) -> Axis {
    Axis::new(c).unwrap()
}

#[test]
fn test_move_absolute_then_position() {
    let mut sim = SimTigerController::simulated().unwrap();
    sim.move_absolute(&[("x", 1000.0), ("y", 25.0)], SendOptions::BLOCKING)
        .unwrap();

    let all = sim.get_position(&[]).unwrap();
    assert_eq!(all[&axis('X')], 1000.0);
    assert_eq!(all[&axis('Y')], 25.0);
    assert_eq!(all[&axis('Z')], 0.0);
    assert_eq!(all.len(), 5);
}

#[test]
fn test_relative_moves_accumulate() {
    let mut sim = SimTigerController::simulated().unwrap();
    sim.move_relative(&[("z", 100.0)], SendOptions::BLOCKING)
        .unwrap();
    sim.move_relative(&[("z", 100.0)], SendOptions::FIRE_AND_FORGET)
        .unwrap();
    assert_eq!(sim.get_position(&["z"]).unwrap()[&axis('Z')], 200.0);
}

#[test]
fn test_set_home_is_idempotent() {
    let mut sim = SimTigerController::simulated().unwrap();
    for _ in 0..2 {
        sim.set_home(&[], &[("x", 100.0)], SendOptions::BLOCKING)
            .unwrap();
        assert_eq!(sim.get_home(&["x"]).unwrap()[&axis('X')], 100.0);
    }

    let err = sim
        .set_home(&["x"], &[("x", 100.0)], SendOptions::BLOCKING)
        .unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn test_moves_clamped_when_limits_enforced() {
    let mut sim = SimTigerController::simulated()
        .unwrap()
        .with_limits_enforced(true);
    sim.set_lower_travel_limit(&[], &[("x", -1.0)], SendOptions::BLOCKING)
        .unwrap();
    sim.set_upper_travel_limit(&[], &[("x", 2.0)], SendOptions::BLOCKING)
        .unwrap();

    sim.move_absolute(&[("x", 50_000.0)], SendOptions::BLOCKING)
        .unwrap();
    assert_eq!(sim.get_position(&["x"]).unwrap()[&axis('X')], 20_000.0);

    sim.move_relative(&[("x", -100_000.0)], SendOptions::BLOCKING)
        .unwrap();
    assert_eq!(sim.get_position(&["x"]).unwrap()[&axis('X')], -10_000.0);
}

#[test]
fn test_enforced_limits_default_to_reported_travel() {
    let mut sim = SimTigerController::simulated()
        .unwrap()
        .with_limits_enforced(true);
    assert_eq!(sim.get_upper_travel_limit(&["x"]).unwrap()[&axis('X')], 110.0);
    assert_eq!(sim.get_lower_travel_limit(&["y"]).unwrap()[&axis('Y')], -110.0);

    sim.move_absolute(&[("x", 2_000_000.0), ("y", -2_000_000.0)], SendOptions::BLOCKING)
        .unwrap();
    let position = sim.get_position(&["x", "y"]).unwrap();
    assert_eq!(position[&axis('X')], 1_100_000.0);
    assert_eq!(position[&axis('Y')], -1_100_000.0);

    sim.move_relative(&[("x", -500_000.0)], SendOptions::BLOCKING)
        .unwrap();
    assert_eq!(sim.get_position(&["x"]).unwrap()[&axis('X')], 600_000.0);
}

#[test]
fn test_moves_not_clamped_by_default() {
    let mut sim = SimTigerController::simulated().unwrap();
    sim.set_upper_travel_limit(&[], &[("x", 2.0)], SendOptions::BLOCKING)
        .unwrap();
    sim.move_absolute(&[("x", 50_000.0)], SendOptions::BLOCKING)
        .unwrap();
    assert_eq!(sim.get_position(&["x"]).unwrap()[&axis('X')], 50_000.0);
}

#[test]
fn test_zero_in_place_and_speed() {
    let mut sim = SimTigerController::simulated().unwrap();
    sim.move_absolute(&[("m", 1234.0)], SendOptions::BLOCKING)
        .unwrap();
    sim.zero_in_place(&["m"], SendOptions::BLOCKING).unwrap();
    assert_eq!(sim.get_position(&["m"]).unwrap()[&axis('M')], 0.0);

    sim.set_speed(&[("m", 1.234_56)], SendOptions::BLOCKING)
        .unwrap();
    assert_eq!(sim.get_speed(&["m"]).unwrap()[&axis('M')], 1.2346);
    assert_eq!(sim.sent_commands().last().unwrap(), "S M?");
}

#[test]
fn test_array_scan_lines() {
    let mut sim = SimTigerController::simulated().unwrap();
    let params = ArrayScanParams {
        x_points: 3,
        delta_x_mm: 0.5,
        y_points: 2,
        delta_y_mm: 0.25,
        theta_deg: 0.0,
        x_start_mm: Some(1.0),
        ..Default::default()
    };
    sim.setup_array_scan(&params, SendOptions::BLOCKING).unwrap();
    sim.start_array_scan(SendOptions::BLOCKING).unwrap();

    assert_eq!(
        sim.sent_commands(),
        &[
            "31SCAN F=0",
            "31AH X=1",
            "31AR X=3 Y=2 Z=0.5 F=0.25 T=0",
            "31AR",
        ]
    );
    assert!(sim.start_array_scan(SendOptions::BLOCKING).is_err());
}

#[test]
fn test_ttl_modes_stored_per_card() {
    let mut sim = SimTigerController::simulated().unwrap();
    let card = CardAddress::new("32");
    let modes = TtlPinModes {
        in0_mode: Some(TtlIn0Mode::ZStackEnable),
        reverse_output_polarity: true,
        ..Default::default()
    };
    sim.set_ttl_pin_modes(&modes, Some(&card), SendOptions::BLOCKING)
        .unwrap();

    let values = sim.get_ttl_pin_modes(&card).unwrap();
    assert_eq!(values[&axis('X')], 4.0);
    assert_eq!(values[&axis('F')], -1.0);
    assert!(!sim.get_ttl_output_state().unwrap());
}

#[test]
fn test_larger_build() {
    let config = BuildConfig::simulated(&["X", "Y", "Z", "F", "A", "B", "C", "D"]).unwrap();
    let mut sim = SimTigerController::with_build_config(config).unwrap();
    assert_eq!(sim.build_config().cards().len(), 4);
    assert!(sim.get_position(&["q"]).unwrap_err().is_unknown_axis());
    sim.home(&[], SendOptions::BLOCKING).unwrap();
    assert_eq!(
        sim.sent_commands().last().unwrap(),
        "! X Y Z F A B C D"
    );
}

#[test]
fn test_usable_as_trait_object() {
    let mut controller: Box<dyn StageController> =
        Box::new(SimTigerController::simulated().unwrap());
    controller
        .move_absolute(&[("n", -5.0)], SendOptions::BLOCKING)
        .unwrap();
    controller.wait_until_idle().unwrap();
    assert_eq!(controller.get_position(&["N"]).unwrap()[&axis('N')], -5.0);
}

proptest! {
    #[test]
    fn relative_moves_sum_to_position(steps in proptest::collection::vec(-5000i32..5000, 1..8)) {
        let mut sim = SimTigerController::simulated().unwrap();
        for step in &steps {
            sim.move_relative(&[("m", f64::from(*step))], SendOptions::FIRE_AND_FORGET)
                .unwrap();
        }
        let expected: i32 = steps.iter().sum();
        let position = sim.get_position(&["m"]).unwrap()[&axis('M')];
        prop_assert_eq!(position, f64::from(expected));
    }
}
