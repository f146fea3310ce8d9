//! Stage unit helpers
//!
//! Positions on the wire are in stage units (tenths of a micron). Speeds,
//! travel limits and scan positions are in millimetres.

/// Stage units per micron
pub const STEPS_PER_UM: f64 = 10.0;
/// Stage units per millimetre
pub const STAGE_UNITS_PER_MM: f64 = STEPS_PER_UM * 1000.0;
/// Decimal places kept for millimetre values
pub const MM_SCALE: u32 = 4;
/// Decimal places kept for angles in degrees
pub const DEG_SCALE: u32 = 3;
/// Default retrace speed for scans, as a percentage
pub const DEFAULT_SPEED_PERCENT: f64 = 67.0;
/// Default axis speed in mm/s
pub const DEFAULT_SPEED_MM_PER_SEC: f64 = 7.68 * 67.0;

/// Round half away from zero to `places` decimal places.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

pub fn round_mm(value: f64) -> f64 {
    round_to(value, MM_SCALE)
}

pub fn round_deg(value: f64) -> f64 {
    round_to(value, DEG_SCALE)
}

pub fn um_to_stage_units(um: f64) -> f64 {
    um * STEPS_PER_UM
}

pub fn mm_to_stage_units(mm: f64) -> f64 {
    mm * STAGE_UNITS_PER_MM
}

pub fn stage_units_to_mm(units: f64) -> f64 {
    units / STAGE_UNITS_PER_MM
}
