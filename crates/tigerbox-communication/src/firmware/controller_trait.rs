//! Stage controller trait
//!
//! Every operation validates its axis arguments against the build
//! configuration before anything is written. State-changing operations take
//! [`SendOptions`] and report whether the reply was read ([`Ack::Received`])
//! or left pending ([`Ack::Pending`]). Queries always wait for the reply.
//!
//! Axis arguments are letters, case-insensitive. An empty list means "all
//! axes" for the operations that allow it (see
//! [`tigerbox_core::Operation::defaults_to_all_axes`]).
//!
//! Implementations are not internally synchronized; share one across threads
//! behind a mutex.

use crate::communication::SendOptions;
use crate::firmware::tiger::device_codes::{
    ControlMode, JoystickInput, JoystickPolarity, RingBufferMode, ScanPattern, TtlPinModes,
};
use crate::firmware::tiger::response_parser::Ack;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tigerbox_core::units::DEFAULT_SPEED_PERCENT;
use tigerbox_core::{Axis, AxisValues, BuildConfig, CardAddress, Result};

/// Fast axis setup for `SCANR`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRParams {
    /// Absolute start position
    pub start_mm: f64,
    /// Spacing between output pulses, rounded to whole encoder ticks
    pub pulse_interval_um: f64,
    /// Absolute stop position; exclusive with `num_pixels`
    pub stop_mm: Option<f64>,
    /// Number of pulses; exclusive with `stop_mm`
    pub num_pixels: Option<u32>,
    /// Speed of the return move, in percent
    pub retrace_speed_percent: Option<f64>,
}

impl Default for ScanRParams {
    fn default() -> Self {
        Self {
            start_mm: 0.0,
            pulse_interval_um: 0.0,
            stop_mm: None,
            num_pixels: None,
            retrace_speed_percent: Some(DEFAULT_SPEED_PERCENT),
        }
    }
}

/// Slow axis setup for `SCANV`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanVParams {
    pub start_mm: f64,
    pub stop_mm: f64,
    pub line_count: u32,
    /// Extra settle time in addition to the acceleration time
    pub overshoot_time_ms: Option<f64>,
    /// Multiplier on the run-up distance before pulses start
    pub overshoot_factor: Option<f64>,
}

/// Grid scan setup for `ARRAY`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayScanParams {
    /// Points along X, including the start
    pub x_points: u32,
    pub delta_x_mm: f64,
    /// Points along Y, including the start
    pub y_points: u32,
    pub delta_y_mm: f64,
    /// Rotation of the grid about its start position
    pub theta_deg: f64,
    /// Start X; the current position when unset
    pub x_start_mm: Option<f64>,
    /// Start Y; the current position when unset
    pub y_start_mm: Option<f64>,
    /// Sent as a separate `SCAN F=` line when set
    pub pattern: Option<ScanPattern>,
    /// Card to run on; inferred from the X/Y card when unset
    pub card: Option<CardAddress>,
}

impl Default for ArrayScanParams {
    fn default() -> Self {
        Self {
            x_points: 0,
            delta_x_mm: 0.0,
            y_points: 0,
            delta_y_mm: 0.0,
            theta_deg: 0.0,
            x_start_mm: None,
            y_start_mm: None,
            pattern: Some(ScanPattern::Raster),
            card: None,
        }
    }
}

/// Operations supported by a multi-axis stage controller
pub trait StageController: Send {
    /// The build configuration read at construction
    fn build_config(&self) -> &BuildConfig;

    /// Stop all motion
    fn halt(&mut self, options: SendOptions) -> Result<Ack>;

    /// Move by the given amounts, in stage units
    fn move_relative(&mut self, axes: &[(&str, f64)], options: SendOptions) -> Result<Ack>;

    /// Move to the given positions, in stage units
    fn move_absolute(&mut self, axes: &[(&str, f64)], options: SendOptions) -> Result<Ack>;

    /// Move to the stored home position, or a hardware limit
    fn home(&mut self, axes: &[&str], options: SendOptions) -> Result<Ack>;

    /// Store home positions in mm. Axes in `current` use the current position.
    fn set_home(
        &mut self,
        current: &[&str],
        explicit: &[(&str, f64)],
        options: SendOptions,
    ) -> Result<Ack>;

    fn reset_home(&mut self, axes: &[&str], options: SendOptions) -> Result<Ack>;

    fn get_home(&mut self, axes: &[&str]) -> Result<AxisValues>;

    /// Make the current position read as zero
    fn zero_in_place(&mut self, axes: &[&str], options: SendOptions) -> Result<Ack>;

    /// Redefine the current position, in stage units
    fn set_position(&mut self, axes: &[(&str, f64)], options: SendOptions) -> Result<Ack>;

    /// Current positions in stage units
    fn get_position(&mut self, axes: &[&str]) -> Result<AxisValues>;

    fn set_lower_travel_limit(
        &mut self,
        current: &[&str],
        explicit: &[(&str, f64)],
        options: SendOptions,
    ) -> Result<Ack>;

    fn get_lower_travel_limit(&mut self, axes: &[&str]) -> Result<AxisValues>;

    fn reset_lower_travel_limits(&mut self, axes: &[&str], options: SendOptions) -> Result<Ack>;

    fn set_upper_travel_limit(
        &mut self,
        current: &[&str],
        explicit: &[(&str, f64)],
        options: SendOptions,
    ) -> Result<Ack>;

    fn get_upper_travel_limit(&mut self, axes: &[&str]) -> Result<AxisValues>;

    fn reset_upper_travel_limits(&mut self, axes: &[&str], options: SendOptions) -> Result<Ack>;

    /// Set speeds in mm/s
    fn set_speed(&mut self, axes: &[(&str, f64)], options: SendOptions) -> Result<Ack>;

    fn get_speed(&mut self, axes: &[&str]) -> Result<AxisValues>;

    /// Set backlash compensation; 0 disables it
    fn set_axis_backlash(&mut self, axes: &[(&str, f64)], options: SendOptions) -> Result<Ack>;

    fn get_axis_backlash(&mut self, axes: &[&str]) -> Result<AxisValues>;

    /// Encoder ticks per mm of travel. Cached per axis.
    fn get_encoder_ticks_per_mm(&mut self, axis: &str) -> Result<f64>;

    /// Bind axes to joystick inputs. Binding also enables the input.
    fn bind_axis_to_joystick_input(&mut self, axes: &[(&str, JoystickInput)]) -> Result<Ack>;

    fn get_joystick_axis_mapping(&mut self, axes: &[&str]) -> Result<BTreeMap<Axis, JoystickInput>>;

    /// Set joystick direction per axis, then re-enable the inputs
    fn set_joystick_axis_polarity(&mut self, axes: &[(&str, JoystickPolarity)]) -> Result<Ack>;

    /// Enable joystick control. Re-applies the default input binding.
    fn enable_joystick_inputs(&mut self, axes: &[&str]) -> Result<Ack>;

    fn disable_joystick_inputs(&mut self, axes: &[&str]) -> Result<Ack>;

    /// Choose which axes ring buffer moves may drive
    fn setup_ring_buffer(
        &mut self,
        axes: &[&str],
        mode: RingBufferMode,
        options: SendOptions,
    ) -> Result<Ack>;

    /// Push a move into the ring buffer
    fn queue_buffered_move(&mut self, axes: &[(&str, f64)], options: SendOptions) -> Result<Ack>;

    fn reset_ring_buffer(&mut self, options: SendOptions) -> Result<Ack>;

    /// Declare the fast and slow scan axes; both must share a card
    fn setup_scan(
        &mut self,
        fast_axis: &str,
        slow_axis: &str,
        pattern: ScanPattern,
        options: SendOptions,
    ) -> Result<Ack>;

    /// Configure the fast axis. Requires [`StageController::setup_scan`].
    fn scanr(&mut self, params: &ScanRParams, options: SendOptions) -> Result<Ack>;

    /// Configure the slow axis. Requires [`StageController::setup_scan`].
    fn scanv(&mut self, params: &ScanVParams, options: SendOptions) -> Result<Ack>;

    /// Start the configured scan and clear the scan setup
    fn start_scan(&mut self, options: SendOptions) -> Result<Ack>;

    fn stop_scan(&mut self, options: SendOptions) -> Result<Ack>;

    fn setup_array_scan(&mut self, params: &ArrayScanParams, options: SendOptions) -> Result<Ack>;

    /// Requires [`StageController::setup_array_scan`]
    fn start_array_scan(&mut self, options: SendOptions) -> Result<Ack>;

    /// Configure the TTL pins. The card is inferred from earlier setup for
    /// the relative-move, ring-buffer and array input modes.
    fn set_ttl_pin_modes(
        &mut self,
        modes: &TtlPinModes,
        card: Option<&CardAddress>,
        options: SendOptions,
    ) -> Result<Ack>;

    /// TTL parameters of a card, keyed by parameter letter
    fn get_ttl_pin_modes(&mut self, card: &CardAddress) -> Result<AxisValues>;

    fn get_ttl_output_state(&mut self) -> Result<bool>;

    fn is_moving(&mut self) -> Result<bool>;

    /// Block until no axis is moving
    fn wait_until_idle(&mut self) -> Result<()> {
        while self.is_moving()? {}
        Ok(())
    }

    fn get_axis_id(&mut self, axis: &str) -> Result<u32>;

    /// Two-column `INFO` dump for one axis
    fn get_info(&mut self, axis: &str) -> Result<BTreeMap<String, String>>;

    fn set_axis_control_mode(
        &mut self,
        axes: &[(&str, ControlMode)],
        options: SendOptions,
    ) -> Result<Ack>;

    fn get_axis_control_mode(&mut self, axis: &str) -> Result<String>;

    /// Temperature of a tunable lens axis
    fn get_etl_temp(&mut self, axis: &str) -> Result<f64>;

    /// Discard unread input and replies owed to non-blocking sends
    fn clear_incoming_message_queue(&mut self) -> Result<()>;
}
