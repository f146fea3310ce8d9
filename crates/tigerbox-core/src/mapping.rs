//! Axis mapping
//!
//! Resolves caller-supplied axis letters against the build configuration.
//! Resolution is case-insensitive and order-insensitive: the output is always
//! in hardware order, so two calls naming the same axes produce identical
//! command lines.

use crate::axis::{Axis, AxisValueSet};
use crate::data::BuildConfig;
use crate::error::{ArgumentError, AxisError, Result};
use std::fmt;

/// Operations that take an axis list, used to pick the empty-input policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    MoveRelative,
    MoveAbsolute,
    Home,
    SetHome,
    ResetHome,
    GetHome,
    ZeroInPlace,
    SetPosition,
    GetPosition,
    SetLowerLimit,
    GetLowerLimit,
    ResetLowerLimit,
    SetUpperLimit,
    GetUpperLimit,
    ResetUpperLimit,
    SetSpeed,
    GetSpeed,
    SetBacklash,
    GetBacklash,
    EncoderTicks,
    BindJoystick,
    GetJoystickMapping,
    SetJoystickPolarity,
    EnableJoystick,
    DisableJoystick,
    SetupRingBuffer,
    QueueBufferedMove,
    SetupScan,
    AxisId,
    Info,
    SetControlMode,
    GetControlMode,
    EtlTemperature,
}

impl Operation {
    /// Whether an empty axis list means every lettered axis.
    ///
    /// Operations that assign values never default.
    pub const fn defaults_to_all_axes(self) -> bool {
        matches!(
            self,
            Operation::Home
                | Operation::ZeroInPlace
                | Operation::ResetHome
                | Operation::ResetLowerLimit
                | Operation::ResetUpperLimit
                | Operation::GetHome
                | Operation::GetLowerLimit
                | Operation::GetUpperLimit
                | Operation::GetPosition
                | Operation::GetSpeed
                | Operation::GetBacklash
                | Operation::GetJoystickMapping
                | Operation::EnableJoystick
                | Operation::DisableJoystick
        )
    }

    pub const fn name(self) -> &'static str {
        match self {
            Operation::MoveRelative => "move_relative",
            Operation::MoveAbsolute => "move_absolute",
            Operation::Home => "home",
            Operation::SetHome => "set_home",
            Operation::ResetHome => "reset_home",
            Operation::GetHome => "get_home",
            Operation::ZeroInPlace => "zero_in_place",
            Operation::SetPosition => "set_position",
            Operation::GetPosition => "get_position",
            Operation::SetLowerLimit => "set_lower_travel_limit",
            Operation::GetLowerLimit => "get_lower_travel_limit",
            Operation::ResetLowerLimit => "reset_lower_travel_limits",
            Operation::SetUpperLimit => "set_upper_travel_limit",
            Operation::GetUpperLimit => "get_upper_travel_limit",
            Operation::ResetUpperLimit => "reset_upper_travel_limits",
            Operation::SetSpeed => "set_speed",
            Operation::GetSpeed => "get_speed",
            Operation::SetBacklash => "set_axis_backlash",
            Operation::GetBacklash => "get_axis_backlash",
            Operation::EncoderTicks => "get_encoder_ticks_per_mm",
            Operation::BindJoystick => "bind_axis_to_joystick_input",
            Operation::GetJoystickMapping => "get_joystick_axis_mapping",
            Operation::SetJoystickPolarity => "set_joystick_axis_polarity",
            Operation::EnableJoystick => "enable_joystick_inputs",
            Operation::DisableJoystick => "disable_joystick_inputs",
            Operation::SetupRingBuffer => "setup_ring_buffer",
            Operation::QueueBufferedMove => "queue_buffered_move",
            Operation::SetupScan => "setup_scan",
            Operation::AxisId => "get_axis_id",
            Operation::Info => "get_info",
            Operation::SetControlMode => "set_axis_control_mode",
            Operation::GetControlMode => "get_axis_control_mode",
            Operation::EtlTemperature => "get_etl_temp",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validates axis arguments and puts them in hardware order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisMapper {
    axes: Vec<Axis>,
}

impl AxisMapper {
    pub fn new(config: &BuildConfig) -> Self {
        Self::from_axes(config.axes().to_vec())
    }

    pub fn from_axes(axes: Vec<Axis>) -> Self {
        Self { axes }
    }

    /// Lettered axes in hardware order
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Parse one letter and check it exists.
    pub fn resolve_axis(&self, input: &str) -> Result<Axis> {
        let axis = Axis::parse(input)?;
        if !self.axes.contains(&axis) {
            return Err(AxisError::Unknown {
                axis: axis.to_string(),
            }
            .into());
        }
        Ok(axis)
    }

    /// Resolve a bare axis list.
    pub fn resolve<S: AsRef<str>>(&self, op: Operation, inputs: &[S]) -> Result<Vec<Axis>> {
        if inputs.is_empty() && op.defaults_to_all_axes() {
            return Ok(self.axes.clone());
        }
        let pairs: Vec<(&str, ())> = inputs.iter().map(|s| (s.as_ref(), ())).collect();
        Ok(self
            .resolve_with(op, &pairs)?
            .into_iter()
            .map(|(axis, _)| axis)
            .collect())
    }

    /// Resolve `(letter, value)` pairs carrying any value type.
    pub fn resolve_with<V: Clone>(
        &self,
        op: Operation,
        inputs: &[(&str, V)],
    ) -> Result<Vec<(Axis, V)>> {
        if inputs.is_empty() {
            return Err(ArgumentError::EmptyAxisSet {
                operation: op.to_string(),
            }
            .into());
        }
        let mut resolved: Vec<(Axis, V)> = Vec::with_capacity(inputs.len());
        for (input, value) in inputs {
            let axis = self.resolve_axis(input)?;
            if resolved.iter().any(|(a, _)| *a == axis) {
                return Err(ArgumentError::DuplicateAxis {
                    axis: axis.to_string(),
                }
                .into());
            }
            resolved.push((axis, value.clone()));
        }
        resolved.sort_by_key(|(axis, _)| self.axes.iter().position(|a| a == axis));
        Ok(resolved)
    }

    /// Resolve numeric assignments, rejecting NaN and infinities.
    pub fn resolve_values(&self, op: Operation, inputs: &[(&str, f64)]) -> Result<Vec<(Axis, f64)>> {
        let resolved = self.resolve_with(op, inputs)?;
        check_finite(&resolved)?;
        Ok(resolved)
    }

    /// Resolve a call naming some axes bare (use current value) and some with
    /// explicit values. An axis may appear in only one of the two lists.
    pub fn resolve_mixed<S: AsRef<str>>(
        &self,
        op: Operation,
        current: &[S],
        explicit: &[(&str, f64)],
    ) -> Result<AxisValueSet> {
        if current.is_empty() && explicit.is_empty() && op.defaults_to_all_axes() {
            let mut set = AxisValueSet::new();
            for axis in &self.axes {
                set.insert(*axis, None)?;
            }
            return Ok(set);
        }
        let mut inputs: Vec<(&str, Option<f64>)> =
            current.iter().map(|s| (s.as_ref(), None)).collect();
        inputs.extend(explicit.iter().map(|(s, v)| (*s, Some(*v))));

        let resolved = self.resolve_with(op, &inputs)?;
        let mut set = AxisValueSet::new();
        for (axis, value) in resolved {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(ArgumentError::NonFiniteValue {
                        axis: axis.to_string(),
                        value: v,
                    }
                    .into());
                }
            }
            set.insert(axis, value)?;
        }
        Ok(set)
    }
}

fn check_finite(values: &[(Axis, f64)]) -> Result<()> {
    for (axis, value) in values {
        if !value.is_finite() {
            return Err(ArgumentError::NonFiniteValue {
                axis: axis.to_string(),
                value: *value,
            }
            .into());
        }
    }
    Ok(())
}
