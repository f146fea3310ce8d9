//! Build configuration model
//!
//! The controller reports its hardware layout in reply to `BU X`: the motor
//! axes in hardware order, the card each axis lives on, and the axis types.
//! Each card additionally reports the firmware modules it was built with.

use crate::axis::Axis;
use crate::error::{ArgumentError, ProtocolError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Build configuration key listing the motor axes in hardware order
pub const MOTOR_AXES_KEY: &str = "Motor Axes";
/// Build configuration key listing the per-axis type codes
pub const AXIS_TYPES_KEY: &str = "Axis Types";
/// Build configuration key listing the per-axis card hex address
pub const HEX_ADDR_KEY: &str = "Hex Addr";

/// Firmware module required by `SCAN`, `SCANR` and `SCANV`
pub const SCAN_MODULE: &str = "SCAN MODULE";
/// Firmware module required by `ARRAY` and `AHOME`
pub const ARRAY_MODULE: &str = "ARRAY MODULE";

/// Type code reported for tunable lens axes
pub const TUNABLE_LENS_TYPE: char = 'b';

/// Hex address of a controller card, e.g. `31`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardAddress(String);

impl CardAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardAddress {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Card placement of one axis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisCard {
    /// Card the axis is wired to
    pub address: CardAddress,
    /// Position of the axis among the axes on the same card, counting from 0
    pub index: usize,
}

/// Parsed controller build configuration
///
/// Read-only once constructed, apart from the card module lists which are
/// fetched per card after the main configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    motor_axes: Vec<Axis>,
    filter_wheels: Vec<String>,
    axis_cards: BTreeMap<Axis, AxisCard>,
    axis_types: BTreeMap<Axis, char>,
    card_modules: BTreeMap<CardAddress, Vec<String>>,
    fields: BTreeMap<String, Vec<String>>,
}

impl BuildConfig {
    /// Build from the `Key: v1 v2 ...` fields of a `BU X` reply.
    ///
    /// Numeric motor axes are FW-1000 filter wheels; they are recorded but
    /// never treated as axes.
    pub fn from_fields(fields: BTreeMap<String, Vec<String>>) -> Result<Self, ProtocolError> {
        let motor_axes = fields.get(MOTOR_AXES_KEY).ok_or_else(|| {
            ProtocolError::malformed(
                format!("build configuration has no '{MOTOR_AXES_KEY}' line"),
                render_fields(&fields),
            )
        })?;
        let hex_addrs = fields.get(HEX_ADDR_KEY);
        let types = fields.get(AXIS_TYPES_KEY);

        let mut config = BuildConfig::default();
        let mut per_card: BTreeMap<String, usize> = BTreeMap::new();

        for (position, name) in motor_axes.iter().enumerate() {
            let card = hex_addrs.and_then(|addrs| addrs.get(position)).map(|addr| {
                let index = per_card.entry(addr.clone()).or_insert(0);
                let card = AxisCard {
                    address: CardAddress::new(addr.as_str()),
                    index: *index,
                };
                *index += 1;
                card
            });

            if name.chars().all(|c| c.is_ascii_digit()) {
                config.filter_wheels.push(name.clone());
                continue;
            }

            let axis = Axis::parse(name).map_err(|_| {
                ProtocolError::malformed(
                    format!("'{name}' is not a motor axis name"),
                    motor_axes.join(" "),
                )
            })?;
            if config.motor_axes.contains(&axis) {
                return Err(ProtocolError::malformed(
                    format!("axis '{axis}' is listed twice"),
                    motor_axes.join(" "),
                ));
            }
            config.motor_axes.push(axis);

            if let Some(card) = card {
                config.axis_cards.insert(axis, card);
            }
            if let Some(code) = types
                .and_then(|t| t.get(position))
                .and_then(|t| t.chars().next())
            {
                config.axis_types.insert(axis, code);
            }
        }

        config.fields = fields;
        Ok(config)
    }

    /// A configuration for simulated hardware: two axes per card on cards
    /// `31`, `32`, ... with the scan and array modules installed.
    pub fn simulated(axes: &[&str]) -> crate::Result<Self> {
        let mut config = BuildConfig::default();
        for (position, name) in axes.iter().enumerate() {
            let axis = Axis::parse(name)?;
            if config.motor_axes.contains(&axis) {
                return Err(ArgumentError::DuplicateAxis {
                    axis: axis.to_string(),
                }
                .into());
            }
            let address = CardAddress::new(format!("{}", 31 + position / 2));
            config.motor_axes.push(axis);
            config.axis_types.insert(axis, 'x');
            config
                .card_modules
                .entry(address.clone())
                .or_insert_with(|| vec![SCAN_MODULE.to_string(), ARRAY_MODULE.to_string()]);
            config.axis_cards.insert(
                axis,
                AxisCard {
                    address,
                    index: position % 2,
                },
            );
        }
        config.fields.insert(
            MOTOR_AXES_KEY.to_string(),
            config.motor_axes.iter().map(|a| a.to_string()).collect(),
        );
        Ok(config)
    }

    /// Lettered axes in hardware order
    pub fn axes(&self) -> &[Axis] {
        &self.motor_axes
    }

    pub fn contains(&self, axis: Axis) -> bool {
        self.motor_axes.contains(&axis)
    }

    /// Filter wheel identifiers (`0`, `1`, ...) in hardware order
    pub fn filter_wheels(&self) -> &[String] {
        &self.filter_wheels
    }

    pub fn card(&self, axis: Axis) -> Option<&AxisCard> {
        self.axis_cards.get(&axis)
    }

    pub fn axis_type(&self, axis: Axis) -> Option<char> {
        self.axis_types.get(&axis).copied()
    }

    pub fn set_axis_type(&mut self, axis: Axis, code: char) {
        self.axis_types.insert(axis, code);
    }

    /// Position of the axis among the lettered axes
    pub fn hardware_index(&self, axis: Axis) -> Option<usize> {
        self.motor_axes.iter().position(|a| *a == axis)
    }

    /// Distinct card addresses in hardware order
    pub fn cards(&self) -> Vec<CardAddress> {
        self.cards_for(&self.motor_axes)
    }

    /// Distinct cards hosting the given axes, in order of first appearance
    pub fn cards_for(&self, axes: &[Axis]) -> Vec<CardAddress> {
        let mut cards: Vec<CardAddress> = Vec::new();
        for axis in axes {
            if let Some(card) = self.axis_cards.get(axis) {
                if !cards.contains(&card.address) {
                    cards.push(card.address.clone());
                }
            }
        }
        cards
    }

    /// The card shared by all the given axes, if they sit on exactly one card
    pub fn shared_card(&self, axes: &[Axis]) -> Option<CardAddress> {
        if axes.iter().any(|a| !self.axis_cards.contains_key(a)) {
            return None;
        }
        let mut cards = self.cards_for(axes);
        if cards.len() == 1 {
            cards.pop()
        } else {
            None
        }
    }

    pub fn set_card_modules(&mut self, card: CardAddress, modules: Vec<String>) {
        self.card_modules.insert(card, modules);
    }

    pub fn card_modules(&self, card: &CardAddress) -> &[String] {
        self.card_modules
            .get(card)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Modules from `required` that the card does not report
    pub fn missing_modules(&self, card: &CardAddress, required: &[&str]) -> Vec<String> {
        let installed = self.card_modules(card);
        required
            .iter()
            .filter(|m| !installed.iter().any(|i| i == *m))
            .map(|m| m.to_string())
            .collect()
    }

    /// Raw values of a build configuration line
    pub fn field(&self, key: &str) -> Option<&[String]> {
        self.fields.get(key).map(Vec::as_slice)
    }
}

fn render_fields(fields: &BTreeMap<String, Vec<String>>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}: {}", v.join(" ")))
        .collect::<Vec<_>>()
        .join("\r")
}
