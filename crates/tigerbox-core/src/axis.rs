//! Axis letters and per-axis value collections.

use crate::error::{ArgumentError, AxisError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A single motorized axis, identified by one uppercase ASCII letter.
///
/// Construction normalizes case, so `Axis::parse("x")` and `Axis::parse("X")`
/// are equal. Whether the axis actually exists on a controller is decided by
/// [`crate::AxisMapper`], not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Axis(char);

impl Axis {
    /// Create an axis from a character, uppercasing it.
    pub fn new(letter: char) -> Result<Self, AxisError> {
        if letter.is_ascii_alphabetic() {
            Ok(Self(letter.to_ascii_uppercase()))
        } else {
            Err(AxisError::InvalidLetter {
                input: letter.to_string(),
            })
        }
    }

    /// Parse an axis from text. Surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Result<Self, AxisError> {
        let mut chars = input.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(c).map_err(|_| AxisError::InvalidLetter {
                input: input.to_string(),
            }),
            _ => Err(AxisError::InvalidLetter {
                input: input.to_string(),
            }),
        }
    }

    /// The uppercase letter.
    pub fn letter(self) -> char {
        self.0
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Axis {
    type Err = AxisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<char> for Axis {
    type Error = AxisError;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for Axis {
    type Error = AxisError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Axis> for String {
    fn from(axis: Axis) -> Self {
        axis.0.to_string()
    }
}

/// Axis to value map returned by query operations.
pub type AxisValues = BTreeMap<Axis, f64>;

/// Ordered (axis, optional value) pairs with no repeated axis.
///
/// `None` means "use the current value" for commands that support it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisValueSet {
    entries: Vec<(Axis, Option<f64>)>,
}

impl AxisValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, rejecting an axis that is already present.
    pub fn insert(&mut self, axis: Axis, value: Option<f64>) -> Result<(), ArgumentError> {
        if self.contains(axis) {
            return Err(ArgumentError::DuplicateAxis {
                axis: axis.to_string(),
            });
        }
        self.entries.push((axis, value));
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Axis, Option<f64>)> {
        self.entries.iter()
    }

    pub fn axes(&self) -> impl Iterator<Item = Axis> + '_ {
        self.entries.iter().map(|(axis, _)| *axis)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, axis: Axis) -> bool {
        self.entries.iter().any(|(a, _)| *a == axis)
    }

    /// The entry for `axis`. The outer option is presence, the inner the value.
    pub fn get(&self, axis: Axis) -> Option<Option<f64>> {
        self.entries
            .iter()
            .find(|(a, _)| *a == axis)
            .map(|(_, value)| *value)
    }

    /// Only the entries that carry an explicit value.
    pub fn explicit_values(&self) -> AxisValues {
        self.entries
            .iter()
            .filter_map(|(axis, value)| value.map(|v| (*axis, v)))
            .collect()
    }
}

impl IntoIterator for AxisValueSet {
    type Item = (Axis, Option<f64>);
    type IntoIter = std::vec::IntoIter<(Axis, Option<f64>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case() {
        assert_eq!(Axis::parse("x").unwrap(), Axis::parse("X").unwrap());
        assert_eq!(Axis::parse(" y ").unwrap().letter(), 'Y');
    }

    #[test]
    fn test_parse_rejects_non_letters() {
        for input in ["", "XY", "1", "?", "é"] {
            assert!(matches!(
                Axis::parse(input),
                Err(AxisError::InvalidLetter { .. })
            ));
        }
    }

    #[test]
    fn test_serde_as_string() {
        let axis = Axis::parse("z").unwrap();
        let json = serde_json::to_string(&axis).unwrap();
        assert_eq!(json, "\"Z\"");
        let back: Axis = serde_json::from_str("\"m\"").unwrap();
        assert_eq!(back.letter(), 'M');
    }

    #[test]
    fn test_value_set_rejects_duplicates() {
        let x = Axis::new('x').unwrap();
        let mut set = AxisValueSet::new();
        set.insert(x, None).unwrap();
        let err = set.insert(x, Some(1.0)).unwrap_err();
        assert_eq!(
            err,
            ArgumentError::DuplicateAxis {
                axis: "X".to_string()
            }
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(x), Some(None));
    }

    #[test]
    fn test_explicit_values() {
        let mut set = AxisValueSet::new();
        set.insert(Axis::new('X').unwrap(), None).unwrap();
        set.insert(Axis::new('Y').unwrap(), Some(20.5)).unwrap();
        let values = set.explicit_values();
        assert_eq!(values.len(), 1);
        assert_eq!(values[&Axis::new('Y').unwrap()], 20.5);
    }
}
