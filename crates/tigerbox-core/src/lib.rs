//! # TigerBox Core
//!
//! Core types shared by the TigerBox crates.
//! Provides the axis model, axis mapping against the controller's build
//! configuration, stage-unit helpers and the error taxonomy.

pub mod axis;
pub mod data;
pub mod error;
pub mod mapping;
pub mod units;

pub use axis::{Axis, AxisValueSet, AxisValues};
pub use data::{AxisCard, BuildConfig, CardAddress};
pub use error::{
    ArgumentError, AxisError, ConnectionError, Error, FirmwareError, ProtocolError, Result,
};
pub use mapping::{AxisMapper, Operation};
