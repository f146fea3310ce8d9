//! Controller implementations
//!
//! - `controller_trait`: the operation set shared by real and simulated controllers
//! - `tiger`: the ASI Tiger command set, driver and simulated device

pub mod controller_trait;
pub mod tiger;

pub use controller_trait::{ArrayScanParams, ScanRParams, ScanVParams, StageController};
