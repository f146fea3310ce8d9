//! ASI Tiger controller support
//!
//! - `device_codes`: verbs and enumerated parameter codes
//! - `command_creator`: builds command lines
//! - `response_parser`: decodes replies
//! - `error_decoder`: `:N-<code>` descriptions
//! - `controller`: the driver
//! - `simulator`: an in-memory Tiger for tests and offline use

pub mod command_creator;
pub mod controller;
pub mod device_codes;
pub mod error_decoder;
pub mod response_parser;
pub mod simulator;

pub use command_creator::{CommandCreator, CommandLine, LineKind, Token};
pub use controller::TigerController;
pub use response_parser::{Ack, Reply};
pub use simulator::{SimTigerController, SimulatedTiger};
