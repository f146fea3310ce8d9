//! # TigerBox Communication
//!
//! Serial transport and the Tiger command/reply protocol.
//! Includes the hardware controller driver and an in-memory simulated
//! controller, both behind the [`StageController`] trait.

pub mod communication;
pub mod firmware;

pub use communication::{
    serial::{SerialChannel, SerialTransport},
    ConnectionParams, SendOptions, SerialParity, SkippedReply, Transport,
};

pub use firmware::controller_trait::{
    ArrayScanParams, ScanRParams, ScanVParams, StageController,
};
pub use firmware::tiger::{
    command_creator::{CommandCreator, CommandLine, LineKind, Token},
    controller::TigerController,
    device_codes::{
        Command, ControlMode, JoystickInput, JoystickPolarity, MicroMirrorControlMode,
        PiezoControlMode, RingBufferMode, ScanPattern, ScanState, TtlIn0Mode, TtlOut0Mode,
        TtlPinModes, TunableLensControlMode,
    },
    response_parser::{Ack, Reply},
    simulator::{SimTigerController, SimulatedTiger},
};
