//! Tiger command verbs and parameter codes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Acknowledgement prefix of a successful reply
pub const ACK: &str = ":A";

/// Prefix of an error reply, followed by the numeric code
pub const ERROR_PREFIX: &str = ":N";

/// Command verbs understood by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Build configuration, `BU X`
    BuildX,
    /// Card configuration, used for joystick polarity
    Cca,
    /// Stop all motion
    Halt,
    /// Busy status
    Status,
    /// Status report
    RdStat,
    MoveRel,
    MoveAbs,
    Home,
    /// Set the current position
    Here,
    /// Report position
    Where,
    Backlash,
    Array,
    /// Array scan start position
    AHome,
    /// Load a ring buffer entry
    Load,
    /// Encoder counts per mm
    Cnts,
    /// Joystick
    J,
    JoystickSpeed,
    /// Ring buffer mode
    RbMode,
    Scan,
    /// Fast scan axis range
    ScanR,
    /// Slow scan axis range
    ScanV,
    SetHome,
    /// Lower travel limit
    SetLow,
    /// Upper travel limit
    SetUp,
    Speed,
    Ttl,
    /// Axis control mode
    Pm,
    /// Piezo card information
    PzInfo,
    /// Axis id
    Z2B,
    Info,
}

impl Command {
    /// Every verb, for reverse lookup
    pub const ALL: &'static [Command] = &[
        Command::BuildX,
        Command::Cca,
        Command::Halt,
        Command::Status,
        Command::RdStat,
        Command::MoveRel,
        Command::MoveAbs,
        Command::Home,
        Command::Here,
        Command::Where,
        Command::Backlash,
        Command::Array,
        Command::AHome,
        Command::Load,
        Command::Cnts,
        Command::J,
        Command::JoystickSpeed,
        Command::RbMode,
        Command::Scan,
        Command::ScanR,
        Command::ScanV,
        Command::SetHome,
        Command::SetLow,
        Command::SetUp,
        Command::Speed,
        Command::Ttl,
        Command::Pm,
        Command::PzInfo,
        Command::Z2B,
        Command::Info,
    ];

    /// Look up a verb token, case-insensitively
    pub fn from_verb(verb: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(verb))
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Command::BuildX => "BU X",
            Command::Cca => "CCA",
            Command::Halt => "\\",
            Command::Status => "/",
            Command::RdStat => "RS",
            Command::MoveRel => "R",
            Command::MoveAbs => "M",
            Command::Home => "!",
            Command::Here => "H",
            Command::Where => "W",
            Command::Backlash => "B",
            Command::Array => "AR",
            Command::AHome => "AH",
            Command::Load => "LD",
            Command::Cnts => "CNTS",
            Command::J => "J",
            Command::JoystickSpeed => "JS",
            Command::RbMode => "RM",
            Command::Scan => "SCAN",
            Command::ScanR => "SCANR",
            Command::ScanV => "SCANV",
            Command::SetHome => "HM",
            Command::SetLow => "SL",
            Command::SetUp => "SU",
            Command::Speed => "S",
            Command::Ttl => "TTL",
            Command::Pm => "PM",
            Command::PzInfo => "PZINFO",
            Command::Z2B => "Z2B",
            Command::Info => "INFO",
        }
    }

    /// Marker meaning "the current value" for commands that accept one
    pub const fn current_value_marker(self) -> Option<char> {
        match self {
            Command::SetHome | Command::SetLow | Command::SetUp => Some('+'),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Joystick inputs an axis can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoystickInput {
    None,
    Default,
    JoystickX,
    JoystickY,
    ControlKnob,
    XWheel,
    YWheel,
    AdcCh1,
    Footswitch,
    JxXWheelCombo,
    JyYWheelCombo,
    CriffKnob,
    ZWheel,
    FWheel,
}

impl JoystickInput {
    pub const fn code(self) -> u8 {
        match self {
            JoystickInput::None => 0,
            JoystickInput::Default => 1,
            JoystickInput::JoystickX => 2,
            JoystickInput::JoystickY => 3,
            JoystickInput::ControlKnob => 4,
            JoystickInput::XWheel => 5,
            JoystickInput::YWheel => 6,
            JoystickInput::AdcCh1 => 7,
            JoystickInput::Footswitch => 8,
            JoystickInput::JxXWheelCombo => 9,
            JoystickInput::JyYWheelCombo => 10,
            JoystickInput::CriffKnob => 11,
            JoystickInput::ZWheel => 22,
            JoystickInput::FWheel => 23,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let input = match code {
            0 => JoystickInput::None,
            1 => JoystickInput::Default,
            2 => JoystickInput::JoystickX,
            3 => JoystickInput::JoystickY,
            4 => JoystickInput::ControlKnob,
            5 => JoystickInput::XWheel,
            6 => JoystickInput::YWheel,
            7 => JoystickInput::AdcCh1,
            8 => JoystickInput::Footswitch,
            9 => JoystickInput::JxXWheelCombo,
            10 => JoystickInput::JyYWheelCombo,
            11 => JoystickInput::CriffKnob,
            22 => JoystickInput::ZWheel,
            23 => JoystickInput::FWheel,
            _ => return None,
        };
        Some(input)
    }
}

/// Joystick direction. The numeric value feeds the `CCA Z=` computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoystickPolarity {
    Inverted,
    Default,
}

impl JoystickPolarity {
    pub const fn code(self) -> u8 {
        match self {
            JoystickPolarity::Inverted => 0,
            JoystickPolarity::Default => 1,
        }
    }
}

/// `CCA Z=` base value for reversing the first axis of a card
pub const CCA_POLARITY_BASE: u8 = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RingBufferMode {
    #[default]
    Ttl,
    OneShot,
    Repeating,
}

impl RingBufferMode {
    pub const fn code(self) -> u8 {
        match self {
            RingBufferMode::Ttl => 0,
            RingBufferMode::OneShot => 1,
            RingBufferMode::Repeating => 2,
        }
    }
}

/// Behaviour of the TTL `IN0` input pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TtlIn0Mode {
    Off,
    MoveToNextAbsPosition,
    RepeatLastRelMove,
    Autofocus,
    ZStackEnable,
    PositionReporting,
    InterruptEnabled,
    ArrayModeMoveToNextPosition,
    In0LockToggle,
    Out0ToggleState,
    ServolockMode,
    MoveToNextRelPosition,
    SingleAxisFunction,
}

impl TtlIn0Mode {
    pub const fn code(self) -> u8 {
        match self {
            TtlIn0Mode::Off => 0,
            TtlIn0Mode::MoveToNextAbsPosition => 1,
            TtlIn0Mode::RepeatLastRelMove => 2,
            TtlIn0Mode::Autofocus => 3,
            TtlIn0Mode::ZStackEnable => 4,
            TtlIn0Mode::PositionReporting => 5,
            TtlIn0Mode::InterruptEnabled => 6,
            TtlIn0Mode::ArrayModeMoveToNextPosition => 7,
            TtlIn0Mode::In0LockToggle => 9,
            TtlIn0Mode::Out0ToggleState => 10,
            TtlIn0Mode::ServolockMode => 11,
            TtlIn0Mode::MoveToNextRelPosition => 12,
            TtlIn0Mode::SingleAxisFunction => 30,
        }
    }
}

/// Behaviour of the TTL `OUT0` output pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TtlOut0Mode {
    AlwaysLow,
    AlwaysHigh,
    PulseAfterMoving,
}

impl TtlOut0Mode {
    pub const fn code(self) -> u8 {
        match self {
            TtlOut0Mode::AlwaysLow => 0,
            TtlOut0Mode::AlwaysHigh => 1,
            TtlOut0Mode::PulseAfterMoving => 2,
        }
    }
}

/// Arguments of the `TTL` command. Unset fields keep their previous value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TtlPinModes {
    pub in0_mode: Option<TtlIn0Mode>,
    pub out0_mode: Option<TtlOut0Mode>,
    /// Output goes low when asserted
    pub reverse_output_polarity: bool,
    pub aux_io_state: Option<i64>,
    pub aux_io_mask: Option<i64>,
    pub aux_io_mode: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    Start,
    Stop,
}

impl ScanState {
    pub const fn as_str(self) -> &'static str {
        match self {
            ScanState::Start => "S",
            ScanState::Stop => "P",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScanPattern {
    #[default]
    Raster,
    Serpentine,
}

impl ScanPattern {
    pub const fn code(self) -> u8 {
        match self {
            ScanPattern::Raster => 0,
            ScanPattern::Serpentine => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MicroMirrorControlMode {
    InternalInput,
    ExternalInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PiezoControlMode {
    InternalClosedLoop,
    ExternalClosedLoop,
    InternalOpenLoop,
    ExternalOpenLoop,
    Fast,
    Slow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunableLensControlMode {
    Tg1000InputNoTempCompensation,
    ExternalInputNoTempCompensation,
    Tg1000InputWithTempCompensation,
}

impl TunableLensControlMode {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(Self::Tg1000InputNoTempCompensation),
            "1" => Some(Self::ExternalInputNoTempCompensation),
            "2" => Some(Self::Tg1000InputWithTempCompensation),
            _ => None,
        }
    }
}

/// Value of the `PM` command for one axis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    MicroMirror(MicroMirrorControlMode),
    Piezo(PiezoControlMode),
    TunableLens(TunableLensControlMode),
    /// A code passed through verbatim
    Raw(String),
}

impl ControlMode {
    pub fn code(&self) -> &str {
        match self {
            ControlMode::MicroMirror(MicroMirrorControlMode::InternalInput) => "0",
            ControlMode::MicroMirror(MicroMirrorControlMode::ExternalInput) => "1",
            ControlMode::Piezo(mode) => match mode {
                PiezoControlMode::InternalClosedLoop => "0",
                PiezoControlMode::ExternalClosedLoop => "1",
                PiezoControlMode::InternalOpenLoop => "2",
                PiezoControlMode::ExternalOpenLoop => "3",
                PiezoControlMode::Fast => "+",
                PiezoControlMode::Slow => "-",
            },
            ControlMode::TunableLens(mode) => match mode {
                TunableLensControlMode::Tg1000InputNoTempCompensation => "0",
                TunableLensControlMode::ExternalInputNoTempCompensation => "1",
                TunableLensControlMode::Tg1000InputWithTempCompensation => "2",
            },
            ControlMode::Raw(code) => code.as_str(),
        }
    }
}

impl From<MicroMirrorControlMode> for ControlMode {
    fn from(mode: MicroMirrorControlMode) -> Self {
        ControlMode::MicroMirror(mode)
    }
}

impl From<PiezoControlMode> for ControlMode {
    fn from(mode: PiezoControlMode) -> Self {
        ControlMode::Piezo(mode)
    }
}

impl From<TunableLensControlMode> for ControlMode {
    fn from(mode: TunableLensControlMode) -> Self {
        ControlMode::TunableLens(mode)
    }
}

impl From<&str> for ControlMode {
    fn from(code: &str) -> Self {
        ControlMode::Raw(code.to_string())
    }
}

impl From<i64> for ControlMode {
    fn from(code: i64) -> Self {
        ControlMode::Raw(code.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joystick_codes_round_trip() {
        for code in [0u8, 1, 4, 11, 22, 23] {
            let input = JoystickInput::from_code(code).unwrap();
            assert_eq!(input.code(), code);
        }
        assert_eq!(JoystickInput::from_code(12), None);
    }

    #[test]
    fn test_control_mode_codes() {
        assert_eq!(ControlMode::from(PiezoControlMode::Fast).code(), "+");
        assert_eq!(
            ControlMode::from(TunableLensControlMode::Tg1000InputWithTempCompensation).code(),
            "2"
        );
        assert_eq!(ControlMode::from(3).code(), "3");
    }

    #[test]
    fn test_command_tokens() {
        assert_eq!(Command::Halt.as_str(), "\\");
        assert_eq!(Command::SetLow.current_value_marker(), Some('+'));
        assert_eq!(Command::MoveAbs.current_value_marker(), None);
        assert_eq!(Command::from_verb("scanr"), Some(Command::ScanR));
        assert_eq!(Command::from_verb("BU X"), Some(Command::BuildX));
        assert_eq!(Command::from_verb("XYZ"), None);
    }
}
