//! Simulated Tiger controller
//!
//! [`SimulatedTiger`] is an in-memory device that speaks the Tiger line
//! protocol. It sits behind the [`Transport`] trait, so a
//! [`SimTigerController`] runs exactly the same validation and encoding as the
//! hardware driver; only the far end of the wire is different.

use super::command_creator::format_number;
use super::controller::TigerController;
use super::device_codes::{Command, JoystickInput, ACK};
use crate::communication::{SendOptions, SkippedReply, Transport};
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};
use tigerbox_core::data::{AXIS_TYPES_KEY, HEX_ADDR_KEY, MOTOR_AXES_KEY};
use tigerbox_core::units::{mm_to_stage_units, stage_units_to_mm, DEFAULT_SPEED_MM_PER_SEC};
use tigerbox_core::{Axis, BuildConfig, CardAddress, Result};

/// Axes of the default simulated build
pub const DEFAULT_SIM_AXES: [&str; 5] = ["X", "Y", "Z", "M", "N"];

/// Encoder resolution reported for every axis
pub const SIM_ENCODER_TICKS_PER_MM: f64 = 181590.4;

/// Lens temperature reported by `PZINFO`
pub const SIM_ETL_TEMPERATURE: f64 = 23.15;

/// Travel limits reported when none have been set
pub const SIM_DEFAULT_LOWER_LIMIT_MM: f64 = -110.0;
pub const SIM_DEFAULT_UPPER_LIMIT_MM: f64 = 110.0;

/// Backlash reported when none has been set
pub const SIM_DEFAULT_BACKLASH_MM: f64 = 0.04;

const UNKNOWN_COMMAND: &str = ":N-1";
const UNKNOWN_AXIS: &str = ":N-2";
const MISSING_PARAMETERS: &str = ":N-3";
const INVALID_CARD: &str = ":N-7";

/// Tracked state of one simulated axis
#[derive(Debug, Clone, PartialEq)]
pub struct SimAxisState {
    /// Stage units
    pub position: f64,
    /// mm/s
    pub speed: f64,
    pub home_mm: Option<f64>,
    pub lower_limit_mm: Option<f64>,
    pub upper_limit_mm: Option<f64>,
    pub backlash_mm: f64,
    /// `None` while joystick control is disabled
    pub joystick: Option<JoystickInput>,
    pub control_mode: String,
}

impl Default for SimAxisState {
    fn default() -> Self {
        Self {
            position: 0.0,
            speed: DEFAULT_SPEED_MM_PER_SEC,
            home_mm: None,
            lower_limit_mm: None,
            upper_limit_mm: None,
            backlash_mm: SIM_DEFAULT_BACKLASH_MM,
            joystick: Some(JoystickInput::Default),
            control_mode: "0".to_string(),
        }
    }
}

/// One operand of a received line
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    /// `X`
    Flag(char),
    /// `X=12`, `X=+`
    Assign(char, String),
    /// `X?`
    Query(char),
    /// `X+`, `X-`
    Suffix(char, char),
}

fn parse_operand(token: &str) -> Option<Operand> {
    let mut chars = token.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if !letter.is_ascii_alphabetic() {
        return None;
    }
    let rest = chars.as_str();
    match rest {
        "" => Some(Operand::Flag(letter)),
        "?" => Some(Operand::Query(letter)),
        "+" => Some(Operand::Suffix(letter, '+')),
        "-" => Some(Operand::Suffix(letter, '-')),
        _ => rest
            .strip_prefix('=')
            .map(|value| Operand::Assign(letter, value.to_string())),
    }
}

/// Which of an axis' stored mm settings a command touches
#[derive(Debug, Clone, Copy)]
enum Setting {
    Home,
    Lower,
    Upper,
}

/// In-memory Tiger device
#[derive(Debug, Clone)]
pub struct SimulatedTiger {
    config: BuildConfig,
    axes: BTreeMap<Axis, SimAxisState>,
    enforce_limits: bool,
    ttl: BTreeMap<CardAddress, BTreeMap<char, f64>>,
    ttl_output: bool,
    sent_commands: Vec<String>,
    pending_replies: VecDeque<(String, String)>,
    skipped_replies: Vec<SkippedReply>,
    last_send: Option<Instant>,
}

impl SimulatedTiger {
    pub fn new(config: BuildConfig) -> Self {
        let axes = config
            .axes()
            .iter()
            .map(|axis| (*axis, SimAxisState::default()))
            .collect();
        Self {
            config,
            axes,
            enforce_limits: false,
            ttl: BTreeMap::new(),
            ttl_output: false,
            sent_commands: Vec::new(),
            pending_replies: VecDeque::new(),
            skipped_replies: Vec::new(),
            last_send: None,
        }
    }

    pub fn with_limits_enforced(mut self, enforce: bool) -> Self {
        self.enforce_limits = enforce;
        self
    }

    pub fn limits_enforced(&self) -> bool {
        self.enforce_limits
    }

    pub fn set_limits_enforced(&mut self, enforce: bool) {
        self.enforce_limits = enforce;
    }

    /// Every line received, oldest first, without terminators
    pub fn sent_commands(&self) -> &[String] {
        &self.sent_commands
    }

    pub fn clear_sent_commands(&mut self) {
        self.sent_commands.clear();
    }

    pub fn axis_state(&self, axis: Axis) -> Option<&SimAxisState> {
        self.axes.get(&axis)
    }

    /// Set the level reported by a bare `TTL` query
    pub fn set_ttl_output(&mut self, high: bool) {
        self.ttl_output = high;
    }

    /// Execute one line and produce the reply the controller would send
    pub fn respond(&mut self, line: &str) -> String {
        let line = line.trim();
        let split = line
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(line.len());
        let (address, rest) = line.split_at(split);
        let address = (!address.is_empty()).then(|| CardAddress::new(address));

        if let Some(card) = &address {
            if !self.config.cards().contains(card) {
                return INVALID_CARD.to_string();
            }
        }

        let (verb, operands) = if rest.to_ascii_uppercase().starts_with(Command::BuildX.as_str()) {
            (Command::BuildX.as_str(), "")
        } else {
            rest.split_once(' ').unwrap_or((rest, ""))
        };
        let Some(command) = Command::from_verb(verb) else {
            return UNKNOWN_COMMAND.to_string();
        };

        let mut parsed = Vec::new();
        for token in operands.split_whitespace() {
            match parse_operand(token) {
                Some(operand) => parsed.push(operand),
                None => return MISSING_PARAMETERS.to_string(),
            }
        }

        self.execute(command, address.as_ref(), &parsed)
    }

    fn execute(&mut self, command: Command, address: Option<&CardAddress>, operands: &[Operand]) -> String {
        match command {
            Command::BuildX => match address {
                Some(card) => self.config.card_modules(card).join("\r"),
                None => self.render_build_config(),
            },
            Command::Status => "N".to_string(),
            Command::MoveAbs | Command::MoveRel | Command::Here => {
                self.update_positions(command, operands)
            }
            Command::Home => self.for_each_axis(operands, |state, _| {
                state.position = mm_to_stage_units(state.home_mm.unwrap_or(0.0));
            }),
            Command::Where => {
                let mut values = Vec::new();
                for operand in operands {
                    let Operand::Flag(letter) = operand else {
                        return MISSING_PARAMETERS.to_string();
                    };
                    match self.state(*letter) {
                        Some((_, state)) => values.push(format_number(state.position)),
                        None => return UNKNOWN_AXIS.to_string(),
                    }
                }
                format!("{ACK} {}", values.join(" "))
            }
            Command::SetHome => self.update_setting(Setting::Home, operands),
            Command::SetLow => self.update_setting(Setting::Lower, operands),
            Command::SetUp => self.update_setting(Setting::Upper, operands),
            Command::Speed => self.axis_values(operands, |state| state.speed, |state, v| {
                state.speed = v;
            }),
            Command::Backlash => self.axis_values(
                operands,
                |state| state.backlash_mm,
                |state, v| state.backlash_mm = v,
            ),
            Command::Cnts => self.axis_values(operands, |_| SIM_ENCODER_TICKS_PER_MM, |_, _| {}),
            Command::Z2B => self.report_axis_ids(operands),
            Command::J => self.update_joystick(operands),
            Command::Pm => self.update_control_mode(operands),
            Command::PzInfo => format!("V Mode[IN],Tc[{SIM_ETL_TEMPERATURE}],TCOMP[ON]"),
            Command::Info => match operands.first() {
                Some(Operand::Flag(letter)) => self.render_info(*letter),
                _ => MISSING_PARAMETERS.to_string(),
            },
            Command::Ttl => self.update_ttl(address, operands),
            Command::Halt
            | Command::RdStat
            | Command::Cca
            | Command::Array
            | Command::AHome
            | Command::Load
            | Command::JoystickSpeed
            | Command::RbMode
            | Command::Scan
            | Command::ScanR
            | Command::ScanV => ACK.to_string(),
        }
    }

    fn state(&mut self, letter: char) -> Option<(Axis, &mut SimAxisState)> {
        let axis = Axis::new(letter).ok()?;
        self.axes.get_mut(&axis).map(|state| (axis, state))
    }

    /// Apply `apply` to every flagged axis
    fn for_each_axis(
        &mut self,
        operands: &[Operand],
        mut apply: impl FnMut(&mut SimAxisState, Axis),
    ) -> String {
        for operand in operands {
            let Operand::Flag(letter) = operand else {
                return MISSING_PARAMETERS.to_string();
            };
            match self.state(*letter) {
                Some((axis, state)) => apply(state, axis),
                None => return UNKNOWN_AXIS.to_string(),
            }
        }
        ACK.to_string()
    }

    fn update_positions(&mut self, command: Command, operands: &[Operand]) -> String {
        let enforce = self.enforce_limits;
        for operand in operands {
            let Operand::Assign(letter, value) = operand else {
                return MISSING_PARAMETERS.to_string();
            };
            let Ok(value) = value.parse::<f64>() else {
                return MISSING_PARAMETERS.to_string();
            };
            let Some((_, state)) = self.state(*letter) else {
                return UNKNOWN_AXIS.to_string();
            };
            let target = match command {
                Command::MoveRel => state.position + value,
                _ => value,
            };
            state.position = if enforce && command != Command::Here {
                clamp_to_limits(state, target)
            } else {
                target
            };
        }
        ACK.to_string()
    }

    fn update_setting(&mut self, setting: Setting, operands: &[Operand]) -> String {
        let mut queried = Vec::new();
        for operand in operands {
            let letter = match operand {
                Operand::Flag(l) | Operand::Assign(l, _) | Operand::Query(l) | Operand::Suffix(l, _) => *l,
            };
            let Some((axis, state)) = self.state(letter) else {
                return UNKNOWN_AXIS.to_string();
            };
            let current_mm = stage_units_to_mm(state.position);
            let slot = match setting {
                Setting::Home => &mut state.home_mm,
                Setting::Lower => &mut state.lower_limit_mm,
                Setting::Upper => &mut state.upper_limit_mm,
            };
            match operand {
                Operand::Suffix(_, '+') | Operand::Flag(_) => *slot = Some(current_mm),
                Operand::Suffix(_, _) => *slot = None,
                Operand::Assign(_, value) => match value.parse::<f64>() {
                    Ok(v) => *slot = Some(v),
                    Err(_) => return MISSING_PARAMETERS.to_string(),
                },
                Operand::Query(_) => {
                    let value = slot.unwrap_or(match setting {
                        Setting::Home => 0.0,
                        Setting::Lower => SIM_DEFAULT_LOWER_LIMIT_MM,
                        Setting::Upper => SIM_DEFAULT_UPPER_LIMIT_MM,
                    });
                    queried.push(format!("{axis}={}", format_number(value)));
                }
            }
        }
        ack_with(&queried)
    }

    /// Handle `CMD X=v` and `CMD X?` for one numeric per-axis value
    fn axis_values(
        &mut self,
        operands: &[Operand],
        get: impl Fn(&SimAxisState) -> f64,
        mut set: impl FnMut(&mut SimAxisState, f64),
    ) -> String {
        let mut queried = Vec::new();
        for operand in operands {
            match operand {
                Operand::Query(letter) => match self.state(*letter) {
                    Some((axis, state)) => {
                        queried.push(format!("{axis}={}", format_number(get(state))))
                    }
                    None => return UNKNOWN_AXIS.to_string(),
                },
                Operand::Assign(letter, value) => {
                    let Ok(value) = value.parse::<f64>() else {
                        return MISSING_PARAMETERS.to_string();
                    };
                    match self.state(*letter) {
                        Some((_, state)) => set(state, value),
                        None => return UNKNOWN_AXIS.to_string(),
                    }
                }
                _ => return MISSING_PARAMETERS.to_string(),
            }
        }
        ack_with(&queried)
    }

    /// `Z2B X?` reports the axis position in the build
    fn report_axis_ids(&self, operands: &[Operand]) -> String {
        let mut queried = Vec::new();
        for operand in operands {
            let Operand::Query(letter) = operand else {
                return MISSING_PARAMETERS.to_string();
            };
            let index = Axis::new(*letter)
                .ok()
                .and_then(|axis| self.config.hardware_index(axis));
            match index {
                Some(index) => queried.push(format!("{letter}={index}")),
                None => return UNKNOWN_AXIS.to_string(),
            }
        }
        ack_with(&queried)
    }

    fn update_joystick(&mut self, operands: &[Operand]) -> String {
        let mut queried = Vec::new();
        for operand in operands {
            let letter = match operand {
                Operand::Flag(l) | Operand::Assign(l, _) | Operand::Query(l) | Operand::Suffix(l, _) => *l,
            };
            let Some((axis, state)) = self.state(letter) else {
                return UNKNOWN_AXIS.to_string();
            };
            match operand {
                Operand::Suffix(_, '+') => state.joystick = Some(JoystickInput::Default),
                Operand::Suffix(_, _) => state.joystick = None,
                Operand::Assign(_, value) => {
                    match value.parse::<u8>().ok().and_then(JoystickInput::from_code) {
                        Some(input) => state.joystick = Some(input),
                        None => return MISSING_PARAMETERS.to_string(),
                    }
                }
                Operand::Query(_) => {
                    let code = state.joystick.unwrap_or(JoystickInput::None).code();
                    queried.push(format!("{axis}={code}"));
                }
                Operand::Flag(_) => return MISSING_PARAMETERS.to_string(),
            }
        }
        ack_with(&queried)
    }

    fn update_control_mode(&mut self, operands: &[Operand]) -> String {
        let mut queried = Vec::new();
        for operand in operands {
            match operand {
                Operand::Assign(letter, value) => match self.state(*letter) {
                    Some((_, state)) => state.control_mode = value.clone(),
                    None => return UNKNOWN_AXIS.to_string(),
                },
                Operand::Query(letter) => match self.state(*letter) {
                    Some((axis, state)) => queried.push(format!("{axis}={}", state.control_mode)),
                    None => return UNKNOWN_AXIS.to_string(),
                },
                _ => return MISSING_PARAMETERS.to_string(),
            }
        }
        ack_with(&queried)
    }

    fn update_ttl(&mut self, address: Option<&CardAddress>, operands: &[Operand]) -> String {
        let Some(card) = address else {
            return format!("{ACK} {}", u8::from(self.ttl_output));
        };
        let params = self.ttl.entry(card.clone()).or_default();
        let mut queried = Vec::new();
        for operand in operands {
            match operand {
                Operand::Assign(letter, value) => match value.parse::<f64>() {
                    Ok(v) => {
                        params.insert(*letter, v);
                    }
                    Err(_) => return MISSING_PARAMETERS.to_string(),
                },
                Operand::Query(letter) => {
                    let value = params.get(letter).copied().unwrap_or(0.0);
                    queried.push(format!("{letter}={}", format_number(value)));
                }
                _ => return MISSING_PARAMETERS.to_string(),
            }
        }
        ack_with(&queried)
    }

    fn render_build_config(&self) -> String {
        let axes = self.config.axes();
        let names: Vec<String> = axes.iter().map(|a| a.to_string()).collect();
        let types: Vec<String> = axes
            .iter()
            .map(|a| self.config.axis_type(*a).unwrap_or('x').to_string())
            .collect();
        let addrs: Vec<String> = axes
            .iter()
            .map(|a| {
                self.config
                    .card(*a)
                    .map(|c| c.address.to_string())
                    .unwrap_or_default()
            })
            .collect();
        [
            format!("{MOTOR_AXES_KEY}: {}", names.join(" ")),
            format!("{AXIS_TYPES_KEY}: {}", types.join(" ")),
            format!("{HEX_ADDR_KEY}: {}", addrs.join(" ")),
        ]
        .join("\r")
    }

    fn render_info(&self, letter: char) -> String {
        let Ok(axis) = Axis::new(letter) else {
            return UNKNOWN_AXIS.to_string();
        };
        let Some(state) = self.axes.get(&axis) else {
            return UNKNOWN_AXIS.to_string();
        };
        let card = self
            .config
            .card(axis)
            .map(|c| c.address.to_string())
            .unwrap_or_default();
        let rows = [
            (
                format!("Axis Name : {axis}"),
                format!("Axis Type : {}", self.config.axis_type(axis).unwrap_or('x')),
            ),
            (
                format!("Card Addr : {card}"),
                format!("Backlash : {}", format_number(state.backlash_mm)),
            ),
            (
                format!("Max Speed : {}", format_number(state.speed)),
                format!("Ctrl Mode : {}", state.control_mode),
            ),
        ];
        rows.iter()
            .map(|(left, right)| format!("{left:<33}{right}"))
            .collect::<Vec<_>>()
            .join("\r")
    }
}

/// Unset limits fall back to the same defaults the limit queries report
fn clamp_to_limits(state: &SimAxisState, target: f64) -> f64 {
    let lower = state.lower_limit_mm.unwrap_or(SIM_DEFAULT_LOWER_LIMIT_MM);
    let upper = state.upper_limit_mm.unwrap_or(SIM_DEFAULT_UPPER_LIMIT_MM);
    target
        .max(mm_to_stage_units(lower))
        .min(mm_to_stage_units(upper))
}

fn ack_with(values: &[String]) -> String {
    if values.is_empty() {
        ACK.to_string()
    } else {
        format!("{ACK} {}", values.join(" "))
    }
}

impl Transport for SimulatedTiger {
    fn send(&mut self, line: &str, options: SendOptions) -> Result<Option<String>> {
        tracing::debug!("Simulated send: {:?}", line);
        self.sent_commands.push(line.to_string());
        self.last_send = Some(Instant::now());
        let reply = self.respond(line);

        if !options.wait_for_reply {
            self.pending_replies.push_back((line.to_string(), reply));
            return Ok(None);
        }

        while let Some((command, reply)) = self.pending_replies.pop_front() {
            self.skipped_replies.push(SkippedReply { command, reply });
        }
        tracing::debug!("Simulated reply: {:?}", reply);
        Ok(Some(reply))
    }

    fn take_skipped_replies(&mut self) -> Vec<SkippedReply> {
        std::mem::take(&mut self.skipped_replies)
    }

    fn clear_incoming(&mut self) -> Result<()> {
        self.pending_replies.clear();
        self.skipped_replies.clear();
        Ok(())
    }

    fn time_since_last_send(&self) -> Option<Duration> {
        self.last_send.map(|t| t.elapsed())
    }
}

/// Controller driving a [`SimulatedTiger`]
pub type SimTigerController = TigerController<SimulatedTiger>;

impl TigerController<SimulatedTiger> {
    /// Simulated controller with axes `X Y Z M N`
    pub fn simulated() -> Result<Self> {
        Self::with_build_config(BuildConfig::simulated(&DEFAULT_SIM_AXES)?)
    }

    /// Simulated controller with the given hardware layout
    pub fn with_build_config(config: BuildConfig) -> Result<Self> {
        let mut controller = TigerController::new(SimulatedTiger::new(config))?;
        controller.transport_mut().clear_sent_commands();
        Ok(controller)
    }

    pub fn with_limits_enforced(mut self, enforce: bool) -> Self {
        self.transport_mut().set_limits_enforced(enforce);
        self
    }

    /// Lines sent since construction, without terminators
    pub fn sent_commands(&self) -> &[String] {
        self.transport().sent_commands()
    }

    pub fn clear_sent_commands(&mut self) {
        self.transport_mut().clear_sent_commands();
    }
}
