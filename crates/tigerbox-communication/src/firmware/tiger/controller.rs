//! Tiger Controller Implementation
//!
//! Drives an ASI Tiger controller over any [`Transport`]. The build
//! configuration and per-card firmware modules are read once at construction;
//! every operation after that maps its axes, encodes one line, dispatches it
//! and decodes the reply.

use super::command_creator::{CommandCreator, CommandLine};
use super::device_codes::{
    Command, ControlMode, JoystickInput, JoystickPolarity, RingBufferMode, ScanPattern,
    ScanState, TtlIn0Mode, TtlPinModes, TunableLensControlMode, CCA_POLARITY_BASE,
};
use super::error_decoder::format_error;
use super::response_parser::{self as parser, Ack, Reply};
use crate::communication::serial::SerialTransport;
use crate::communication::{ConnectionParams, SendOptions, Transport};
use crate::firmware::controller_trait::{ArrayScanParams, ScanRParams, ScanVParams, StageController};
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;
use tigerbox_core::data::{ARRAY_MODULE, SCAN_MODULE, TUNABLE_LENS_TYPE};
use tigerbox_core::units::{round_deg, round_mm};
use tigerbox_core::{
    ArgumentError, Axis, AxisMapper, AxisValueSet, AxisValues, BuildConfig, CardAddress, Error,
    FirmwareError, Operation, ProtocolError, Result,
};

/// Minimum delay between the last command and a status poll
pub const REPLY_WAIT_TIME: Duration = Duration::from_millis(20);

/// Parameter letters reported by `TTL`
const TTL_PARAMS: [char; 6] = ['X', 'Y', 'Z', 'F', 'R', 'T'];

/// Card and fast axis recorded by `setup_scan`
#[derive(Debug, Clone, PartialEq)]
struct ScanContext {
    card: CardAddress,
    fast_axis: Axis,
}

/// Driver for an ASI Tiger controller
pub struct TigerController<T: Transport> {
    transport: T,
    creator: CommandCreator,
    config: BuildConfig,
    mapper: AxisMapper,
    scan: Option<ScanContext>,
    array_scan_card: Option<CardAddress>,
    /// Axes of the last relative move, for TTL repeat-move setup
    last_rel_move_axes: Vec<Axis>,
    /// Axes enabled for ring buffer moves
    ring_buffer_axes: Vec<Axis>,
    encoder_ticks: BTreeMap<Axis, f64>,
}

impl TigerController<SerialTransport> {
    /// Open the serial port and read the controller's configuration
    pub fn connect(params: &ConnectionParams) -> Result<Self> {
        let transport = SerialTransport::open(params)?;
        Self::new(transport)
    }
}

impl<T: Transport> TigerController<T> {
    /// Read the build configuration and card modules over `transport`
    pub fn new(transport: T) -> Result<Self> {
        let mut controller = Self {
            transport,
            creator: CommandCreator::new(),
            config: BuildConfig::default(),
            mapper: AxisMapper::from_axes(Vec::new()),
            scan: None,
            array_scan_card: None,
            last_rel_move_axes: Vec::new(),
            ring_buffer_axes: Vec::new(),
            encoder_ticks: BTreeMap::new(),
        };

        let line = controller.creator.bare(Command::BuildX).as_query();
        let reply = controller.query(&line)?;
        let mut config = parser::parse_build_config(&reply)?;

        for card in config.cards() {
            let line = controller
                .creator
                .bare(Command::BuildX)
                .as_query()
                .with_address(card.clone());
            let reply = controller.query(&line)?;
            config.set_card_modules(card, parser::parse_card_modules(&reply));
        }

        tracing::info!(
            "Tiger controller ready: axes {:?}, filter wheels {:?}",
            config.axes().iter().map(|a| a.letter()).collect::<String>(),
            config.filter_wheels()
        );
        controller.mapper = AxisMapper::new(&config);
        controller.config = config;
        Ok(controller)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Dispatch a raw line. Queries always wait for their reply.
    pub fn send_command(&mut self, line: &CommandLine, options: SendOptions) -> Result<Option<String>> {
        let mut options = options;
        if line.is_query() && !options.wait_for_reply {
            tracing::warn!("Ignoring non-blocking override for query {:?}", line.to_string());
            options = SendOptions::BLOCKING;
        }

        let text = line.to_string();
        let reply = self.transport.send(&text, options);

        for skipped in self.transport.take_skipped_replies() {
            parser::check_errors(&skipped.command, &skipped.reply)
                .map_err(|e| log_device_error(&skipped.command, e))?;
        }

        let reply = reply?;
        if let Some(reply) = &reply {
            parser::check_errors(&text, reply).map_err(|e| log_device_error(&text, e))?;
        }
        Ok(reply)
    }

    fn set(&mut self, line: &CommandLine, options: SendOptions) -> Result<Ack> {
        match self.send_command(line, options)? {
            Some(_) => Ok(Ack::Received),
            None => Ok(Ack::Pending),
        }
    }

    fn query(&mut self, line: &CommandLine) -> Result<String> {
        self.send_command(line, SendOptions::BLOCKING)?
            .ok_or_else(|| Error::other(format!("no reply to {:?}", line.to_string())))
    }

    fn query_line_values(&mut self, line: &CommandLine) -> Result<AxisValues> {
        let reply = self.query(line)?;
        match parser::parse_reply(&reply)? {
            Reply::Values(values) => Ok(values),
            Reply::Ack => Err(ProtocolError::malformed(
                format!("no values in reply to {:?}", line.to_string()),
                reply,
            )
            .into()),
        }
    }

    fn query_values(&mut self, command: Command, axes: &[Axis]) -> Result<AxisValues> {
        let line = self.creator.queries(command, axes);
        self.query_line_values(&line)
    }

    fn card_of(&self, axis: Axis) -> Result<CardAddress> {
        self.config
            .card(axis)
            .map(|c| c.address.clone())
            .ok_or_else(|| {
                ArgumentError::Invalid {
                    reason: format!("no card address known for axis '{axis}'"),
                }
                .into()
            })
    }

    fn require_modules(&self, card: &CardAddress, modules: &[&str]) -> Result<()> {
        let missing = self.config.missing_modules(card, modules);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(FirmwareError::MissingModules {
                card: card.to_string(),
                modules: missing,
            }
            .into())
        }
    }

    fn xy_card(&self, operation: &str) -> Result<CardAddress> {
        let xy = [Axis::new('X')?, Axis::new('Y')?];
        self.config.shared_card(&xy).ok_or_else(|| {
            ArgumentError::ValueNotPermitted {
                operation: operation.to_string(),
                reason: "cannot infer the X/Y card address; specify it explicitly".to_string(),
            }
            .into()
        })
    }

    fn set_mixed(
        &mut self,
        op: Operation,
        command: Command,
        current: &[&str],
        explicit: &[(&str, f64)],
        round: bool,
        options: SendOptions,
    ) -> Result<Ack> {
        let mut set = self.mapper.resolve_mixed(op, current, explicit)?;
        if round {
            let mut rounded = AxisValueSet::new();
            for (axis, value) in set.iter() {
                rounded.insert(*axis, value.map(round_mm))?;
            }
            set = rounded;
        }
        let line = self.creator.with_current(command, &set);
        self.set(&line, options)
    }

    fn reset(&mut self, op: Operation, command: Command, axes: &[&str], options: SendOptions) -> Result<Ack> {
        let axes = self.mapper.resolve(op, axes)?;
        let line = self.creator.resets(command, &axes);
        self.set(&line, options)
    }

    fn assign(
        &mut self,
        op: Operation,
        command: Command,
        axes: &[(&str, f64)],
        options: SendOptions,
    ) -> Result<(Vec<Axis>, Ack)> {
        let values = self.mapper.resolve_values(op, axes)?;
        let line = self.creator.assignments(command, &values);
        let ack = self.set(&line, options)?;
        Ok((values.into_iter().map(|(a, _)| a).collect(), ack))
    }

    fn encoder_ticks_per_mm(&mut self, axis: Axis) -> Result<f64> {
        if let Some(ticks) = self.encoder_ticks.get(&axis) {
            return Ok(*ticks);
        }
        let line = self.creator.queries(Command::Cnts, &[axis]);
        let reply = self.query(&line)?;
        let ticks = parser::parse_assigned_value(&reply)?;
        self.encoder_ticks.insert(axis, ticks);
        Ok(ticks)
    }

    fn axis_id(&mut self, axis: Axis) -> Result<u32> {
        let line = self.creator.queries(Command::Z2B, &[axis]);
        let reply = self.query(&line)?;
        let id = parser::parse_assigned_value(&reply)?;
        if id < 0.0 || id.fract() != 0.0 {
            return Err(ProtocolError::malformed("axis id is not a whole number", reply).into());
        }
        Ok(id as u32)
    }

    fn control_mode(&mut self, axis: Axis) -> Result<String> {
        let values = self.query_values(Command::Pm, &[axis])?;
        let value = values
            .get(&axis)
            .ok_or_else(|| ProtocolError::malformed(format!("no mode for axis {axis}"), ""))?;
        Ok(format!("{}", value.trunc() as i64))
    }

    fn scan_context(&self) -> Result<ScanContext> {
        self.scan.clone().ok_or_else(|| {
            ArgumentError::InvalidSequence {
                reason: "setup_scan must be run first".to_string(),
            }
            .into()
        })
    }

    fn send_ttl(
        &mut self,
        cards: &[CardAddress],
        params: &[(char, f64)],
        options: SendOptions,
    ) -> Result<Ack> {
        let mut ack = Ack::Received;
        for card in cards {
            let line = self
                .creator
                .params(Command::Ttl, params)
                .with_address(card.clone());
            ack = self.set(&line, options)?;
        }
        Ok(ack)
    }
}

impl<T: Transport> StageController for TigerController<T> {
    fn build_config(&self) -> &BuildConfig {
        &self.config
    }

    fn halt(&mut self, options: SendOptions) -> Result<Ack> {
        let line = self.creator.bare(Command::Halt);
        self.set(&line, options)
    }

    fn move_relative(&mut self, axes: &[(&str, f64)], options: SendOptions) -> Result<Ack> {
        let (moved, ack) = self.assign(Operation::MoveRelative, Command::MoveRel, axes, options)?;
        self.last_rel_move_axes = moved;
        Ok(ack)
    }

    fn move_absolute(&mut self, axes: &[(&str, f64)], options: SendOptions) -> Result<Ack> {
        let (_, ack) = self.assign(Operation::MoveAbsolute, Command::MoveAbs, axes, options)?;
        Ok(ack)
    }

    fn home(&mut self, axes: &[&str], options: SendOptions) -> Result<Ack> {
        let axes = self.mapper.resolve(Operation::Home, axes)?;
        let line = self.creator.flags(Command::Home, &axes);
        self.set(&line, options)
    }

    fn set_home(
        &mut self,
        current: &[&str],
        explicit: &[(&str, f64)],
        options: SendOptions,
    ) -> Result<Ack> {
        self.set_mixed(Operation::SetHome, Command::SetHome, current, explicit, false, options)
    }

    fn reset_home(&mut self, axes: &[&str], options: SendOptions) -> Result<Ack> {
        self.reset(Operation::ResetHome, Command::SetHome, axes, options)
    }

    fn get_home(&mut self, axes: &[&str]) -> Result<AxisValues> {
        let axes = self.mapper.resolve(Operation::GetHome, axes)?;
        self.query_values(Command::SetHome, &axes)
    }

    fn zero_in_place(&mut self, axes: &[&str], options: SendOptions) -> Result<Ack> {
        let axes = self.mapper.resolve(Operation::ZeroInPlace, axes)?;
        let zeros: Vec<(Axis, f64)> = axes.into_iter().map(|a| (a, 0.0)).collect();
        let line = self.creator.assignments(Command::Here, &zeros);
        self.set(&line, options)
    }

    fn set_position(&mut self, axes: &[(&str, f64)], options: SendOptions) -> Result<Ack> {
        let (_, ack) = self.assign(Operation::SetPosition, Command::Here, axes, options)?;
        Ok(ack)
    }

    fn get_position(&mut self, axes: &[&str]) -> Result<AxisValues> {
        let axes = self.mapper.resolve(Operation::GetPosition, axes)?;
        let line = self.creator.flags(Command::Where, &axes).as_query();
        let reply = self.query(&line)?;
        Ok(parser::parse_positions(&reply, &axes)?)
    }

    fn set_lower_travel_limit(
        &mut self,
        current: &[&str],
        explicit: &[(&str, f64)],
        options: SendOptions,
    ) -> Result<Ack> {
        self.set_mixed(Operation::SetLowerLimit, Command::SetLow, current, explicit, true, options)
    }

    fn get_lower_travel_limit(&mut self, axes: &[&str]) -> Result<AxisValues> {
        let axes = self.mapper.resolve(Operation::GetLowerLimit, axes)?;
        self.query_values(Command::SetLow, &axes)
    }

    fn reset_lower_travel_limits(&mut self, axes: &[&str], options: SendOptions) -> Result<Ack> {
        self.reset(Operation::ResetLowerLimit, Command::SetLow, axes, options)
    }

    fn set_upper_travel_limit(
        &mut self,
        current: &[&str],
        explicit: &[(&str, f64)],
        options: SendOptions,
    ) -> Result<Ack> {
        self.set_mixed(Operation::SetUpperLimit, Command::SetUp, current, explicit, true, options)
    }

    fn get_upper_travel_limit(&mut self, axes: &[&str]) -> Result<AxisValues> {
        let axes = self.mapper.resolve(Operation::GetUpperLimit, axes)?;
        self.query_values(Command::SetUp, &axes)
    }

    fn reset_upper_travel_limits(&mut self, axes: &[&str], options: SendOptions) -> Result<Ack> {
        self.reset(Operation::ResetUpperLimit, Command::SetUp, axes, options)
    }

    fn set_speed(&mut self, axes: &[(&str, f64)], options: SendOptions) -> Result<Ack> {
        let values = self.mapper.resolve_values(Operation::SetSpeed, axes)?;
        let rounded: Vec<(Axis, f64)> = values.into_iter().map(|(a, v)| (a, round_mm(v))).collect();
        let line = self.creator.assignments(Command::Speed, &rounded);
        self.set(&line, options)
    }

    fn get_speed(&mut self, axes: &[&str]) -> Result<AxisValues> {
        let axes = self.mapper.resolve(Operation::GetSpeed, axes)?;
        self.query_values(Command::Speed, &axes)
    }

    fn set_axis_backlash(&mut self, axes: &[(&str, f64)], options: SendOptions) -> Result<Ack> {
        let (_, ack) = self.assign(Operation::SetBacklash, Command::Backlash, axes, options)?;
        Ok(ack)
    }

    fn get_axis_backlash(&mut self, axes: &[&str]) -> Result<AxisValues> {
        let axes = self.mapper.resolve(Operation::GetBacklash, axes)?;
        self.query_values(Command::Backlash, &axes)
    }

    fn get_encoder_ticks_per_mm(&mut self, axis: &str) -> Result<f64> {
        let axis = self.mapper.resolve_axis(axis)?;
        self.encoder_ticks_per_mm(axis)
    }

    fn bind_axis_to_joystick_input(&mut self, axes: &[(&str, JoystickInput)]) -> Result<Ack> {
        let bindings = self.mapper.resolve_with(Operation::BindJoystick, axes)?;
        let codes: Vec<(Axis, f64)> = bindings
            .into_iter()
            .map(|(a, input)| (a, f64::from(input.code())))
            .collect();
        let line = self.creator.assignments(Command::J, &codes);
        self.set(&line, SendOptions::BLOCKING)
    }

    fn get_joystick_axis_mapping(&mut self, axes: &[&str]) -> Result<BTreeMap<Axis, JoystickInput>> {
        let axes = self.mapper.resolve(Operation::GetJoystickMapping, axes)?;
        let values = self.query_values(Command::J, &axes)?;
        values
            .into_iter()
            .map(|(axis, value)| -> Result<(Axis, JoystickInput)> {
                let input = (0.0..=f64::from(u8::MAX))
                    .contains(&value)
                    .then(|| JoystickInput::from_code(value as u8))
                    .flatten()
                    .ok_or_else(|| {
                        ProtocolError::malformed(
                            format!("unknown joystick input {value}"),
                            format!("{axis}={value}"),
                        )
                    })?;
                Ok((axis, input))
            })
            .collect()
    }

    fn set_joystick_axis_polarity(&mut self, axes: &[(&str, JoystickPolarity)]) -> Result<Ack> {
        let settings = self.mapper.resolve_with(Operation::SetJoystickPolarity, axes)?;
        for (axis, polarity) in &settings {
            let card = self
                .config
                .card(*axis)
                .cloned()
                .ok_or_else(|| ArgumentError::Invalid {
                    reason: format!("no card address known for axis '{axis}'"),
                })?;
            let value = usize::from(CCA_POLARITY_BASE + polarity.code()) + card.index * 2;
            let line = self
                .creator
                .params(Command::Cca, &[('Z', value as f64)])
                .with_address(card.address);
            self.set(&line, SendOptions::BLOCKING)?;
        }
        // The new polarity only takes effect once the inputs are re-enabled.
        let states: Vec<(Axis, bool)> = settings.iter().map(|(a, _)| (*a, true)).collect();
        let line = self.creator.toggles(Command::J, &states);
        self.set(&line, SendOptions::BLOCKING)
    }

    fn enable_joystick_inputs(&mut self, axes: &[&str]) -> Result<Ack> {
        let axes = self.mapper.resolve(Operation::EnableJoystick, axes)?;
        let states: Vec<(Axis, bool)> = axes.into_iter().map(|a| (a, true)).collect();
        let line = self.creator.toggles(Command::J, &states);
        self.set(&line, SendOptions::BLOCKING)
    }

    fn disable_joystick_inputs(&mut self, axes: &[&str]) -> Result<Ack> {
        let axes = self.mapper.resolve(Operation::DisableJoystick, axes)?;
        let states: Vec<(Axis, bool)> = axes.into_iter().map(|a| (a, false)).collect();
        let line = self.creator.toggles(Command::J, &states);
        self.set(&line, SendOptions::BLOCKING)
    }

    fn setup_ring_buffer(
        &mut self,
        axes: &[&str],
        mode: RingBufferMode,
        options: SendOptions,
    ) -> Result<Ack> {
        let axes = self.mapper.resolve(Operation::SetupRingBuffer, axes)?;
        let mut axis_byte: u32 = 0;
        for axis in &axes {
            if let Some(offset) = self.config.hardware_index(*axis) {
                axis_byte |= 1 << offset;
            }
        }
        axis_byte &= 0xFFFF;
        self.ring_buffer_axes = axes;
        // X=0 clears the buffer
        let line = self.creator.params(
            Command::RbMode,
            &[('X', 0.0), ('Y', f64::from(axis_byte)), ('F', f64::from(mode.code()))],
        );
        self.set(&line, options)
    }

    fn queue_buffered_move(&mut self, axes: &[(&str, f64)], options: SendOptions) -> Result<Ack> {
        let (_, ack) = self.assign(Operation::QueueBufferedMove, Command::Load, axes, options)?;
        Ok(ack)
    }

    fn reset_ring_buffer(&mut self, options: SendOptions) -> Result<Ack> {
        let line = self.creator.params(Command::RbMode, &[('X', 0.0)]);
        let ack = self.set(&line, options)?;
        self.ring_buffer_axes.clear();
        Ok(ack)
    }

    fn setup_scan(
        &mut self,
        fast_axis: &str,
        slow_axis: &str,
        pattern: ScanPattern,
        options: SendOptions,
    ) -> Result<Ack> {
        let fast = self.mapper.resolve_axis(fast_axis)?;
        let slow = self.mapper.resolve_axis(slow_axis)?;
        let card = self.config.shared_card(&[fast, slow]).ok_or_else(|| {
            ArgumentError::ValueNotPermitted {
                operation: Operation::SetupScan.to_string(),
                reason: "fast and slow axes must be on the same card".to_string(),
            }
        })?;
        self.require_modules(&card, &[SCAN_MODULE])?;
        self.scan = Some(ScanContext {
            card: card.clone(),
            fast_axis: fast,
        });

        let fast_id = self.axis_id(fast)?;
        let slow_id = self.axis_id(slow)?;
        let line = self
            .creator
            .params(
                Command::Scan,
                &[
                    ('Y', f64::from(fast_id)),
                    ('Z', f64::from(slow_id)),
                    ('F', f64::from(pattern.code())),
                ],
            )
            .with_address(card);
        self.set(&line, options)
    }

    fn scanr(&mut self, params: &ScanRParams, options: SendOptions) -> Result<Ack> {
        if params.stop_mm.is_some() == params.num_pixels.is_some() {
            return Err(ArgumentError::ValueNotPermitted {
                operation: "scanr".to_string(),
                reason: "exactly one of stop position and pixel count must be given".to_string(),
            }
            .into());
        }
        let context = self.scan_context()?;

        let ticks_per_mm = self.encoder_ticks_per_mm(context.fast_axis)?;
        let exact_ticks = ticks_per_mm * params.pulse_interval_um * 1e-3;
        let ticks = exact_ticks.round();
        if ticks != exact_ticks {
            let actual_um = ticks / (ticks_per_mm * 1e-3);
            tracing::warn!(
                "Requested scan {}-stack spacing: {:.1}[um]. Actual spacing: {:.1}[um].",
                context.fast_axis,
                params.pulse_interval_um,
                actual_um
            );
        }

        let mut values = vec![('X', round_mm(params.start_mm)), ('Z', ticks)];
        if let Some(stop) = params.stop_mm {
            values.push(('Y', round_mm(stop)));
        }
        if let Some(pixels) = params.num_pixels {
            values.push(('F', f64::from(pixels)));
        }
        if let Some(retrace) = params.retrace_speed_percent {
            values.push(('R', retrace.round()));
        }
        let line = self
            .creator
            .params(Command::ScanR, &values)
            .with_address(context.card);
        self.set(&line, options)
    }

    fn scanv(&mut self, params: &ScanVParams, options: SendOptions) -> Result<Ack> {
        let context = self.scan_context()?;
        let mut values = vec![
            ('X', round_mm(params.start_mm)),
            ('Y', round_mm(params.stop_mm)),
            ('Z', f64::from(params.line_count)),
        ];
        if let Some(overshoot) = params.overshoot_time_ms {
            values.push(('F', overshoot.round()));
        }
        if let Some(factor) = params.overshoot_factor {
            values.push(('T', round_mm(factor)));
        }
        let line = self
            .creator
            .params(Command::ScanV, &values)
            .with_address(context.card);
        self.set(&line, options)
    }

    fn start_scan(&mut self, options: SendOptions) -> Result<Ack> {
        let context = self.scan_context()?;
        self.scan = None;
        let line = self
            .creator
            .literal(Command::Scan, ScanState::Start.as_str())
            .with_address(context.card);
        self.set(&line, options)
    }

    fn stop_scan(&mut self, options: SendOptions) -> Result<Ack> {
        let line = self.creator.literal(Command::Scan, ScanState::Stop.as_str());
        self.set(&line, options)
    }

    fn setup_array_scan(&mut self, params: &ArrayScanParams, options: SendOptions) -> Result<Ack> {
        let card = match &params.card {
            Some(card) => card.clone(),
            None => self.xy_card("setup_array_scan")?,
        };
        self.require_modules(&card, &[ARRAY_MODULE])?;
        self.array_scan_card = Some(card.clone());

        if let Some(pattern) = params.pattern {
            let line = self
                .creator
                .params(Command::Scan, &[('F', f64::from(pattern.code()))])
                .with_address(card.clone());
            self.set(&line, options)?;
        }

        let mut start = Vec::new();
        if let Some(x) = params.x_start_mm {
            start.push(('X', round_mm(x)));
        }
        if let Some(y) = params.y_start_mm {
            start.push(('Y', round_mm(y)));
        }
        let line = self
            .creator
            .params(Command::AHome, &start)
            .with_address(card.clone());
        self.set(&line, options)?;

        let line = self
            .creator
            .params(
                Command::Array,
                &[
                    ('X', f64::from(params.x_points)),
                    ('Y', f64::from(params.y_points)),
                    ('Z', round_mm(params.delta_x_mm)),
                    ('F', round_mm(params.delta_y_mm)),
                    ('T', round_deg(params.theta_deg)),
                ],
            )
            .with_address(card);
        self.set(&line, options)
    }

    fn start_array_scan(&mut self, options: SendOptions) -> Result<Ack> {
        let card = self.array_scan_card.take().ok_or_else(|| ArgumentError::InvalidSequence {
            reason: "setup_array_scan must be run first".to_string(),
        })?;
        let line = self.creator.bare(Command::Array).with_address(card);
        self.set(&line, options)
    }

    fn set_ttl_pin_modes(
        &mut self,
        modes: &TtlPinModes,
        card: Option<&CardAddress>,
        options: SendOptions,
    ) -> Result<Ack> {
        let mut params = Vec::new();
        if let Some(in0) = modes.in0_mode {
            params.push(('X', f64::from(in0.code())));
        }
        if let Some(out0) = modes.out0_mode {
            params.push(('Y', f64::from(out0.code())));
        }
        if let Some(state) = modes.aux_io_state {
            params.push(('Z', state as f64));
        }
        params.push(('F', if modes.reverse_output_polarity { -1.0 } else { 1.0 }));
        if let Some(mask) = modes.aux_io_mask {
            params.push(('R', mask as f64));
        }
        if let Some(mode) = modes.aux_io_mode {
            params.push(('T', mode as f64));
        }

        if let Some(card) = card {
            return self.send_ttl(&[card.clone()], &params, options);
        }

        let cards = match modes.in0_mode {
            Some(TtlIn0Mode::RepeatLastRelMove) => {
                let cards = self.config.cards_for(&self.last_rel_move_axes);
                if cards.is_empty() {
                    return Err(ArgumentError::InvalidSequence {
                        reason: "no relative move has been issued to repeat".to_string(),
                    }
                    .into());
                }
                cards
            }
            Some(TtlIn0Mode::MoveToNextRelPosition) | Some(TtlIn0Mode::MoveToNextAbsPosition) => {
                if self.ring_buffer_axes.is_empty() {
                    return Err(ArgumentError::InvalidSequence {
                        reason: "the ring buffer has not been set up".to_string(),
                    }
                    .into());
                }
                self.config.cards_for(&self.ring_buffer_axes)
            }
            Some(TtlIn0Mode::ArrayModeMoveToNextPosition) => {
                let card = self.xy_card("set_ttl_pin_modes")?;
                self.require_modules(&card, &[ARRAY_MODULE])?;
                vec![card]
            }
            _ => {
                return Err(ArgumentError::Invalid {
                    reason: "a card address must be given for this TTL input mode".to_string(),
                }
                .into())
            }
        };
        self.send_ttl(&cards, &params, options)
    }

    fn get_ttl_pin_modes(&mut self, card: &CardAddress) -> Result<AxisValues> {
        let line = self
            .creator
            .param_queries(Command::Ttl, &TTL_PARAMS)
            .with_address(card.clone());
        self.query_line_values(&line)
    }

    fn get_ttl_output_state(&mut self) -> Result<bool> {
        let line = self.creator.bare(Command::Ttl).as_query();
        let reply = self.query(&line)?;
        Ok(parser::parse_ttl_output_state(&reply)?)
    }

    fn is_moving(&mut self) -> Result<bool> {
        // The status reply is unreliable right after a command, including a
        // non-blocking one.
        if let Some(elapsed) = self.transport.time_since_last_send() {
            if elapsed < REPLY_WAIT_TIME {
                thread::sleep(REPLY_WAIT_TIME - elapsed);
            }
        }
        let line = self.creator.bare(Command::Status).as_query();
        let reply = self.query(&line)?;
        Ok(parser::parse_status(&reply)?)
    }

    fn get_axis_id(&mut self, axis: &str) -> Result<u32> {
        let axis = self.mapper.resolve_axis(axis)?;
        self.axis_id(axis)
    }

    fn get_info(&mut self, axis: &str) -> Result<BTreeMap<String, String>> {
        let axis = self.mapper.resolve_axis(axis)?;
        let line = self.creator.flags(Command::Info, &[axis]).as_query();
        let reply = self.query(&line)?;
        Ok(parser::parse_info(&reply))
    }

    fn set_axis_control_mode(
        &mut self,
        axes: &[(&str, ControlMode)],
        options: SendOptions,
    ) -> Result<Ack> {
        let modes = self.mapper.resolve_with(Operation::SetControlMode, axes)?;
        let codes: Vec<(Axis, String)> = modes
            .into_iter()
            .map(|(a, mode)| (a, mode.code().to_string()))
            .collect();
        let line = self.creator.text_assignments(Command::Pm, &codes);
        self.set(&line, options)
    }

    fn get_axis_control_mode(&mut self, axis: &str) -> Result<String> {
        let axis = self.mapper.resolve_axis(axis)?;
        self.control_mode(axis)
    }

    fn get_etl_temp(&mut self, axis: &str) -> Result<f64> {
        let axis = self.mapper.resolve_axis(axis)?;
        if self.config.axis_type(axis) != Some(TUNABLE_LENS_TYPE) {
            return Err(ArgumentError::ValueNotPermitted {
                operation: Operation::EtlTemperature.to_string(),
                reason: format!("axis '{axis}' is not a tunable lens"),
            }
            .into());
        }
        let card = self.card_of(axis)?;
        let original_mode = self.control_mode(axis)?;

        // The temperature is only reported in the temperature-compensated mode.
        let compensated = ControlMode::from(TunableLensControlMode::Tg1000InputWithTempCompensation);
        let line = self
            .creator
            .text_assignments(Command::Pm, &[(axis, compensated.code().to_string())]);
        self.set(&line, SendOptions::BLOCKING)?;

        let line = self.creator.bare(Command::PzInfo).as_query().with_address(card);
        let reply = self.query(&line);

        let restore = self
            .creator
            .text_assignments(Command::Pm, &[(axis, original_mode)]);
        let restored = self.set(&restore, SendOptions::BLOCKING);

        let reply = reply?;
        restored?;
        Ok(parser::parse_etl_temperature(&reply)?)
    }

    fn clear_incoming_message_queue(&mut self) -> Result<()> {
        self.transport.clear_incoming()
    }
}

fn log_device_error(command: &str, error: ProtocolError) -> ProtocolError {
    match &error {
        ProtocolError::DeviceError { code, .. } => {
            tracing::error!("Error occurred when sending {:?}: {}", command, format_error(*code));
        }
        _ => tracing::error!("Error occurred when sending {:?}: {}", command, error),
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::tiger::simulator::{SimTigerController, DEFAULT_SIM_AXES};

    fn sim() -> SimTigerController {
        SimTigerController::simulated().unwrap()
    }

    #[test]
    fn test_polarity_uses_card_index() {
        let mut controller = sim();
        controller
            .set_joystick_axis_polarity(&[("y", JoystickPolarity::Inverted)])
            .unwrap();
        assert_eq!(controller.sent_commands(), &["31CCA Z=24", "J Y+"]);
    }

    #[test]
    fn test_bind_joystick_input() {
        let mut controller = sim();
        controller
            .bind_axis_to_joystick_input(&[("z", JoystickInput::ZWheel)])
            .unwrap();
        let mapping = controller.get_joystick_axis_mapping(&["z"]).unwrap();
        assert_eq!(mapping[&Axis::new('Z').unwrap()], JoystickInput::ZWheel);
        assert_eq!(controller.sent_commands()[0], "J Z=22");
    }

    #[test]
    fn test_missing_array_module() {
        let mut config = BuildConfig::simulated(&DEFAULT_SIM_AXES).unwrap();
        config.set_card_modules(CardAddress::new("31"), Vec::new());
        let mut controller = SimTigerController::with_build_config(config).unwrap();

        let err = controller
            .setup_array_scan(&ArrayScanParams::default(), SendOptions::BLOCKING)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Firmware(FirmwareError::MissingModules { ref modules, .. })
                if modules == &[ARRAY_MODULE.to_string()]
        ));
        assert!(controller.sent_commands().is_empty());
    }

    #[test]
    fn test_query_options_override() {
        let mut controller = sim();
        let line = controller.creator.queries(Command::Speed, &[Axis::new('X').unwrap()]);
        let reply = controller
            .send_command(&line, SendOptions::FIRE_AND_FORGET)
            .unwrap();
        assert!(reply.is_some());
        assert_eq!(controller.transport().sent_commands(), &["S X?"]);
    }

    #[test]
    fn test_control_mode_reported_as_integer() {
        let mut controller = sim();
        controller
            .set_axis_control_mode(&[("x", ControlMode::from(2i64))], SendOptions::BLOCKING)
            .unwrap();
        assert_eq!(controller.get_axis_control_mode("x").unwrap(), "2");
    }

    #[test]
    fn test_stop_scan_has_no_address() {
        let mut controller = sim();
        controller.stop_scan(SendOptions::BLOCKING).unwrap();
        controller.reset_ring_buffer(SendOptions::BLOCKING).unwrap();
        assert_eq!(controller.sent_commands(), &["SCAN P", "RM X=0"]);
    }
}
