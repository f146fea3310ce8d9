//! Tiger Command Creator
//!
//! Builds single command lines in the controller's text syntax:
//! an optional card address, a verb, then space separated operand tokens
//! such as `X`, `X=100`, `X?`, `X+` or `X-`. The creator never converts
//! units; callers round millimetre values before handing them over.

use super::device_codes::Command;
use std::fmt;
use tigerbox_core::{Axis, AxisValueSet, CardAddress};

/// One operand of a command line
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `X`
    Flag(char),
    /// `X=100`, `X=20.5`
    Assign(char, f64),
    /// `X=+`, for symbolic values
    AssignText(char, String),
    /// `X?`
    Query(char),
    /// `X+` or `X-`
    Suffix(char, char),
    /// A bare word such as `S` or `P`
    Literal(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Flag(letter) => write!(f, "{letter}"),
            Token::Assign(letter, value) => write!(f, "{letter}={}", format_number(*value)),
            Token::AssignText(letter, text) => write!(f, "{letter}={text}"),
            Token::Query(letter) => write!(f, "{letter}?"),
            Token::Suffix(letter, suffix) => write!(f, "{letter}{suffix}"),
            Token::Literal(word) => f.write_str(word),
        }
    }
}

/// Integers print without a fractional part, other values in their shortest
/// round-trip form.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Whether a line changes state or asks for data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Set,
    Query,
}

/// A complete command line, without terminator
#[derive(Debug, Clone, PartialEq)]
pub struct CommandLine {
    pub address: Option<CardAddress>,
    pub command: Command,
    pub tokens: Vec<Token>,
    pub kind: LineKind,
}

impl CommandLine {
    pub fn new(command: Command, tokens: Vec<Token>, kind: LineKind) -> Self {
        Self {
            address: None,
            command,
            tokens,
            kind,
        }
    }

    /// Prefix the line with a card address
    pub fn with_address(mut self, address: CardAddress) -> Self {
        self.address = Some(address);
        self
    }

    /// Mark the line as a query
    pub fn as_query(mut self) -> Self {
        self.kind = LineKind::Query;
        self
    }

    pub fn is_query(&self) -> bool {
        self.kind == LineKind::Query
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(address) = &self.address {
            write!(f, "{address}")?;
        }
        write!(f, "{}", self.command)?;
        for token in &self.tokens {
            write!(f, " {token}")?;
        }
        Ok(())
    }
}

/// Tiger command creator
#[derive(Debug, Default)]
pub struct CommandCreator;

impl CommandCreator {
    /// Create a new command creator
    pub fn new() -> Self {
        Self
    }

    /// A verb with no operands, e.g. `\` or `BU X`
    pub fn bare(&self, command: Command) -> CommandLine {
        CommandLine::new(command, Vec::new(), LineKind::Set)
    }

    /// `! X Y`
    pub fn flags(&self, command: Command, axes: &[Axis]) -> CommandLine {
        let tokens = axes.iter().map(|a| Token::Flag(a.letter())).collect();
        CommandLine::new(command, tokens, LineKind::Set)
    }

    /// `M X=1000 Y=25`
    pub fn assignments(&self, command: Command, values: &[(Axis, f64)]) -> CommandLine {
        let tokens = values
            .iter()
            .map(|(a, v)| Token::Assign(a.letter(), *v))
            .collect();
        CommandLine::new(command, tokens, LineKind::Set)
    }

    /// `HM X+ Y=20.5`: entries without a value use the command's
    /// current-value marker, or a bare flag if it has none.
    pub fn with_current(&self, command: Command, values: &AxisValueSet) -> CommandLine {
        let marker = command.current_value_marker();
        let tokens = values
            .iter()
            .map(|(axis, value)| match (value, marker) {
                (Some(v), _) => Token::Assign(axis.letter(), *v),
                (None, Some(m)) => Token::Suffix(axis.letter(), m),
                (None, None) => Token::Flag(axis.letter()),
            })
            .collect();
        CommandLine::new(command, tokens, LineKind::Set)
    }

    /// `PM X=+`
    pub fn text_assignments(&self, command: Command, values: &[(Axis, String)]) -> CommandLine {
        let tokens = values
            .iter()
            .map(|(a, v)| Token::AssignText(a.letter(), v.clone()))
            .collect();
        CommandLine::new(command, tokens, LineKind::Set)
    }

    /// `HM X? Y?`
    pub fn queries(&self, command: Command, axes: &[Axis]) -> CommandLine {
        let tokens = axes.iter().map(|a| Token::Query(a.letter())).collect();
        CommandLine::new(command, tokens, LineKind::Query)
    }

    /// `SL X- Y-`
    pub fn resets(&self, command: Command, axes: &[Axis]) -> CommandLine {
        let tokens = axes.iter().map(|a| Token::Suffix(a.letter(), '-')).collect();
        CommandLine::new(command, tokens, LineKind::Set)
    }

    /// `J X+ Y-`
    pub fn toggles(&self, command: Command, states: &[(Axis, bool)]) -> CommandLine {
        let tokens = states
            .iter()
            .map(|(a, on)| Token::Suffix(a.letter(), if *on { '+' } else { '-' }))
            .collect();
        CommandLine::new(command, tokens, LineKind::Set)
    }

    /// Non-axis parameters, e.g. `RM X=0 Y=3 F=0`
    pub fn params(&self, command: Command, params: &[(char, f64)]) -> CommandLine {
        let tokens = params
            .iter()
            .map(|(letter, v)| Token::Assign(*letter, *v))
            .collect();
        CommandLine::new(command, tokens, LineKind::Set)
    }

    /// Parameter queries, e.g. `TTL X? Y?`
    pub fn param_queries(&self, command: Command, letters: &[char]) -> CommandLine {
        let tokens = letters.iter().map(|l| Token::Query(*l)).collect();
        CommandLine::new(command, tokens, LineKind::Query)
    }

    /// `SCAN S`
    pub fn literal(&self, command: Command, word: &str) -> CommandLine {
        CommandLine::new(command, vec![Token::Literal(word.to_string())], LineKind::Set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(c: char) -> Axis {
        Axis::new(c).unwrap()
    }

    #[test]
    fn test_number_format() {
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(-25.0), "-25");
        assert_eq!(format_number(20.5), "20.5");
        assert_eq!(format_number(0.1234), "0.1234");
    }

    #[test]
    fn test_assignments() {
        let creator = CommandCreator::new();
        let line = creator.assignments(Command::MoveAbs, &[(axis('X'), 1000.0), (axis('Y'), 25.0)]);
        assert_eq!(line.to_string(), "M X=1000 Y=25");
        assert!(!line.is_query());
    }

    #[test]
    fn test_current_value_marker() {
        let creator = CommandCreator::new();
        let mut set = AxisValueSet::new();
        set.insert(axis('X'), None).unwrap();
        set.insert(axis('Y'), Some(20.5)).unwrap();
        assert_eq!(
            creator.with_current(Command::SetHome, &set).to_string(),
            "HM X+ Y=20.5"
        );
    }

    #[test]
    fn test_queries_and_resets() {
        let creator = CommandCreator::new();
        let axes = [axis('X'), axis('Y')];
        let query = creator.queries(Command::SetHome, &axes);
        assert_eq!(query.to_string(), "HM X? Y?");
        assert!(query.is_query());
        assert_eq!(creator.resets(Command::SetLow, &axes).to_string(), "SL X- Y-");
        assert_eq!(
            creator
                .toggles(Command::J, &[(axis('X'), true), (axis('Y'), false)])
                .to_string(),
            "J X+ Y-"
        );
    }

    #[test]
    fn test_card_address_prefix() {
        let creator = CommandCreator::new();
        let line = creator
            .params(Command::ScanR, &[('X', 1.0), ('Z', 9.0)])
            .with_address(CardAddress::new("31"));
        assert_eq!(line.to_string(), "31SCANR X=1 Z=9");
        assert_eq!(creator.literal(Command::Scan, "S").to_string(), "SCAN S");
        assert_eq!(creator.bare(Command::Halt).to_string(), "\\");
    }
}
