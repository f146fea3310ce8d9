//! Tiger Response Parser
//!
//! Parses controller replies. A reply is one or more lines separated by `\r`
//! and ended by `\r\n`; the transport strips the final terminator. Error
//! replies take the form `:N-<code>`, acknowledgements start with `:A`, and
//! data replies carry `LETTER=value` tokens or bare numbers.

use super::device_codes::ACK;
use super::error_decoder::{decode_error, parse_error_code};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tigerbox_core::{Axis, AxisValues, BuildConfig, ProtocolError};

/// Column at which `INFO` replies split into two key/value columns
pub const INFO_COLUMN_SPLIT: usize = 33;

/// Outcome of a state-changing command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ack {
    /// The controller's reply was read and contained no error
    Received,
    /// The command was dispatched without waiting for the reply
    Pending,
}

/// Decoded reply
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ack,
    Values(AxisValues),
}

/// Non-blank, trimmed reply lines
pub fn reply_lines(reply: &str) -> impl Iterator<Item = &str> {
    reply
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

/// Fail with the controller error carried by any line of `reply`
pub fn check_errors(command: &str, reply: &str) -> Result<(), ProtocolError> {
    for line in reply_lines(reply) {
        let first = line.split_whitespace().next().unwrap_or(line);
        if let Some(code) = parse_error_code(first) {
            return Err(ProtocolError::DeviceError {
                code,
                description: decode_error(code).to_string(),
                command: command.to_string(),
            });
        }
    }
    Ok(())
}

/// Decode a reply that may or may not carry keyed values
pub fn parse_reply(reply: &str) -> Result<Reply, ProtocolError> {
    let values = parse_axis_values(reply)?;
    if values.is_empty() {
        Ok(Reply::Ack)
    } else {
        Ok(Reply::Values(values))
    }
}

/// Parse `X=1.5 Y=-2` or `X:1.5` tokens, ignoring the acknowledgement token
pub fn parse_axis_values(reply: &str) -> Result<AxisValues, ProtocolError> {
    let mut values = AxisValues::new();
    for line in reply_lines(reply) {
        for token in line.split_whitespace() {
            if token == ACK {
                continue;
            }
            let (key, value) = token
                .split_once('=')
                .or_else(|| token.split_once(':'))
                .ok_or_else(|| ProtocolError::malformed("unrecognized token", line))?;
            let axis = Axis::parse(key)
                .map_err(|_| ProtocolError::malformed(format!("bad axis '{key}'"), line))?;
            let value = value
                .parse::<f64>()
                .map_err(|_| ProtocolError::malformed(format!("bad value '{value}'"), line))?;
            values.insert(axis, value);
        }
    }
    Ok(values)
}

/// Parse a `W` reply: bare numbers in the order the axes were requested
pub fn parse_positions(reply: &str, axes: &[Axis]) -> Result<AxisValues, ProtocolError> {
    let raw = reply.trim();
    let numbers = reply_lines(reply)
        .flat_map(str::split_whitespace)
        .filter(|token| *token != ACK)
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| ProtocolError::malformed(format!("bad position '{token}'"), raw))
        })
        .collect::<Result<Vec<f64>, _>>()?;

    if numbers.len() != axes.len() {
        return Err(ProtocolError::malformed(
            format!("expected {} positions, got {}", axes.len(), numbers.len()),
            raw,
        ));
    }
    Ok(axes.iter().copied().zip(numbers).collect())
}

/// Parse the `Key: v1 v2` lines of a `BU X` reply
pub fn parse_build_config(reply: &str) -> Result<BuildConfig, ProtocolError> {
    let mut fields = BTreeMap::new();
    for line in reply_lines(reply) {
        let parts: Vec<&str> = line.split(':').collect();
        if let [key, values] = parts.as_slice() {
            fields.insert(
                key.trim().to_string(),
                values.split_whitespace().map(str::to_string).collect(),
            );
        }
    }
    BuildConfig::from_fields(fields)
}

/// Firmware modules from a `<card>BU X` reply: the all-uppercase lines
pub fn parse_card_modules(reply: &str) -> Vec<String> {
    reply_lines(reply)
        .filter(|line| !line.starts_with(':'))
        .filter(|line| *line == line.to_uppercase())
        .map(str::to_string)
        .collect()
}

/// Parse a `/` reply: `B` while any axis moves, `N` when idle
pub fn parse_status(reply: &str) -> Result<bool, ProtocolError> {
    match reply.trim() {
        "B" => Ok(true),
        "N" => Ok(false),
        other => Err(ProtocolError::malformed("unknown status", other)),
    }
}

/// Parse a single-value reply such as `:A X=181590.4`
pub fn parse_assigned_value(reply: &str) -> Result<f64, ProtocolError> {
    let raw = reply.trim();
    let (_, tail) = raw
        .rsplit_once('=')
        .ok_or_else(|| ProtocolError::malformed("expected '=<value>'", raw))?;
    tail.split_whitespace()
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| ProtocolError::malformed("bad value", raw))
}

/// Parse the two-column `INFO` reply into a key/value map
pub fn parse_info(reply: &str) -> BTreeMap<String, String> {
    let mut info = BTreeMap::new();
    for line in reply.split(['\r', '\n']) {
        let split = line
            .char_indices()
            .nth(INFO_COLUMN_SPLIT)
            .map(|(i, _)| i)
            .unwrap_or(line.len());
        let (left, right) = line.split_at(split);
        for column in [left, right] {
            let words: Vec<&str> = column.split(':').collect();
            // Lines without a single key/value pair (e.g. EEPROM dumps) are skipped
            if let [key, value] = words.as_slice() {
                let key = key.trim();
                if key.is_empty() {
                    continue;
                }
                let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
                info.insert(key.to_string(), value);
            }
        }
    }
    info
}

/// Lens temperature from a `PZINFO` reply, e.g. `V Mode[IN],Tc[21.250],TCOMP[ON]`
pub fn parse_etl_temperature(reply: &str) -> Result<f64, ProtocolError> {
    let raw = reply.trim();
    let line = reply_lines(reply)
        .find(|line| line.contains("TCOMP[ON]"))
        .ok_or_else(|| ProtocolError::malformed("no temperature-compensated line", raw))?;
    let field = line
        .split(',')
        .nth(1)
        .ok_or_else(|| ProtocolError::malformed("missing temperature field", line))?;
    let start = field.find('[').map(|i| i + 1);
    let end = field.find(']');
    match (start, end) {
        (Some(s), Some(e)) if s <= e => field[s..e]
            .parse::<f64>()
            .map_err(|_| ProtocolError::malformed("bad temperature", line)),
        _ => Err(ProtocolError::malformed("bad temperature field", line)),
    }
}

/// Parse the `TTL` output state reply, `:A 1` or `:A 0`
pub fn parse_ttl_output_state(reply: &str) -> Result<bool, ProtocolError> {
    let raw = reply.trim();
    let value = raw.trim_start_matches(ACK).trim();
    value
        .parse::<i64>()
        .map(|v| v != 0)
        .map_err(|_| ProtocolError::malformed("bad output state", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(c: char) -> Axis {
        Axis::new(c).unwrap()
    }

    #[test]
    fn test_check_errors() {
        assert!(check_errors("M X=1", ":A").is_ok());
        let err = check_errors("M Q=1", ":N-2").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::DeviceError {
                code: 2,
                description: "Unrecognized axis parameter".to_string(),
                command: "M Q=1".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_axis_values() {
        let values = parse_axis_values(":A X=1.0 y=2").unwrap();
        assert_eq!(values[&axis('X')], 1.0);
        assert_eq!(values[&axis('Y')], 2.0);

        let values = parse_axis_values("V=1 :A").unwrap();
        assert_eq!(values[&axis('V')], 1.0);

        assert!(parse_axis_values(":A").unwrap().is_empty());
        assert_eq!(parse_reply(":A").unwrap(), Reply::Ack);
    }

    #[test]
    fn test_malformed_token_keeps_line() {
        let err = parse_axis_values("X#5").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedReply { ref raw, .. } if raw == "X#5"));
    }

    #[test]
    fn test_parse_positions() {
        let values = parse_positions(":A 10 50", &[axis('X'), axis('Y')]).unwrap();
        assert_eq!(values[&axis('X')], 10.0);
        assert_eq!(values[&axis('Y')], 50.0);
        assert!(parse_positions(":A 10", &[axis('X'), axis('Y')]).is_err());
    }

    #[test]
    fn test_parse_build_config() {
        let reply = "TIGER_COMM\rMotor Axes: X Y Z\rAxis Types: x x z\rHex Addr: 31 31 32\rAxis Props:   74  10   2";
        let config = parse_build_config(reply).unwrap();
        assert_eq!(config.axes().len(), 3);
        assert_eq!(config.card(axis('Z')).unwrap().address.as_str(), "32");
    }

    #[test]
    fn test_parse_card_modules() {
        let modules = parse_card_modules("Std ZF\rSCAN MODULE\rARRAY MODULE\r:A");
        assert_eq!(modules, vec!["SCAN MODULE", "ARRAY MODULE"]);
    }

    #[test]
    fn test_parse_status() {
        assert!(parse_status("B").unwrap());
        assert!(!parse_status("N").unwrap());
        assert!(parse_status("?").is_err());
    }

    #[test]
    fn test_parse_assigned_value() {
        assert_eq!(parse_assigned_value(":A X=181590.4").unwrap(), 181590.4);
        assert_eq!(parse_assigned_value("X=3").unwrap(), 3.0);
        assert!(parse_assigned_value(":A").is_err());
    }

    #[test]
    fn test_parse_info() {
        let reply = format!(
            "{:<33}{}\r{}",
            "Axis Name   : X", "Input Device : JS_X", "EEPROM dump 00 01"
        );
        let info = parse_info(&reply);
        assert_eq!(info["Axis Name"], "X");
        assert_eq!(info["Input Device"], "JS_X");
        assert_eq!(info.len(), 2);
    }

    #[test]
    fn test_parse_etl_temperature() {
        let reply = "V Mode[IN],Tc[21.250],TCOMP[ON]\r:A";
        assert_eq!(parse_etl_temperature(reply).unwrap(), 21.25);
        assert!(parse_etl_temperature("V Mode[IN],TCOMP[OFF]").is_err());
    }

    #[test]
    fn test_parse_ttl_output_state() {
        assert!(parse_ttl_output_state(":A 1").unwrap());
        assert!(!parse_ttl_output_state(":A 0").unwrap());
    }
}
