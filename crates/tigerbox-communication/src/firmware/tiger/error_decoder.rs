//! Tiger error code decoder
//! Converts `:N-<code>` replies to human-readable messages

/// Decode a Tiger error code to a human-readable message
pub fn decode_error(code: u8) -> &'static str {
    match code {
        1 => "Unknown command",
        2 => "Unrecognized axis parameter",
        3 => "Missing parameters",
        4 => "Parameter out of range",
        5 => "Operation failed",
        6 => "Undefined error",
        7 => "Invalid card address",
        8..=10 => "Reserved",
        11..=20 => "Reserved for filter wheel",
        21 => "Serial command halted by the HALT command",
        _ => "Unknown error",
    }
}

/// Parse an error reply line such as `:N-2`, returning the code
pub fn parse_error_code(line: &str) -> Option<u8> {
    line.trim()
        .strip_prefix(super::device_codes::ERROR_PREFIX)?
        .strip_prefix('-')?
        .trim()
        .parse::<u8>()
        .ok()
}

/// Format an error code for display
pub fn format_error(code: u8) -> String {
    format!(":N-{}: {}", code, decode_error(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error() {
        assert_eq!(decode_error(2), "Unrecognized axis parameter");
        assert_eq!(decode_error(9), "Reserved");
        assert_eq!(decode_error(15), "Reserved for filter wheel");
        assert_eq!(decode_error(99), "Unknown error");
    }

    #[test]
    fn test_parse_error_code() {
        assert_eq!(parse_error_code(":N-2"), Some(2));
        assert_eq!(parse_error_code(" :N-21\r\n"), Some(21));
        assert_eq!(parse_error_code(":A"), None);
        assert_eq!(parse_error_code(":N-x"), None);
    }

    #[test]
    fn test_format_error() {
        assert_eq!(format_error(7), ":N-7: Invalid card address");
    }
}
