//! Numeric conversions for literal inputs and resolved variable values
//!
//! Literals in a definition are checked strictly: a malformed number is a
//! definition error. Values fetched from host variables at call time are
//! converted leniently the way C `atoi`/`atof` do, since the host stores
//! every variable as text and formula results often carry trailing noise.

use crate::error::BridgeError;

/// Strict integer parse for definition-time literals
pub fn parse_int(text: &str) -> Result<i64, BridgeError> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix(['+', '-'])
        .unwrap_or(trimmed);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(BridgeError::Definition(format!(
            "Expected integer parameter instead of '{}' in input script or data file",
            text
        )));
    }
    trimmed.parse::<i64>().map_err(|_| {
        BridgeError::Definition(format!("Integer parameter '{}' is out of range", text))
    })
}

/// Strict floating-point parse for definition-time literals
///
/// Only plain decimal and exponent notation is accepted; `inf` and `nan`
/// spellings are rejected.
pub fn parse_float(text: &str) -> Result<f64, BridgeError> {
    let trimmed = text.trim();
    let well_formed = !trimmed.is_empty()
        && trimmed.chars().any(|c| c.is_ascii_digit())
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    let parsed = if well_formed {
        trimmed.parse::<f64>().ok()
    } else {
        None
    };
    parsed.ok_or_else(|| {
        BridgeError::Definition(format!(
            "Expected floating point parameter instead of '{}' in input script or data file",
            text
        ))
    })
}

/// C `atoi` semantics: leading whitespace, optional sign, digits; else 0
pub fn atoi(text: &str) -> i64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return 0;
    }
    // Saturate instead of wrapping on overflow
    s[..end].parse::<i64>().unwrap_or_else(|_| {
        if s.starts_with('-') {
            i64::MIN
        } else {
            i64::MAX
        }
    })
}

/// C `atof` semantics: longest leading prefix that forms a number; else 0.0
///
/// Accepts decimal and `0x` hexadecimal forms as well as `inf`/`nan`.
pub fn atof(text: &str) -> f64 {
    let s = text.trim_start();
    let lower = s.to_ascii_lowercase();
    for (word, value) in [
        ("infinity", f64::INFINITY),
        ("inf", f64::INFINITY),
        ("nan", f64::NAN),
    ] {
        for (sign, factor) in [("", 1.0), ("+", 1.0), ("-", -1.0)] {
            if lower.starts_with(&format!("{}{}", sign, word)) {
                return factor * value;
            }
        }
    }

    let (factor, unsigned) = match s.as_bytes().first() {
        Some(b'-') => (-1.0, &s[1..]),
        Some(b'+') => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    if let Some(value) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
        .and_then(|digits| hex_prefix(digits.as_bytes()))
    {
        return factor * value;
    }

    let end = numeric_prefix_len(s.as_bytes());
    s[..end].parse::<f64>().unwrap_or(0.0)
}

/// Value of the longest prefix matching `hexdigits[.hexdigits][(p|P)[+-]?digits]`
///
/// `None` when there are no hex digits, so `"0x"` alone reads as 0.
fn hex_prefix(bytes: &[u8]) -> Option<f64> {
    let hex = |b: u8| (b as char).to_digit(16).map(f64::from);
    let mut i = 0;
    let mut value = 0.0;
    let mut digits = 0;
    while let Some(d) = bytes.get(i).copied().and_then(hex) {
        value = value * 16.0 + d;
        i += 1;
        digits += 1;
    }
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        let mut scale = 1.0 / 16.0;
        while let Some(d) = bytes.get(i).copied().and_then(hex) {
            value += d * scale;
            scale /= 16.0;
            i += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }
    if matches!(bytes.get(i), Some(b'p') | Some(b'P')) {
        let rest = &bytes[i + 1..];
        let sign_len = usize::from(matches!(rest.first(), Some(b'+') | Some(b'-')));
        let exp_len = rest[sign_len..].iter().take_while(|b| b.is_ascii_digit()).count();
        if exp_len > 0 {
            let exponent = std::str::from_utf8(&rest[..sign_len + exp_len])
                .ok()
                .and_then(|e| e.parse::<i32>().ok())
                .unwrap_or(if rest[0] == b'-' { i32::MIN } else { i32::MAX });
            value *= 2f64.powi(exponent);
        }
    }
    Some(value)
}

/// Length of the longest prefix matching `[+-]?digits[.digits][(e|E)[+-]?digits]`
fn numeric_prefix_len(bytes: &[u8]) -> usize {
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i = 1;
    }
    let mut mantissa_digits = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        mantissa_digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        let mut j = i + 1;
        let mut fraction_digits = 0;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
            fraction_digits += 1;
        }
        if mantissa_digits + fraction_digits > 0 {
            i = j;
            mantissa_digits += fraction_digits;
        }
    }
    if mantissa_digits == 0 {
        return 0;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_strict() {
        assert_eq!(parse_int("42").unwrap(), 42);
        assert_eq!(parse_int("-7").unwrap(), -7);
        assert_eq!(parse_int("+3").unwrap(), 3);
        assert!(parse_int("3.5").is_err());
        assert!(parse_int("abc").is_err());
        assert!(parse_int("").is_err());
        assert!(parse_int("-").is_err());
        assert!(parse_int("99999999999999999999").is_err());
    }

    #[test]
    fn test_parse_float_strict() {
        assert_eq!(parse_float("2.5").unwrap(), 2.5);
        assert_eq!(parse_float("1e3").unwrap(), 1000.0);
        assert_eq!(parse_float("-.5").unwrap(), -0.5);
        assert_eq!(parse_float("7").unwrap(), 7.0);
        assert!(parse_float("inf").is_err());
        assert!(parse_float("nan").is_err());
        assert!(parse_float("1.2.3").is_err());
        assert!(parse_float("e").is_err());
    }

    #[test]
    fn test_atoi_lenient() {
        assert_eq!(atoi("12"), 12);
        assert_eq!(atoi("  -8xyz"), -8);
        assert_eq!(atoi("3.9"), 3);
        assert_eq!(atoi("abc"), 0);
        assert_eq!(atoi(""), 0);
        assert_eq!(atoi("99999999999999999999"), i64::MAX);
    }

    #[test]
    fn test_atof_lenient() {
        assert_eq!(atof("2.5"), 2.5);
        assert_eq!(atof(" 1e2 apples"), 100.0);
        assert_eq!(atof("1e"), 1.0);
        assert_eq!(atof(".5"), 0.5);
        assert_eq!(atof("5."), 5.0);
        assert_eq!(atof("-3.25e-1x"), -0.325);
        assert_eq!(atof("junk"), 0.0);
        assert_eq!(atof("."), 0.0);
        assert!(atof("-inf").is_infinite());
        assert!(atof("nan").is_nan());
        assert_eq!(atof("0x1A"), 26.0);
        assert_eq!(atof("-0x1.8p1"), -3.0);
        assert_eq!(atof("0x10p-2 tail"), 4.0);
        assert_eq!(atof("0xg"), 0.0);
        assert_eq!(atof("0x.8"), 0.5);
    }
}
