//! Result buffers and host-side result formatting
//!
//! Function results reach the host as text. Scalars and short strings go into
//! a fixed-capacity [`ResultBuffer`] owned by the caller; a binding that
//! declared `length <n>` keeps its own [`OverflowBuffer`] for long strings.
//!
//! Capacities count a trailing terminator the way the host's C buffers do, so
//! a 64-byte result buffer holds at most 63 bytes of text.

/// Default fixed result capacity, terminator included
pub const RESULT_CAPACITY: usize = 64;

/// Significant digits used when formatting doubles
pub const DOUBLE_DIGITS: usize = 15;

/// Fixed-capacity result slot handed to the invocation engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultBuffer {
    capacity: usize,
    text: String,
}

impl ResultBuffer {
    pub fn new() -> Self {
        Self::with_capacity(RESULT_CAPACITY)
    }

    /// Create a buffer holding `capacity - 1` bytes of text
    ///
    /// A capacity of zero is bumped to one (room for the terminator only).
    pub fn with_capacity(capacity: usize) -> Self {
        ResultBuffer {
            capacity: capacity.max(1),
            text: String::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Replace the contents, truncating to `capacity - 1` bytes
    pub fn write(&mut self, text: &str) {
        self.text.clear();
        self.text
            .push_str(truncate_to_boundary(text, self.capacity - 1));
    }
}

impl Default for ResultBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-binding buffer for string results longer than the fixed capacity
///
/// Holds at most `capacity` bytes of text (the terminator is not counted,
/// matching `length <n>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverflowBuffer {
    capacity: usize,
    text: String,
}

impl OverflowBuffer {
    pub fn new(capacity: usize) -> Self {
        OverflowBuffer {
            capacity,
            text: String::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Replace the contents, truncating to `capacity` bytes
    pub fn write(&mut self, text: &str) {
        self.text.clear();
        self.text
            .push_str(truncate_to_boundary(text, self.capacity));
    }
}

/// Longest prefix of `text` that fits in `max` bytes without splitting a character
pub fn truncate_to_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Format an integer result (`%ld`)
pub fn format_int(value: i64) -> String {
    value.to_string()
}

/// Format a double result with 15 significant digits (`%.15g`)
///
/// Uses fixed notation when the decimal exponent is in `[-4, 15)` and
/// scientific notation otherwise; trailing zeros are dropped in both.
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        return if value.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let scientific = format!("{:.*e}", DOUBLE_DIGITS - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if exponent < -4 || exponent >= DOUBLE_DIGITS as i32 {
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            if exponent < 0 { '-' } else { '+' },
            exponent.abs()
        )
    } else {
        let decimals = (DOUBLE_DIGITS as i32 - 1 - exponent) as usize;
        let fixed = format!("{:.*}", decimals, value);
        trim_fraction(&fixed).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}
