//! Scalar value representation, size-suffix parsing, and the partial
//! date/time literal format used by comparisons against `date`/`time`.

use std::fmt;

use thiserror::Error;

/// A tagged scalar produced by a literal or by resolving an identifier
/// against a [`crate::row::Row`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthy coercion used by the bare-`term` "truthy test" production:
    /// nonzero number, nonempty text, true boolean. `Null` is not truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::Null => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bool(_) => "bool",
            Value::Null => "null",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SizeParseError {
    #[error("'{0}' is not a valid size: expected an integer, optionally followed by B/K/M/G/T")]
    InvalidFormat(String),
    #[error("'{0}' has a fractional value, which is not allowed before applying a size suffix")]
    FractionalMantissa(String),
    #[error("'{0}' overflows a 64-bit size in bytes")]
    Overflow(String),
}

/// Decimal power-of-1000 table for size suffixes, case-insensitive.
fn suffix_multiplier(c: char) -> Option<i64> {
    match c.to_ascii_uppercase() {
        'B' => Some(1),
        'K' => Some(1_000),
        'M' => Some(1_000_000),
        'G' => Some(1_000_000_000),
        'T' => Some(1_000_000_000_000),
        _ => None,
    }
}

/// Parse a size literal (`"1K"`, `"2000"`, `"3T"`) into bytes.
///
/// The mantissa must be integer-valued: `"1.5K"` is rejected rather than
/// silently truncated or rounded, since the spec leaves the decision open
/// but asks for consistent behavior (see DESIGN.md).
pub fn parse_size(input: &str) -> Result<i64, SizeParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SizeParseError::InvalidFormat(input.to_string()));
    }

    let (mantissa, multiplier) = match trimmed.chars().last() {
        Some(last) if last.is_ascii_alphabetic() => {
            let mult = suffix_multiplier(last)
                .ok_or_else(|| SizeParseError::InvalidFormat(input.to_string()))?;
            (&trimmed[..trimmed.len() - last.len_utf8()], mult)
        }
        Some(_) => (trimmed, 1),
        None => return Err(SizeParseError::InvalidFormat(input.to_string())),
    };

    if mantissa.contains('.') {
        return Err(SizeParseError::FractionalMantissa(input.to_string()));
    }

    let mantissa: i64 = mantissa
        .parse()
        .map_err(|_| SizeParseError::InvalidFormat(input.to_string()))?;

    mantissa
        .checked_mul(multiplier)
        .ok_or_else(|| SizeParseError::Overflow(input.to_string()))
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DateTimeParseError {
    #[error("'{0}' is not a valid date (expected YYYY, YYYY-MM, or YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("'{0}' is not a valid time (expected HH:MM or HH:MM:SS)")]
    InvalidTime(String),
}

/// Validate and normalize a (possibly partial) date literal.
///
/// Returns the literal unchanged (it is already a fixed-width prefix of the
/// canonical `YYYY-MM-DD` form, so plain string ordering against a row's
/// `date` field implements the partial-date prefix comparison.
pub fn validate_partial_date(s: &str) -> Result<&str, DateTimeParseError> {
    let bytes = s.as_bytes();
    let ok = match bytes.len() {
        4 => is_digits(&s[0..4]),
        7 => is_digits(&s[0..4]) && bytes[4] == b'-' && valid_month(&s[5..7]),
        10 => {
            is_digits(&s[0..4])
                && bytes[4] == b'-'
                && valid_month(&s[5..7])
                && bytes[7] == b'-'
                && valid_day(&s[8..10])
        }
        _ => false,
    };
    if ok {
        Ok(s)
    } else {
        Err(DateTimeParseError::InvalidDate(s.to_string()))
    }
}

/// Validate and normalize a (possibly partial) time literal, same rationale
/// as [`validate_partial_date`].
pub fn validate_partial_time(s: &str) -> Result<&str, DateTimeParseError> {
    let bytes = s.as_bytes();
    let ok = match bytes.len() {
        5 => is_digits(&s[0..2]) && valid_hour(&s[0..2]) && bytes[2] == b':' && valid_60(&s[3..5]),
        8 => {
            is_digits(&s[0..2])
                && valid_hour(&s[0..2])
                && bytes[2] == b':'
                && valid_60(&s[3..5])
                && bytes[5] == b':'
                && valid_60(&s[6..8])
        }
        _ => false,
    };
    if ok {
        Ok(s)
    } else {
        Err(DateTimeParseError::InvalidTime(s.to_string()))
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn valid_month(s: &str) -> bool {
    is_digits(s) && s.len() == 2 && matches!(s.parse::<u8>(), Ok(1..=12))
}

fn valid_day(s: &str) -> bool {
    is_digits(s) && s.len() == 2 && matches!(s.parse::<u8>(), Ok(1..=31))
}

fn valid_hour(s: &str) -> bool {
    is_digits(s) && s.len() == 2 && matches!(s.parse::<u8>(), Ok(0..=23))
}

fn valid_60(s: &str) -> bool {
    is_digits(s) && s.len() == 2 && matches!(s.parse::<u8>(), Ok(0..=59))
}
