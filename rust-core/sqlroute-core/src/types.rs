//! # Parameter Types and Coercion
//!
//! Declared parameter types, the typed value union carried through dispatch,
//! and the two coercion paths:
//!
//! - [`coerce`] converts a raw value to its *declared* type and may fail.
//! - [`coerce_heuristic`] infers a type for an undeclared textual value and
//!   never fails; it is used only for endpoints with zero declarations.
//!
//! Both share the primitive parsers below ([`parse_number`], [`parse_bool`],
//! [`parse_date`]).

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use std::fmt;

/// Declared parameter type
///
/// Unknown specifiers fall back to `String`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamType {
    /// Text (default) - stringified, quoted on substitution
    #[default]
    String,
    /// Numeric - integer or decimal
    Number,
    /// Boolean - `true`/`1`, `false`/`0`
    Boolean,
    /// Structured JSON value
    Json,
    /// Calendar date/time, normalized to ISO-8601 UTC
    Date,
}

impl ParamType {
    /// Parse a type specifier (case-insensitive)
    #[must_use]
    pub fn from_specifier(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "number" | "int" | "integer" | "float" => Self::Number,
            "boolean" | "bool" => Self::Boolean,
            "json" => Self::Json,
            "date" | "datetime" => Self::Date,
            _ => Self::String,
        }
    }

    /// Get the type name for error messages
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Json => "json",
            Self::Date => "date",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl Serialize for ParamType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.type_name())
    }
}

impl<'de> Deserialize<'de> for ParamType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_specifier(&s))
    }
}

/// Typed parameter value
///
/// Every value substituted into a statement is one of these variants, so
/// literal formatting can match exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Absent or explicit null
    Null,
    /// Text
    String(String),
    /// Number
    Number(Number),
    /// Boolean
    Bool(bool),
    /// Structured JSON value
    Json(Value),
    /// Date/time in UTC
    Date(DateTime<Utc>),
}

impl ParamValue {
    /// Lift a raw JSON value without any parsing of strings
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            other @ (Value::Array(_) | Value::Object(_)) => Self::Json(other),
        }
    }

    /// Type implied by the variant, `None` for null
    #[must_use]
    pub const fn natural_type(&self) -> Option<ParamType> {
        match self {
            Self::Null => None,
            Self::String(_) => Some(ParamType::String),
            Self::Number(_) => Some(ParamType::Number),
            Self::Bool(_) => Some(ParamType::Boolean),
            Self::Json(_) => Some(ParamType::Json),
            Self::Date(_) => Some(ParamType::Date),
        }
    }

    /// Textual rendering (unquoted); JSON renders canonically
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::String(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Json(v) => v.to_string(),
            Self::Date(d) => format_iso(d),
        }
    }

    /// Check if value is null
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Declared coercion failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionError {
    /// Declared type
    pub expected: ParamType,
    /// Human-readable reason
    pub reason: String,
}

impl CoercionError {
    fn new(expected: ParamType, reason: impl Into<String>) -> Self {
        Self {
            expected,
            reason: reason.into(),
        }
    }

    /// Attach the parameter key, producing the domain error
    #[must_use]
    pub fn for_key(self, key: &str) -> crate::error::Error {
        crate::error::Error::InvalidCoercion {
            key: key.to_string(),
            expected: self.expected.type_name(),
            reason: self.reason,
        }
    }
}

/// ISO-8601 UTC rendering with millisecond precision
#[must_use]
pub fn format_iso(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Numeric parse shared by both coercion paths
///
/// Integral values are kept as integers so `"5.0"` and `"5"` render alike.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
pub fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return None;
    }
    let f = s.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        return Some(Number::from(f as i64));
    }
    Number::from_f64(f)
}

/// Boolean parse: `true`/`1` and `false`/`0`, case-insensitive
#[must_use]
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Date/time parse
///
/// Accepts RFC 3339, RFC 2822, `YYYY-MM-DD`, and `YYYY-MM-DD[T ]HH:MM[:SS[.f]]`.
/// Offset-less values are read as UTC.
#[must_use]
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = DateTime::parse_from_rfc2822(s) {
        return Some(d.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Convert a raw value to its declared type
///
/// Empty input (null or `""`) passes through unchanged.
///
/// # Errors
///
/// Returns `CoercionError` when the value cannot represent the declared type.
pub fn coerce(raw: &Value, declared: ParamType) -> Result<ParamValue, CoercionError> {
    match raw {
        Value::Null => return Ok(ParamValue::Null),
        Value::String(s) if s.is_empty() => return Ok(ParamValue::String(String::new())),
        _ => {}
    }

    match declared {
        ParamType::Number => match raw {
            Value::Number(n) => Ok(ParamValue::Number(n.clone())),
            Value::String(s) => parse_number(s)
                .map(ParamValue::Number)
                .ok_or_else(|| CoercionError::new(declared, "Invalid number")),
            Value::Bool(b) => Ok(ParamValue::Number(Number::from(u8::from(*b)))),
            _ => Err(CoercionError::new(declared, "Invalid number")),
        },
        ParamType::Boolean => {
            let parsed = match raw {
                Value::Bool(b) => Some(*b),
                Value::String(s) => parse_bool(s),
                Value::Number(n) => parse_bool(&n.to_string()),
                _ => None,
            };
            parsed
                .map(ParamValue::Bool)
                .ok_or_else(|| CoercionError::new(declared, "Invalid boolean"))
        }
        ParamType::Json => match raw {
            Value::String(s) => serde_json::from_str::<Value>(s)
                .map(ParamValue::Json)
                .map_err(|e| CoercionError::new(declared, format!("Invalid JSON: {e}"))),
            other => Ok(ParamValue::Json(other.clone())),
        },
        ParamType::Date => {
            let parsed = match raw {
                Value::String(s) => parse_date(s),
                Value::Number(n) => n
                    .as_i64()
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
                _ => None,
            };
            parsed
                .map(ParamValue::Date)
                .ok_or_else(|| CoercionError::new(declared, "Invalid date"))
        }
        ParamType::String => Ok(ParamValue::String(match raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
    }
}

fn is_integer_text(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_decimal_text(s: &str) -> bool {
    s.split_once('.').is_some_and(|(int, frac)| {
        is_integer_text(int) && !frac.is_empty() && frac.bytes().all(|b| b.is_ascii_digit())
    })
}

fn has_date_prefix(s: &str) -> bool {
    let b = s.as_bytes();
    let prefix_ok = b.len() >= 10
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[4] == b'-'
        && b[5..7].iter().all(u8::is_ascii_digit)
        && b[7] == b'-'
        && b[8..10].iter().all(u8::is_ascii_digit);
    prefix_ok && (b.len() == 10 || b[10] == b'T')
}

/// Infer a type for an undeclared textual value
///
/// Rules, first match wins: integer, decimal, boolean literal, JSON
/// object/array, ISO-8601-like date. Anything else stays text.
#[must_use]
pub fn coerce_heuristic(raw: &str) -> ParamValue {
    let s = raw.trim();

    if is_integer_text(s) || is_decimal_text(s) {
        if let Some(n) = parse_number(s) {
            return ParamValue::Number(n);
        }
    }
    if s.eq_ignore_ascii_case("true") {
        return ParamValue::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return ParamValue::Bool(false);
    }
    if (s.starts_with('{') && s.ends_with('}')) || (s.starts_with('[') && s.ends_with(']')) {
        if let Ok(v) = serde_json::from_str::<Value>(s) {
            return ParamValue::Json(v);
        }
    }
    if has_date_prefix(s) {
        if let Some(d) = parse_date(s) {
            return ParamValue::Date(d);
        }
    }
    ParamValue::String(raw.to_string())
}
