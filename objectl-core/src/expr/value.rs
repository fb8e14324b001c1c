use crate::wkt;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use prost_reflect::{DynamicMessage, MapKey, ReflectMessage};
use std::collections::BTreeMap;
use std::fmt;

/// The result of evaluating an expression.
///
/// Protobuf values are converted on access: every integer type becomes [`Value::Int`] or
/// [`Value::Uint`], enums are their numbers, `google.protobuf.Timestamp` and
/// `google.protobuf.Duration` become [`Value::Timestamp`] and [`Value::Duration`], and wrapper
/// types are unwrapped.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Duration(TimeDelta),
    List(Vec<Value>),
    Map(BTreeMap<Key, Value>),
    Message(DynamicMessage),
}

/// The types that can be used as map keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Bool(bool),
    Int(i64),
    Uint(u64),
    String(String),
}

impl Value {
    /// Name of the type of the value, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null_type",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "google.protobuf.Timestamp",
            Value::Duration(_) => "google.protobuf.Duration",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Message(_) => "message",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub(crate) fn from_message(message: &DynamicMessage) -> Value {
        if let Some(timestamp) = wkt::timestamp(message) {
            return Value::Timestamp(timestamp);
        }
        if let Some(duration) = wkt::duration(message) {
            return Value::Duration(duration);
        }
        if let Some(inner) = wkt::unwrap(message) {
            return Value::from(&*inner);
        }
        Value::Message(message.clone())
    }

    /// Converts the value to a map key, if its type allows it.
    pub(crate) fn to_key(&self) -> Option<Key> {
        match self {
            Value::Bool(b) => Some(Key::Bool(*b)),
            Value::Int(i) => Some(Key::Int(*i)),
            Value::Uint(u) => Some(Key::Uint(*u)),
            Value::String(s) => Some(Key::String(s.clone())),
            _ => None,
        }
    }
}

impl From<&prost_reflect::Value> for Value {
    fn from(value: &prost_reflect::Value) -> Self {
        use prost_reflect::Value as Proto;
        match value {
            Proto::Bool(b) => Value::Bool(*b),
            Proto::I32(i) => Value::Int(i64::from(*i)),
            Proto::I64(i) => Value::Int(*i),
            Proto::U32(u) => Value::Uint(u64::from(*u)),
            Proto::U64(u) => Value::Uint(*u),
            Proto::F32(f) => Value::Double(f64::from(*f)),
            Proto::F64(f) => Value::Double(*f),
            Proto::String(s) => Value::String(s.clone()),
            Proto::Bytes(b) => Value::Bytes(b.to_vec()),
            Proto::EnumNumber(n) => Value::Int(i64::from(*n)),
            Proto::Message(m) => Value::from_message(m),
            Proto::List(items) => Value::List(items.iter().map(Value::from).collect()),
            Proto::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (Key::from(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&MapKey> for Key {
    fn from(key: &MapKey) -> Self {
        match key {
            MapKey::Bool(b) => Key::Bool(*b),
            MapKey::I32(i) => Key::Int(i64::from(*i)),
            MapKey::I64(i) => Key::Int(*i),
            MapKey::U32(u) => Key::Uint(u64::from(*u)),
            MapKey::U64(u) => Key::Uint(*u),
            MapKey::String(s) => Key::String(s.clone()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Bool(b) => write!(f, "{b}"),
            Key::Int(i) => write!(f, "{i}"),
            Key::Uint(u) => write!(f, "{u}"),
            Key::String(s) => f.write_str(s),
        }
    }
}

/// The textual form of a value: strings are written without quotes, timestamps in RFC 3339 and
/// durations in seconds, like `90s` or `1.5s`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Uint(u) => write!(f, "{u}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::String(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::Timestamp(t) => f.write_str(&format_timestamp(t)),
            Value::Duration(d) => f.write_str(&format_duration(d)),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Value::Message(message) => match serde_json::to_string(message) {
                Ok(json) => f.write_str(&json),
                Err(_) => f.write_str(message.descriptor().full_name()),
            },
        }
    }
}

pub(crate) fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub(crate) fn format_duration(duration: &TimeDelta) -> String {
    let sign = if *duration < TimeDelta::zero() { "-" } else { "" };
    let duration = duration.abs();
    let seconds = duration.num_seconds();
    let nanos = duration.subsec_nanos();
    if nanos == 0 {
        return format!("{sign}{seconds}s");
    }
    let fraction = format!("{nanos:09}");
    format!("{sign}{seconds}.{}s", fraction.trim_end_matches('0'))
}

/// Parses durations like `90s`, `1.5h` or `1h30m`. The units are `h`, `m`, `s`, `ms`, `us` and
/// `ns`.
pub(crate) fn parse_duration(text: &str) -> Option<TimeDelta> {
    let (negative, mut rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    if rest.is_empty() {
        return None;
    }
    let mut total = TimeDelta::zero();
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "h" => 3_600_000_000_000.0,
            "m" => 60_000_000_000.0,
            "s" => 1_000_000_000.0,
            "ms" => 1_000_000.0,
            "us" => 1_000.0,
            "ns" => 1.0,
            _ => return None,
        };
        rest = &rest[unit_len..];
        let nanos = number * nanos_per_unit;
        if !nanos.is_finite() || nanos > i64::MAX as f64 {
            return None;
        }
        total = total.checked_add(&TimeDelta::nanoseconds(nanos.round() as i64))?;
    }
    Some(if negative { -total } else { total })
}
