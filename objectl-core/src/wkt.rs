//! Conversions for the Protobuf well-known types that get special treatment.
use chrono::{DateTime, TimeDelta, Utc};
use prost_reflect::{DynamicMessage, ReflectMessage, Value};
use std::borrow::Cow;

pub(crate) const TIMESTAMP: &str = "google.protobuf.Timestamp";
pub(crate) const DURATION: &str = "google.protobuf.Duration";

/// Wrapper types, they are replaced by their `value` field.
pub(crate) const WRAPPERS: &[&str] = &[
    "google.protobuf.BoolValue",
    "google.protobuf.BytesValue",
    "google.protobuf.DoubleValue",
    "google.protobuf.FloatValue",
    "google.protobuf.Int32Value",
    "google.protobuf.Int64Value",
    "google.protobuf.StringValue",
    "google.protobuf.UInt32Value",
    "google.protobuf.UInt64Value",
];

fn seconds_and_nanos(message: &DynamicMessage) -> (i64, i32) {
    let seconds = message
        .get_field_by_name("seconds")
        .and_then(|v| v.as_i64())
        .unwrap_or_default();
    let nanos = message
        .get_field_by_name("nanos")
        .and_then(|v| v.as_i32())
        .unwrap_or_default();
    (seconds, nanos)
}

/// Converts a `google.protobuf.Timestamp` message. Returns `None` for other message types or
/// for values out of the supported range.
pub(crate) fn timestamp(message: &DynamicMessage) -> Option<DateTime<Utc>> {
    if message.descriptor().full_name() != TIMESTAMP {
        return None;
    }
    let (seconds, nanos) = seconds_and_nanos(message);
    DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
}

/// Converts a `google.protobuf.Duration` message.
pub(crate) fn duration(message: &DynamicMessage) -> Option<TimeDelta> {
    if message.descriptor().full_name() != DURATION {
        return None;
    }
    let (seconds, nanos) = seconds_and_nanos(message);
    TimeDelta::try_seconds(seconds)?.checked_add(&TimeDelta::nanoseconds(i64::from(nanos)))
}

/// Returns the content of a wrapper message, `None` for other message types.
pub(crate) fn unwrap(message: &DynamicMessage) -> Option<Cow<'_, Value>> {
    if !WRAPPERS.contains(&message.descriptor().full_name()) {
        return None;
    }
    message.get_field_by_name("value")
}
