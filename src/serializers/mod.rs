//! Translation between wire JSON and internal records.
//!
//! Inputs arrive as raw `serde_json::Value`s so that a value of the wrong type is
//! reported as a `CastError` at its path instead of a generic body rejection.

pub mod tasks;
pub mod users;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::error::AppError;
use crate::models::schema::CastFailure;

pub use tasks::TasksSerializer;
pub use users::{UserRecord, UsersSerializer};

/// Converts between a resource's wire representation and its records.
pub trait Serializer {
    /// What `serialize_output` presents.
    type Record;
    /// What `serialize_input` produces: cast, not yet validated, fields.
    type Input;

    fn serialize_input(&self, raw: &Value, is_create: bool) -> Result<Self::Input, AppError>;

    fn serialize_output(&self, record: &Self::Record) -> Value;
}

/// Looks up `path` (dot-separated) in a JSON object, treating `null` as absent.
pub(crate) fn lookup<'a>(raw: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(raw, |value, key| value.get(key))
        .filter(|value| !value.is_null())
}

/// Reads a string field. Numbers and booleans are accepted and stringified.
pub(crate) fn string_field(raw: &Value, path: &str) -> Result<Option<String>, CastFailure> {
    match lookup(raw, path) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(value @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(value.to_string())),
        Some(other) => Err(CastFailure::new("string", other.to_string(), path)),
    }
}

/// Reads a date field given as RFC 3339, `YYYY-MM-DD`, or epoch milliseconds.
pub(crate) fn date_field(raw: &Value, path: &str) -> Result<Option<DateTime<Utc>>, CastFailure> {
    match lookup(raw, path) {
        None => Ok(None),
        Some(Value::String(value)) => parse_date(value)
            .map(Some)
            .ok_or_else(|| CastFailure::new("date", value.clone(), path)),
        Some(Value::Number(millis)) => millis
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .map(Some)
            .ok_or_else(|| CastFailure::new("date", millis.to_string(), path)),
        Some(other) => Err(CastFailure::new("date", other.to_string(), path)),
    }
}

/// Reads a list of strings. A lone string becomes a one-element list.
pub(crate) fn string_list_field(
    raw: &Value,
    path: &str,
) -> Result<Option<Vec<String>>, CastFailure> {
    match lookup(raw, path) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(vec![value.clone()])),
        Some(Value::Array(values)) => values
            .iter()
            .map(|value| match value {
                Value::String(value) => Ok(value.clone()),
                Value::Number(_) | Value::Bool(_) => Ok(value.to_string()),
                other => Err(CastFailure::new("[string]", other.to_string(), path)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(CastFailure::new("[string]", other.to_string(), path)),
    }
}

/// Parses RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
