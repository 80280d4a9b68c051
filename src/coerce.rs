//! Lenient field decoders for snapshot records.
//!
//! The dashboard data comes from a backend that is loose about types: amounts
//! arrive as numbers or strings, dates in several shapes, and collections can
//! contain junk. Nothing here ever returns an error for bad values; a bad
//! number is 0, a bad date is absent, a bad collection element is dropped.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;
use tracing::warn;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Non-negative monetary amount; anything unusable is 0.
pub fn amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(amount_from_value(&value))
}

/// Non-negative integer count, truncated from whatever number was sent.
pub fn count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(amount_from_value(&value) as u64)
}

pub fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(raw) => parse_timestamp(&raw),
        Value::Number(millis) => millis
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|ts| ts.fixed_offset()),
        _ => None,
    })
}

pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(raw) => Some(raw),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    })
}

/// Same as [`text`] but collapses absent values into an empty string.
pub fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text(deserializer)?.unwrap_or_default())
}

/// Types that accept a backend alias next to their own field name. When a
/// payload carries both, the field name wins and the alias is discarded.
pub trait Aliased {
    /// `(field name, alias)` pairs.
    const ALIASES: &'static [(&'static str, &'static str)] = &[];
}

/// Decode a JSON object, dropping any alias whose field name is also present.
pub fn decode<T>(mut value: Value) -> Result<T, serde_json::Error>
where
    T: DeserializeOwned + Aliased,
{
    if let Value::Object(fields) = &mut value {
        for (name, alias) in T::ALIASES {
            if fields.contains_key(*name) {
                fields.remove(*alias);
            }
        }
    }
    serde_json::from_value(value)
}

/// A collection of records. Elements that fail to decode are logged and
/// dropped; a non-array value is treated as an empty collection.
pub fn records<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Aliased,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        if !value.is_null() {
            warn!("expected a list of records, ignoring value");
        }
        return Ok(Vec::new());
    };

    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match decode(item) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(index, "dropping malformed record: {err}");
                None
            }
        })
        .collect())
}

pub fn object_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Aliased + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(decode(value).unwrap_or_default())
}

pub fn amount_from_value(value: &Value) -> f64 {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(number) if number.is_finite() && number >= 0.0 => number,
        _ => 0.0,
    }
}

/// RFC 3339 keeps its offset; naive date-times and bare dates are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn amount_accepts_numbers_and_numeric_strings() {
        assert_eq!(amount_from_value(&json!(1500.5)), 1500.5);
        assert_eq!(amount_from_value(&json!(" 200 ")), 200.0);
        assert_eq!(amount_from_value(&json!(7)), 7.0);
    }

    #[test]
    fn amount_rejects_garbage_as_zero() {
        assert_eq!(amount_from_value(&Value::Null), 0.0);
        assert_eq!(amount_from_value(&json!("abc")), 0.0);
        assert_eq!(amount_from_value(&json!("NaN")), 0.0);
        assert_eq!(amount_from_value(&json!("inf")), 0.0);
        assert_eq!(amount_from_value(&json!(-40)), 0.0);
        assert_eq!(amount_from_value(&json!({ "value": 3 })), 0.0);
    }

    #[test]
    fn timestamp_keeps_explicit_offset() {
        let ts = parse_timestamp("2026-03-01T23:30:00-03:00").expect("valid");
        assert_eq!(ts.date_naive().to_string(), "2026-03-01");
        assert_eq!(ts.offset().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn timestamp_reads_naive_values_as_utc() {
        let ts = parse_timestamp("2026-03-01T10:15:00.123456").expect("valid");
        assert_eq!(ts.offset().local_minus_utc(), 0);
        assert_eq!(ts.date_naive().to_string(), "2026-03-01");

        let spaced = parse_timestamp("2026-03-01 10:15:00").expect("valid");
        assert_eq!(spaced, parse_timestamp("2026-03-01T10:15:00Z").unwrap());

        let date_only = parse_timestamp("2026-03-01").expect("valid");
        assert_eq!(date_only, parse_timestamp("2026-03-01T00:00:00Z").unwrap());
    }

    #[test]
    fn timestamp_rejects_unparseable_text() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2026-13-40").is_none());
    }
}
