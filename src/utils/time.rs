//! Timestamp helpers for `#[serde(with = ...)]` and the dashboard.

use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// Serialize an OffsetDateTime into an RFC 3339 formatted string
pub fn serialize<S>(datetime: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = datetime
        .format(&Rfc3339)
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&s)
}

/// Forgiving optional timestamps for records written by other clients.
///
/// Accepts RFC 3339, ISO 8601 without an offset (read as UTC), a bare date,
/// and milliseconds since the epoch.  Anything else reads as `None`.
pub mod lenient {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Millis(f64),
        Other(serde::de::IgnoredAny),
    }

    /// Deserialize a timestamp in any of the accepted shapes.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let parsed = match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Text(text)) => parse(&text),
            Some(Raw::Millis(millis)) => from_millis(millis),
            Some(Raw::Other(_)) | None => None,
        };
        Ok(parsed)
    }

    /// Parse one textual timestamp.
    pub fn parse(text: &str) -> Option<OffsetDateTime> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Ok(datetime) = OffsetDateTime::parse(text, &Rfc3339) {
            return Some(datetime);
        }
        let local = [
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"),
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"),
        ];
        for format in local {
            if let Ok(datetime) = PrimitiveDateTime::parse(text, format) {
                return Some(datetime.assume_utc());
            }
        }
        if let Ok(date) = Date::parse(text, format_description!("[year]-[month]-[day]")) {
            return Some(date.midnight().assume_utc());
        }
        tracing::debug!(timestamp = text, "ignoring unparsable timestamp");
        None
    }

    /// Serialize an optional OffsetDateTime as an RFC 3339 string or `null`.
    pub fn serialize<S>(datetime: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match datetime {
            Some(datetime) => super::serialize(datetime, serializer),
            None => serializer.serialize_none(),
        }
    }

    fn from_millis(millis: f64) -> Option<OffsetDateTime> {
        if !millis.is_finite() {
            return None;
        }
        OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000).ok()
    }
}

/// Format a timestamp as a calendar date, e.g. `2025-03-14`.
pub fn format_date(datetime: &OffsetDateTime) -> String {
    let date = datetime.date();
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}
