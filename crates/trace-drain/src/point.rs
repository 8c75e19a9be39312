//! Destination-side time-series point and its line protocol encoding

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::error::{DrainError, Result};

/// A field value of a point
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl FieldValue {
    /// Get the string value, if this is a string field
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer value, if this is an integer field
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// One tagged, timestamped observation.
///
/// Tags and fields are kept in sorted maps so the encoded line is stable,
/// which is also the order InfluxDB prefers for tags.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp: DateTime<Utc>,
}

impl TimeSeriesPoint {
    /// Build a point.
    ///
    /// Fails when the measurement is empty, there are no fields, or a tag or
    /// field key is empty. Empty tag values are dropped since the protocol
    /// cannot carry them.
    pub fn new(
        measurement: impl Into<String>,
        tags: BTreeMap<String, String>,
        fields: BTreeMap<String, FieldValue>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let measurement = measurement.into();
        if measurement.is_empty() {
            return Err(DrainError::point("measurement name is empty"));
        }
        if fields.is_empty() {
            return Err(DrainError::point("point has no fields"));
        }
        if tags.keys().chain(fields.keys()).any(|k| k.is_empty()) {
            return Err(DrainError::point("empty tag or field key"));
        }
        if timestamp.timestamp_nanos_opt().is_none() {
            return Err(DrainError::point(format!(
                "timestamp {} is outside the nanosecond range",
                timestamp
            )));
        }

        let tags = tags.into_iter().filter(|(_, v)| !v.is_empty()).collect();

        Ok(Self {
            measurement,
            tags,
            fields,
            timestamp,
        })
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Append this point as one line of line protocol (with trailing newline)
    pub fn write_line(&self, out: &mut String) {
        escape_into(out, &self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            out.push(',');
            escape_into(out, key, &[',', '=', ' ']);
            out.push('=');
            escape_into(out, value, &[',', '=', ' ']);
        }

        let mut first = true;
        for (key, value) in &self.fields {
            out.push(if first { ' ' } else { ',' });
            first = false;
            escape_into(out, key, &[',', '=', ' ']);
            out.push('=');
            match value {
                FieldValue::Integer(i) => {
                    let _ = write!(out, "{}i", i);
                }
                FieldValue::Float(f) => {
                    let _ = write!(out, "{}", f);
                }
                FieldValue::Boolean(b) => {
                    out.push_str(if *b { "true" } else { "false" });
                }
                FieldValue::String(s) => {
                    out.push('"');
                    for c in s.chars() {
                        if c == '"' || c == '\\' {
                            out.push('\\');
                        }
                        out.push(c);
                    }
                    out.push('"');
                }
            }
        }

        // checked in new()
        let nanos = self.timestamp.timestamp_nanos_opt().unwrap_or_default();
        let _ = writeln!(out, " {}", nanos);
    }

    /// Encode this point as a single line
    pub fn to_line(&self) -> String {
        let mut out = String::new();
        self.write_line(&mut out);
        out
    }
}

/// Encode points as a line protocol body
pub fn encode_lines<'a>(points: impl IntoIterator<Item = &'a TimeSeriesPoint>) -> String {
    let mut out = String::new();
    for point in points {
        point.write_line(&mut out);
    }
    out
}

fn escape_into(out: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn fields(pairs: Vec<(&str, FieldValue)>) -> BTreeMap<String, FieldValue> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_line_encoding() {
        let point = TimeSeriesPoint::new(
            "sessions",
            tags(&[("type", "SELECT"), ("client", "10.0.0.1")]),
            fields(vec![
                ("duration", FieldValue::Integer(42)),
                ("request", "SELECT * FROM x".into()),
            ]),
            ts(),
        )
        .unwrap();

        assert_eq!(
            point.to_line(),
            "sessions,client=10.0.0.1,type=SELECT duration=42i,request=\"SELECT * FROM x\" 1700000000000000000\n"
        );
    }

    #[test]
    fn test_escaping() {
        let point = TimeSeriesPoint::new(
            "my sessions",
            tags(&[("command", "a,b=c d")]),
            fields(vec![("parameters", r#"{"q":"it\s"}"#.into())]),
            ts(),
        )
        .unwrap();

        assert_eq!(
            point.to_line(),
            "my\\ sessions,command=a\\,b\\=c\\ d parameters=\"{\\\"q\\\":\\\"it\\\\s\\\"}\" 1700000000000000000\n"
        );
    }

    #[test]
    fn test_empty_tag_values_dropped() {
        let point = TimeSeriesPoint::new(
            "sessions",
            tags(&[("client", ""), ("type", "INSERT")]),
            fields(vec![("duration", FieldValue::Integer(1))]),
            ts(),
        )
        .unwrap();

        assert!(point.tag("client").is_none());
        assert_eq!(point.tag("type"), Some("INSERT"));
    }

    #[test]
    fn test_invalid_points() {
        let f = fields(vec![("duration", FieldValue::Integer(1))]);

        assert!(TimeSeriesPoint::new("", BTreeMap::new(), f.clone(), ts()).is_err());
        assert!(TimeSeriesPoint::new("m", BTreeMap::new(), BTreeMap::new(), ts()).is_err());
        assert!(TimeSeriesPoint::new("m", tags(&[("", "x")]), f, ts()).is_err());
    }

    #[test]
    fn test_encode_lines() {
        let a = TimeSeriesPoint::new(
            "m",
            BTreeMap::new(),
            fields(vec![("ok", FieldValue::Boolean(true))]),
            ts(),
        )
        .unwrap();
        let body = encode_lines([&a, &a]);
        assert_eq!(body.lines().count(), 2);
        assert!(body.ends_with('\n'));
    }
}
