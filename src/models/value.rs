//! Field values produced by exporters and their tabular normalization.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

/// An enumerated value backed by a primitive.
///
/// Exporters hand these over as [`FieldValue::Backed`]; the generator writes
/// the backing primitive, never the variant name.
pub trait BackedEnum {
    /// Returns the underlying primitive.
    fn backing(&self) -> Cell;
}

/// A value an exporter maps out of a source item.
///
/// Rich values are allowed here; [`FieldValue::normalize`] reduces them to a
/// [`Cell`] before serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Missing value.
    Null,
    /// Boolean, written as `1`/`0`.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Text(String),
    /// Enumerated value resolved to its backing primitive.
    Backed(Cell),
    /// Point in time, written as RFC 3339.
    Timestamp(DateTime<Utc>),
    /// Any structured value, written as compact JSON.
    ///
    /// JSON booleans are written as `1`/`0` like [`FieldValue::Bool`].
    Json(serde_json::Value),
}

impl FieldValue {
    /// Wraps an enumerated value by its backing primitive.
    pub fn backed(value: &impl BackedEnum) -> Self {
        Self::Backed(value.backing())
    }

    /// Reduces the value to a transport-safe primitive.
    #[must_use]
    pub fn normalize(self) -> Cell {
        match self {
            Self::Null => Cell::Null,
            Self::Bool(b) => Cell::Int(i64::from(b)),
            Self::Int(i) => Cell::Int(i),
            Self::Float(f) => Cell::Float(f),
            Self::Text(s) => Cell::Text(s),
            Self::Backed(cell) => cell,
            Self::Timestamp(ts) => Cell::Text(ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Self::Json(serde_json::Value::Null) => Cell::Null,
            Self::Json(serde_json::Value::String(s)) => Cell::Text(s),
            Self::Json(serde_json::Value::Bool(b)) => Cell::Int(i64::from(b)),
            Self::Json(value) => Cell::Text(value.to_string()),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A transport-safe primitive written into one CSV field.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Empty field.
    Null,
    /// Integer field.
    Int(i64),
    /// Floating point field.
    Float(f64),
    /// Text field.
    Text(String),
}

impl Cell {
    /// Returns the field text; empty for null.
    #[must_use]
    pub fn to_field(&self) -> String {
        self.to_string()
    }

    /// Returns true for [`Cell::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Clone, Copy)]
    enum Tier {
        Gold,
        Silver,
    }

    impl BackedEnum for Tier {
        fn backing(&self) -> Cell {
            match self {
                Self::Gold => Cell::Text("gold".to_string()),
                Self::Silver => Cell::Int(2),
            }
        }
    }

    #[test]
    fn test_booleans_become_integers() {
        assert_eq!(FieldValue::from(true).normalize(), Cell::Int(1));
        assert_eq!(FieldValue::from(false).normalize(), Cell::Int(0));
        assert_eq!(
            FieldValue::from(serde_json::json!(true)).normalize(),
            Cell::Int(1)
        );
        assert_eq!(
            FieldValue::from(serde_json::json!(false)).normalize(),
            Cell::Int(0)
        );
    }

    #[test]
    fn test_backed_enum_resolves_to_primitive() {
        assert_eq!(
            FieldValue::backed(&Tier::Gold).normalize(),
            Cell::Text("gold".to_string())
        );
        assert_eq!(FieldValue::backed(&Tier::Silver).normalize(), Cell::Int(2));
    }

    #[test]
    fn test_null_passes_through() {
        assert_eq!(FieldValue::Null.normalize(), Cell::Null);
        assert_eq!(FieldValue::from(None::<String>).normalize(), Cell::Null);
        assert_eq!(
            FieldValue::Json(serde_json::Value::Null).normalize(),
            Cell::Null
        );
    }

    #[test]
    fn test_rich_values_become_text() {
        let ts = Utc.with_ymd_and_hms(2025, 9, 11, 8, 30, 0).unwrap();
        assert_eq!(
            FieldValue::from(ts).normalize(),
            Cell::Text("2025-09-11T08:30:00Z".to_string())
        );
        assert_eq!(
            FieldValue::from(serde_json::json!({"a": [1, 2]})).normalize(),
            Cell::Text(r#"{"a":[1,2]}"#.to_string())
        );
        assert_eq!(
            FieldValue::from(serde_json::json!("plain")).normalize(),
            Cell::Text("plain".to_string())
        );
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Null.to_field(), "");
        assert_eq!(Cell::Int(-4).to_field(), "-4");
        assert_eq!(Cell::Float(1.5).to_field(), "1.5");
        assert_eq!(Cell::Text("x,y".to_string()).to_field(), "x,y");
    }
}
