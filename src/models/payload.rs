//! Column-to-value mapping read from one import record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping of column name to raw field value.
///
/// Empty strings are normalized to `None` when a payload is built from a
/// source record, so "absent" and "empty" are indistinguishable downstream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowPayload(BTreeMap<String, Option<String>>);

impl RowPayload {
    /// Creates an empty payload.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Pairs header names with record fields.
    ///
    /// Fields without a matching header (or headers without a field) are
    /// left out; callers compare lengths first when that matters.
    #[must_use]
    pub fn from_record<H, F>(headers: &[H], fields: &[F]) -> Self
    where
        H: AsRef<str>,
        F: AsRef<str>,
    {
        let map = headers
            .iter()
            .zip(fields)
            .map(|(header, field)| (header.as_ref().to_string(), normalize(field.as_ref())))
            .collect();
        Self(map)
    }

    /// Returns the value for a column; `None` for null or missing columns.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).and_then(Option::as_deref)
    }

    /// Returns true if the column is present (even if null).
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    /// Sets a column value; empty strings become `None`.
    pub fn insert(&mut self, column: impl Into<String>, value: Option<String>) {
        let value = value.and_then(|v| if v.is_empty() { None } else { Some(v) });
        self.0.insert(column.into(), value);
    }

    /// Removes a column, returning its value.
    pub fn remove(&mut self, column: &str) -> Option<String> {
        self.0.remove(column).flatten()
    }

    /// Iterates over columns in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the payload has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serializes the payload as a JSON object string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(&self.0).map_err(|e| crate::Error::operation("serialize_payload", e))
    }

    /// Parses a payload from a JSON object string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not an object of strings and nulls.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json)
            .map(Self)
            .map_err(|e| crate::Error::operation("deserialize_payload", e))
    }
}

impl FromIterator<(String, Option<String>)> for RowPayload {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        let mut payload = Self::new();
        for (column, value) in iter {
            payload.insert(column, value);
        }
        payload
    }
}

fn normalize(field: &str) -> Option<String> {
    if field.is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}
