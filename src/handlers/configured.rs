//! Handlers declared in the config file.
//!
//! A configured importer validates with the declared rules and stores every
//! processed row in the [`RecordStore`]. A configured exporter streams those
//! records back, selected by the export filters.

use crate::io::validation::RuleSet;
use crate::models::{FieldValue, JobOptions, RowPayload};
use crate::registry::{Exporter, Importer, ItemStream};
use crate::storage::{RecordFilter, RecordStore, StoredRecord};
use anyhow::{Context, bail};
use serde_json::Value;
use std::sync::Arc;

/// Importer persisting rows as records of its type.
pub struct ConfiguredImporter {
    type_name: String,
    headers: Vec<String>,
    rules: Option<RuleSet>,
    store: Arc<RecordStore>,
}

impl ConfiguredImporter {
    /// Creates an importer; an empty rule set means no validation.
    #[must_use]
    pub fn new(
        type_name: impl Into<String>,
        headers: Vec<String>,
        rules: RuleSet,
        store: Arc<RecordStore>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            headers,
            rules: (!rules.is_empty()).then_some(rules),
            store,
        }
    }
}

impl Importer for ConfiguredImporter {
    fn headers(&self) -> Vec<String> {
        self.headers.clone()
    }

    fn rules(&self) -> Option<&RuleSet> {
        self.rules.as_ref()
    }

    fn persist(&self, payload: &RowPayload) -> anyhow::Result<()> {
        self.store
            .insert(&self.type_name, payload)
            .with_context(|| format!("storing [{}] record", self.type_name))?;
        Ok(())
    }
}

/// Exporter streaming records of its type.
///
/// Filters: `limit` caps the item count, `since` keeps records created at or
/// after a Unix timestamp, and any header name matches that field exactly.
pub struct ConfiguredExporter {
    type_name: String,
    headers: Vec<String>,
    store: Arc<RecordStore>,
}

impl ConfiguredExporter {
    /// Creates an exporter.
    #[must_use]
    pub fn new(type_name: impl Into<String>, headers: Vec<String>, store: Arc<RecordStore>) -> Self {
        Self {
            type_name: type_name.into(),
            headers,
            store,
        }
    }

    /// Turns export filters into a record selection.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed `limit`/`since` values and for keys
    /// that are neither a known filter nor a header.
    pub fn record_filter(&self, filters: &JobOptions) -> anyhow::Result<RecordFilter> {
        let mut filter = RecordFilter::default();
        for (key, value) in filters {
            match key.as_str() {
                "limit" => filter.limit = Some(unsigned(key, value)?),
                "since" => filter.since = Some(unsigned(key, value)?),
                column if self.headers.iter().any(|h| h == column) => {
                    filter.fields.insert(column.to_string(), text(value));
                },
                other => bail!("unknown export filter '{other}'"),
            }
        }
        Ok(filter)
    }
}

impl Exporter for ConfiguredExporter {
    type Item = StoredRecord;

    fn headers(&self) -> Vec<String> {
        self.headers.clone()
    }

    fn source(&self, filters: &JobOptions) -> anyhow::Result<ItemStream<'_, Self::Item>> {
        let filter = self.record_filter(filters)?;
        Ok(Box::new(
            self.store
                .scan(self.type_name.as_str(), filter)
                .map(|record| record.map_err(anyhow::Error::from)),
        ))
    }

    fn map(&self, item: &Self::Item) -> anyhow::Result<Vec<FieldValue>> {
        Ok(self
            .headers
            .iter()
            .map(|column| item.payload.get(column).into())
            .collect())
    }
}

fn unsigned(key: &str, value: &Value) -> anyhow::Result<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .with_context(|| format!("filter '{key}' must be a non-negative integer, got {value}"))
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;
    use serde_json::json;

    fn headers() -> Vec<String> {
        vec!["name".to_string(), "email".to_string(), "team".to_string()]
    }

    fn store_with(rows: &[(&str, &str, Option<&str>)]) -> Arc<RecordStore> {
        let store = Arc::new(RecordStore::in_memory().unwrap());
        let importer = ConfiguredImporter::new("people", headers(), RuleSet::new(), store.clone());
        for (name, email, team) in rows {
            let payload = RowPayload::from_record(&headers(), &[*name, *email, team.unwrap_or("")]);
            importer.persist(&payload).unwrap();
        }
        store
    }

    fn export(exporter: &ConfiguredExporter, filters: &JobOptions) -> Vec<Vec<Cell>> {
        exporter
            .source(filters)
            .unwrap()
            .map(|item| {
                exporter
                    .map(&item.unwrap())
                    .unwrap()
                    .into_iter()
                    .map(FieldValue::normalize)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_importer_rules_are_optional() {
        let store = Arc::new(RecordStore::in_memory().unwrap());
        let plain = ConfiguredImporter::new("people", headers(), RuleSet::new(), store.clone());
        assert!(plain.rules().is_none());

        let rules = RuleSet::new().rule("email", "required|email").unwrap();
        let checked = ConfiguredImporter::new("people", headers(), rules, store);
        assert!(checked.rules().is_some());
    }

    #[test]
    fn test_export_maps_in_header_order_with_nulls() {
        let store = store_with(&[("Ada", "ada@example.com", None), ("Bob", "bob@example.com", Some("ops"))]);
        let exporter = ConfiguredExporter::new("people", headers(), store);

        let rows = export(&exporter, &JobOptions::new());
        assert_eq!(
            rows,
            vec![
                vec![
                    Cell::Text("Ada".to_string()),
                    Cell::Text("ada@example.com".to_string()),
                    Cell::Null,
                ],
                vec![
                    Cell::Text("Bob".to_string()),
                    Cell::Text("bob@example.com".to_string()),
                    Cell::Text("ops".to_string()),
                ],
            ]
        );
    }

    #[test]
    fn test_filters_select_records() {
        let store = store_with(&[
            ("Ada", "a@x.io", Some("ops")),
            ("Bob", "b@x.io", Some("dev")),
            ("Cy", "c@x.io", Some("ops")),
        ]);
        let exporter = ConfiguredExporter::new("people", headers(), store);

        let mut filters = JobOptions::new();
        filters.insert("team".to_string(), json!("ops"));
        assert_eq!(export(&exporter, &filters).len(), 2);

        filters.insert("limit".to_string(), json!("1"));
        let rows = export(&exporter, &filters);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], Cell::Text("Ada".to_string()));

        let mut future = JobOptions::new();
        future.insert("since".to_string(), json!(u64::MAX / 2));
        assert!(export(&exporter, &future).is_empty());
    }

    #[test]
    fn test_bad_filters_are_errors() {
        let exporter = ConfiguredExporter::new(
            "people",
            headers(),
            Arc::new(RecordStore::in_memory().unwrap()),
        );

        let mut filters = JobOptions::new();
        filters.insert("limit".to_string(), json!("many"));
        assert!(exporter.source(&filters).is_err());

        let mut filters = JobOptions::new();
        filters.insert("colour".to_string(), json!("red"));
        let err = exporter.source(&filters).err().unwrap();
        assert!(err.to_string().contains("unknown export filter 'colour'"));
    }

    #[test]
    fn test_other_types_are_not_exported() {
        let store = store_with(&[("Ada", "a@x.io", None)]);
        let exporter = ConfiguredExporter::new("teams", headers(), store);
        assert!(export(&exporter, &JobOptions::new()).is_empty());
    }
}
