//! Type registry: logical type name → import/export capability.
//!
//! The registry is assembled once at startup through [`TypeRegistryBuilder`],
//! which rejects malformed bundles, and is read-only afterwards.

mod capability;

pub use capability::{ErasedExporter, Exporter, Importer, ItemStream};

use crate::models::Direction;
use crate::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// A resolved capability.
#[derive(Clone)]
pub enum Capability {
    /// Import side.
    Import(Arc<dyn Importer>),
    /// Export side.
    Export(Arc<dyn ErasedExporter>),
}

impl Capability {
    /// Returns the header schema.
    #[must_use]
    pub fn headers(&self) -> Vec<String> {
        match self {
            Self::Import(importer) => importer.headers(),
            Self::Export(exporter) => exporter.headers(),
        }
    }
}

/// Registry of importers and exporters keyed by type name.
#[derive(Default, Clone)]
pub struct TypeRegistry {
    importers: BTreeMap<String, Arc<dyn Importer>>,
    exporters: BTreeMap<String, Arc<dyn ErasedExporter>>,
}

impl TypeRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// Resolves the capability for a type and direction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRegistered`] if nothing is registered.
    pub fn resolve(&self, type_name: &str, direction: Direction) -> Result<Capability> {
        match direction {
            Direction::Import => self.resolve_importer(type_name).map(Capability::Import),
            Direction::Export => self.resolve_exporter(type_name).map(Capability::Export),
        }
    }

    /// Resolves the importer for a type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRegistered`] if no importer is registered.
    pub fn resolve_importer(&self, type_name: &str) -> Result<Arc<dyn Importer>> {
        self.importers
            .get(type_name)
            .cloned()
            .ok_or_else(|| not_registered(type_name, Direction::Import))
    }

    /// Resolves the exporter for a type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRegistered`] if no exporter is registered.
    pub fn resolve_exporter(&self, type_name: &str) -> Result<Arc<dyn ErasedExporter>> {
        self.exporters
            .get(type_name)
            .cloned()
            .ok_or_else(|| not_registered(type_name, Direction::Export))
    }

    /// Returns true if the type is registered for the direction.
    #[must_use]
    pub fn supports(&self, type_name: &str, direction: Direction) -> bool {
        match direction {
            Direction::Import => self.importers.contains_key(type_name),
            Direction::Export => self.exporters.contains_key(type_name),
        }
    }

    /// Lists registered type names for a direction, sorted.
    #[must_use]
    pub fn types(&self, direction: Direction) -> Vec<&str> {
        match direction {
            Direction::Import => self.importers.keys().map(String::as_str).collect(),
            Direction::Export => self.exporters.keys().map(String::as_str).collect(),
        }
    }
}

fn not_registered(type_name: &str, direction: Direction) -> Error {
    Error::NotRegistered {
        type_name: type_name.to_string(),
        direction,
    }
}

/// Collects capability bundles and validates them on [`build`](Self::build).
#[derive(Default)]
pub struct TypeRegistryBuilder {
    importers: Vec<(String, Arc<dyn Importer>)>,
    exporters: Vec<(String, Arc<dyn ErasedExporter>)>,
}

impl TypeRegistryBuilder {
    /// Registers an importer.
    #[must_use]
    pub fn importer(self, type_name: impl Into<String>, importer: impl Importer + 'static) -> Self {
        self.shared_importer(type_name, Arc::new(importer))
    }

    /// Registers an already shared importer.
    #[must_use]
    pub fn shared_importer(
        mut self,
        type_name: impl Into<String>,
        importer: Arc<dyn Importer>,
    ) -> Self {
        self.importers.push((type_name.into(), importer));
        self
    }

    /// Registers an exporter.
    #[must_use]
    pub fn exporter<E>(self, type_name: impl Into<String>, exporter: E) -> Self
    where
        E: Exporter + 'static,
        E::Item: 'static,
    {
        self.shared_exporter(type_name, Arc::new(exporter))
    }

    /// Registers an already shared exporter.
    #[must_use]
    pub fn shared_exporter(
        mut self,
        type_name: impl Into<String>,
        exporter: Arc<dyn ErasedExporter>,
    ) -> Self {
        self.exporters.push((type_name.into(), exporter));
        self
    }

    /// Validates every bundle and builds the registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapability`] for:
    /// - a blank type name
    /// - an empty header schema, blank or duplicate header names
    /// - rules naming a column outside the header schema
    /// - a type registered twice for the same direction
    pub fn build(self) -> Result<TypeRegistry> {
        let mut registry = TypeRegistry::default();

        for (type_name, importer) in self.importers {
            let headers = importer.headers();
            check_bundle(&type_name, Direction::Import, &headers)?;
            if let Some(rules) = importer.rules()
                && let Some(column) = rules.columns().find(|c| !headers.iter().any(|h| h == c))
            {
                return Err(invalid(
                    &type_name,
                    Direction::Import,
                    format!("rule set names unknown column '{column}'"),
                ));
            }
            if registry.importers.contains_key(&type_name) {
                return Err(invalid(&type_name, Direction::Import, "registered twice"));
            }
            tracing::debug!(type_name = %type_name, "registered importer");
            registry.importers.insert(type_name, importer);
        }

        for (type_name, exporter) in self.exporters {
            check_bundle(&type_name, Direction::Export, &exporter.headers())?;
            if registry.exporters.contains_key(&type_name) {
                return Err(invalid(&type_name, Direction::Export, "registered twice"));
            }
            tracing::debug!(type_name = %type_name, "registered exporter");
            registry.exporters.insert(type_name, exporter);
        }

        Ok(registry)
    }
}

fn check_bundle(type_name: &str, direction: Direction, headers: &[String]) -> Result<()> {
    if type_name.trim().is_empty() {
        return Err(invalid(type_name, direction, "type name is blank"));
    }
    if headers.is_empty() {
        return Err(invalid(type_name, direction, "header schema is empty"));
    }
    if headers.iter().any(|h| h.trim().is_empty()) {
        return Err(invalid(type_name, direction, "header schema has a blank name"));
    }

    let mut seen = HashSet::new();
    if let Some(duplicate) = headers.iter().find(|h| !seen.insert(h.as_str())) {
        return Err(invalid(
            type_name,
            direction,
            format!("duplicate header '{duplicate}'"),
        ));
    }

    Ok(())
}

fn invalid(type_name: &str, direction: Direction, reason: impl Into<String>) -> Error {
    Error::InvalidCapability {
        type_name: type_name.to_string(),
        direction,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::validation::RuleSet;
    use crate::models::{FieldValue, JobOptions};

    struct Contacts {
        headers: Vec<&'static str>,
        rules: Option<RuleSet>,
    }

    impl Contacts {
        fn new(headers: &[&'static str]) -> Self {
            Self {
                headers: headers.to_vec(),
                rules: None,
            }
        }
    }

    impl Importer for Contacts {
        fn headers(&self) -> Vec<String> {
            self.headers.iter().map(ToString::to_string).collect()
        }

        fn rules(&self) -> Option<&RuleSet> {
            self.rules.as_ref()
        }
    }

    struct Numbers;

    impl Exporter for Numbers {
        type Item = i64;

        fn headers(&self) -> Vec<String> {
            vec!["n".to_string()]
        }

        fn source(&self, _filters: &JobOptions) -> anyhow::Result<ItemStream<'_, i64>> {
            Ok(Box::new((1..=3).map(Ok)))
        }

        fn map(&self, item: &i64) -> anyhow::Result<Vec<FieldValue>> {
            Ok(vec![FieldValue::Int(*item)])
        }
    }

    #[test]
    fn test_resolve_registered_types() {
        let registry = TypeRegistry::builder()
            .importer("contacts", Contacts::new(&["name", "email"]))
            .exporter("numbers", Numbers)
            .build()
            .unwrap();

        assert!(registry.resolve_importer("contacts").is_ok());
        assert!(registry.resolve("numbers", Direction::Export).is_ok());
        assert_eq!(
            registry
                .resolve("contacts", Direction::Import)
                .unwrap()
                .headers(),
            ["name", "email"]
        );
        assert!(registry.supports("numbers", Direction::Export));
        assert!(!registry.supports("numbers", Direction::Import));
        assert_eq!(registry.types(Direction::Import), ["contacts"]);
    }

    #[test]
    fn test_unknown_type_not_registered() {
        let registry = TypeRegistry::builder().build().unwrap();
        let err = registry.resolve_importer("ghost").err().unwrap();
        assert!(matches!(
            err,
            Error::NotRegistered {
                direction: Direction::Import,
                ..
            }
        ));
        assert!(matches!(
            registry.resolve("ghost", Direction::Export),
            Err(Error::NotRegistered { .. })
        ));
    }

    #[test]
    fn test_erased_exporter_maps_items() {
        let rows: Vec<_> = ErasedExporter::rows(&Numbers, &JobOptions::new())
            .unwrap()
            .map(std::result::Result::unwrap)
            .collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], vec![FieldValue::Int(3)]);
    }

    #[test]
    fn test_rejects_malformed_bundles() {
        let cases = [
            Contacts::new(&[]),
            Contacts::new(&["name", " "]),
            Contacts::new(&["name", "name"]),
            Contacts {
                headers: vec!["name"],
                rules: Some(RuleSet::new().rule("email", "required").unwrap()),
            },
        ];

        for importer in cases {
            let result = TypeRegistry::builder().importer("contacts", importer).build();
            assert!(matches!(result, Err(Error::InvalidCapability { .. })));
        }
    }

    #[test]
    fn test_rejects_duplicate_registration() {
        let result = TypeRegistry::builder()
            .importer("contacts", Contacts::new(&["name"]))
            .importer("contacts", Contacts::new(&["name"]))
            .build();
        assert!(matches!(result, Err(Error::InvalidCapability { .. })));

        let result = TypeRegistry::builder()
            .importer("contacts", Contacts::new(&["name"]))
            .exporter("contacts", Numbers)
            .build();
        assert!(result.is_ok());
    }
}
