//! Capability traits implemented per logical type.
//!
//! Handler code reports failures with [`anyhow::Result`], so any error type
//! can surface; its display text becomes the row or job diagnostic.

use crate::io::validation::RuleSet;
use crate::models::{FieldValue, JobOptions, RowPayload};

/// Lazy, finite sequence produced by an exporter.
pub type ItemStream<'a, T> = Box<dyn Iterator<Item = anyhow::Result<T>> + 'a>;

/// Import capability for one logical type.
///
/// Only [`Importer::headers`] is required. The remaining members default to
/// no validation, identity transform and no persistence.
pub trait Importer: Send + Sync {
    /// Ordered header schema the source must match exactly.
    fn headers(&self) -> Vec<String>;

    /// Validation rules applied to each row.
    fn rules(&self) -> Option<&RuleSet> {
        None
    }

    /// Reshapes a validated row before persistence.
    ///
    /// # Errors
    ///
    /// Any error fails the row with its message.
    fn transform(&self, payload: RowPayload) -> anyhow::Result<RowPayload> {
        Ok(payload)
    }

    /// Persists a transformed row.
    ///
    /// # Errors
    ///
    /// Any error fails the row with its message.
    fn persist(&self, _payload: &RowPayload) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Export capability for one logical type.
pub trait Exporter: Send + Sync {
    /// Source item type.
    type Item;

    /// Ordered header schema written as the first row.
    fn headers(&self) -> Vec<String>;

    /// Produces source items for the given filter map.
    ///
    /// # Errors
    ///
    /// An error here fails the export before any row is written.
    fn source(&self, filters: &JobOptions) -> anyhow::Result<ItemStream<'_, Self::Item>>;

    /// Maps one item to field values in header order.
    ///
    /// # Errors
    ///
    /// Any error fails the export.
    fn map(&self, item: &Self::Item) -> anyhow::Result<Vec<FieldValue>>;
}

/// Object-safe view of an [`Exporter`] yielding mapped rows.
///
/// Implemented for every exporter; the registry stores exporters behind this
/// trait so types with different item types can share one map.
pub trait ErasedExporter: Send + Sync {
    /// Ordered header schema.
    fn headers(&self) -> Vec<String>;

    /// Produces mapped rows for the given filter map.
    ///
    /// # Errors
    ///
    /// Returns the producer's error.
    fn rows(&self, filters: &JobOptions) -> anyhow::Result<ItemStream<'_, Vec<FieldValue>>>;
}

impl<E> ErasedExporter for E
where
    E: Exporter,
    E::Item: 'static,
{
    fn headers(&self) -> Vec<String> {
        Exporter::headers(self)
    }

    fn rows(&self, filters: &JobOptions) -> anyhow::Result<ItemStream<'_, Vec<FieldValue>>> {
        let items = self.source(filters)?;
        Ok(Box::new(
            items.map(move |item| item.and_then(|item| Exporter::map(self, &item))),
        ))
    }
}
