//! Export generator.
//!
//! Creates the export job up front, streams the exporter's items into a
//! BOM-prefixed CSV buffer, persists it on the configured disk and finalizes
//! the job. Any failure after job creation marks the job failed and is
//! returned to the caller.

use crate::io::formats::CsvExportSink;
use crate::models::{Cell, FieldValue, Finalization, Job, JobOptions, NewJob, RowCounts};
use crate::observability::metrics;
use crate::registry::ErasedExporter;
use crate::storage::{DeliveryHandle, Disk, Ledger};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::io::{self, Write};
use std::sync::Arc;
use tracing::instrument;

/// Default directory for generated artifacts.
pub const DEFAULT_EXPORT_DIR: &str = "ie/exports";

/// A generated export file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    /// The finalized export job.
    pub job: Job,
    /// Client-facing file name.
    pub name: String,
    /// Path on the disk.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    /// Delivery policy for the artifact.
    pub delivery: DeliveryHandle,
}

/// Failure part-way through generation.
struct Interrupted {
    counts: RowCounts,
    cause: String,
}

impl Interrupted {
    fn new(counts: RowCounts, cause: impl Into<String>) -> Self {
        Self {
            counts,
            cause: cause.into(),
        }
    }
}

/// Generates export artifacts onto one disk.
pub struct ExportGenerator {
    ledger: Arc<dyn Ledger>,
    disk: Arc<dyn Disk>,
    export_dir: String,
}

impl ExportGenerator {
    /// Creates a generator writing under [`DEFAULT_EXPORT_DIR`].
    #[must_use]
    pub fn new(ledger: Arc<dyn Ledger>, disk: Arc<dyn Disk>) -> Self {
        Self {
            ledger,
            disk,
            export_dir: DEFAULT_EXPORT_DIR.to_string(),
        }
    }

    /// Overrides the artifact directory.
    #[must_use]
    pub fn with_export_dir(mut self, dir: impl Into<String>) -> Self {
        self.export_dir = dir.into();
        self
    }

    /// Returns the artifact file name for a type at a point in time.
    #[must_use]
    pub fn artifact_name(type_name: &str, at: DateTime<Utc>) -> String {
        format!("{type_name}_export_{}.csv", at.format("%Y%m%d_%H%M%S"))
    }

    /// Runs an export.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExportFailed`] if producing, mapping, serializing or
    /// persisting fails; the job is finalized as failed first. Ledger errors
    /// while creating or completing the job are returned as they are.
    #[instrument(
        name = "tabport.export.generate",
        skip(self, exporter, filters, owner),
        fields(job.type_name = %type_name)
    )]
    pub fn generate(
        &self,
        type_name: &str,
        exporter: &dyn ErasedExporter,
        filters: JobOptions,
        owner: Option<String>,
    ) -> Result<ExportArtifact> {
        let name = Self::artifact_name(type_name, Utc::now());
        let path = format!("{}/{name}", self.export_dir.trim_end_matches('/'));

        let job = self.ledger.create_job(
            NewJob::export(type_name, self.disk.name())
                .with_original_name(name.clone())
                .with_options(filters.clone())
                .with_owner(owner),
        )?;
        tracing::info!(job.id = %job.id, %path, "export started");

        match self.write_artifact(exporter, &filters, &path) {
            Ok((counts, size)) => {
                let job = self.ledger.finalize_job(
                    &job.id,
                    Finalization::from_counts(counts).with_artifact(path.clone(), size),
                )?;
                metrics::record_job(job.direction, job.status);
                metrics::record_export_rows(counts.total);
                tracing::info!(job.id = %job.id, rows = counts.total, size, "export finished");

                Ok(ExportArtifact {
                    delivery: self.disk.delivery_handle(&path),
                    job,
                    name,
                    path,
                    size,
                })
            },
            Err(interrupted) => {
                tracing::warn!(
                    job.id = %job.id,
                    rows_written = interrupted.counts.total,
                    cause = %interrupted.cause,
                    "export failed"
                );
                let finalized = self.ledger.finalize_job(&job.id, Finalization::failed());
                if let Err(e) = &finalized {
                    tracing::error!(job.id = %job.id, error = %e, "could not mark export failed");
                }
                metrics::record_job(job.direction, crate::models::JobStatus::Failed);

                Err(Error::ExportFailed {
                    type_name: type_name.to_string(),
                    job_id: job.id.to_string(),
                    cause: interrupted.cause,
                })
            },
        }
    }

    fn write_artifact(
        &self,
        exporter: &dyn ErasedExporter,
        filters: &JobOptions,
        path: &str,
    ) -> std::result::Result<(RowCounts, u64), Interrupted> {
        let mut counts = RowCounts::default();
        let headers = exporter.headers();
        let mut sink =
            CsvExportSink::new(&headers).map_err(|e| Interrupted::new(counts, e.to_string()))?;

        let rows = exporter
            .rows(filters)
            .map_err(|e| Interrupted::new(counts, format!("{e:#}")))?;

        for row in rows {
            let values = row.map_err(|e| Interrupted::new(counts, format!("{e:#}")))?;
            if values.len() != headers.len() {
                return Err(Interrupted::new(
                    counts,
                    format!(
                        "mapped {} values for {} headers",
                        values.len(),
                        headers.len()
                    ),
                ));
            }

            let cells: Vec<Cell> = values.into_iter().map(FieldValue::normalize).collect();
            sink.write_row(&cells)
                .map_err(|e| Interrupted::new(counts, e.to_string()))?;
            counts.record_success();
        }

        let bytes = sink
            .finish()
            .map_err(|e| Interrupted::new(counts, e.to_string()))?;
        let size = self
            .disk
            .write(path, &bytes)
            .map_err(|e| Interrupted::new(counts, e.to_string()))?;

        Ok((counts, size))
    }

    /// Streams an artifact to `writer`, then applies its delivery policy.
    ///
    /// Transient artifacts are deleted once fully copied; durable ones stay.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact belongs to another disk, cannot be
    /// read, or the copy fails.
    #[instrument(name = "tabport.export.deliver", skip_all, fields(path = %artifact.path))]
    pub fn deliver<W: Write + ?Sized>(&self, artifact: &ExportArtifact, writer: &mut W) -> Result<u64> {
        let handle = &artifact.delivery;
        if handle.disk != self.disk.name() {
            return Err(Error::InvalidInput(format!(
                "artifact is on disk '{}', not '{}'",
                handle.disk,
                self.disk.name()
            )));
        }

        let mut reader = self.disk.open_read(&handle.path)?;
        let copied =
            io::copy(&mut reader, writer).map_err(|e| Error::operation("deliver_artifact", e))?;
        drop(reader);

        if handle.transient {
            self.disk.delete(&handle.path)?;
            tracing::debug!(path = %handle.path, "transient artifact removed after delivery");
        }

        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::formats::UTF8_BOM;
    use crate::models::{BackedEnum, JobStatus};
    use crate::registry::{Exporter, ItemStream};
    use crate::storage::{JobLedger, LocalDisk, MemoryDisk, SqliteLedger};
    use chrono::TimeZone;

    #[derive(Clone, Copy)]
    enum Plan {
        Free,
        Pro,
    }

    impl BackedEnum for Plan {
        fn backing(&self) -> Cell {
            match self {
                Self::Free => Cell::Text("free".to_string()),
                Self::Pro => Cell::Text("pro".to_string()),
            }
        }
    }

    struct Accounts {
        fail_at: Option<u32>,
    }

    impl Exporter for Accounts {
        type Item = (u32, bool, Plan);

        fn headers(&self) -> Vec<String> {
            vec!["id".to_string(), "active".to_string(), "plan".to_string()]
        }

        fn source(&self, filters: &JobOptions) -> anyhow::Result<ItemStream<'_, Self::Item>> {
            let limit = filters
                .get("limit")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(5);
            let fail_at = self.fail_at;
            Ok(Box::new((1..=u32::try_from(limit)?).map(move |id| {
                if Some(id) == fail_at {
                    anyhow::bail!("source lost at item {id}");
                }
                Ok((id, id == 1, if id % 2 == 0 { Plan::Pro } else { Plan::Free }))
            })))
        }

        fn map(&self, item: &Self::Item) -> anyhow::Result<Vec<FieldValue>> {
            Ok(vec![item.0.into(), item.1.into(), FieldValue::backed(&item.2)])
        }
    }

    fn generator(disk: Arc<dyn Disk>) -> (Arc<SqliteLedger>, ExportGenerator) {
        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        (ledger.clone(), ExportGenerator::new(ledger, disk))
    }

    #[test]
    fn test_artifact_name() {
        let at = Utc.with_ymd_and_hms(2025, 9, 11, 8, 5, 3).unwrap();
        assert_eq!(
            ExportGenerator::artifact_name("users", at),
            "users_export_20250911_080503.csv"
        );
    }

    #[test]
    fn test_generate_completed_artifact() {
        let disk = Arc::new(MemoryDisk::new());
        let (_ledger, generator) = generator(disk.clone());

        let artifact = generator
            .generate("accounts", &Accounts { fail_at: None }, JobOptions::new(), None)
            .unwrap();

        assert_eq!(artifact.job.status, JobStatus::Completed);
        assert_eq!(artifact.job.total_rows, 5);
        assert_eq!(artifact.job.success_rows, 5);
        assert_eq!(artifact.job.failed_rows, 0);
        assert_eq!(artifact.job.path, artifact.path);
        assert_eq!(artifact.job.original_name.as_deref(), Some(artifact.name.as_str()));
        assert!(artifact.path.starts_with("ie/exports/accounts_export_"));

        let bytes = disk.contents(&artifact.path).unwrap();
        assert_eq!(artifact.size, bytes.len() as u64);
        assert!(bytes.starts_with(UTF8_BOM));
        let text = std::str::from_utf8(&bytes[UTF8_BOM.len()..]).unwrap();
        assert_eq!(
            text,
            "id,active,plan\n1,1,free\n2,0,pro\n3,0,free\n4,0,pro\n5,0,free\n"
        );
    }

    #[test]
    fn test_filters_reach_the_producer_and_job() {
        let disk = Arc::new(MemoryDisk::new());
        let (_ledger, generator) = generator(disk);
        let mut filters = JobOptions::new();
        filters.insert("limit".to_string(), serde_json::json!(2));

        let artifact = generator
            .generate("accounts", &Accounts { fail_at: None }, filters.clone(), Some("u1".to_string()))
            .unwrap();
        assert_eq!(artifact.job.total_rows, 2);
        assert_eq!(artifact.job.options, filters);
        assert_eq!(artifact.job.owner.as_deref(), Some("u1"));
    }

    #[test]
    fn test_failure_marks_job_failed_and_propagates() {
        let disk = Arc::new(MemoryDisk::new());
        let (ledger, generator) = generator(disk.clone());

        let err = generator
            .generate("accounts", &Accounts { fail_at: Some(3) }, JobOptions::new(), None)
            .unwrap_err();

        let Error::ExportFailed { job_id, cause, .. } = err else {
            panic!("expected ExportFailed, got {err}");
        };
        assert!(cause.contains("source lost at item 3"));

        let job = ledger.get_job(&job_id.as_str().into()).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.total_rows, 0);
        assert_eq!(job.success_rows, 0);
        assert_eq!(job.failed_rows, 0);
        assert!(disk.paths().is_empty());
    }

    #[test]
    fn test_transient_delivery_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let disk: Arc<dyn Disk> = Arc::new(LocalDisk::new(dir.path()));
        let (_ledger, generator) = generator(Arc::clone(&disk));

        let artifact = generator
            .generate("accounts", &Accounts { fail_at: None }, JobOptions::new(), None)
            .unwrap();
        assert!(artifact.delivery.transient);

        let mut out = Vec::new();
        let copied = generator.deliver(&artifact, &mut out).unwrap();
        assert_eq!(copied, artifact.size);
        assert!(out.starts_with(UTF8_BOM));
        assert!(!disk.exists(&artifact.path));
    }

    #[test]
    fn test_durable_delivery_retains() {
        let disk = Arc::new(MemoryDisk::new());
        let (_ledger, generator) = generator(disk.clone());

        let artifact = generator
            .generate("accounts", &Accounts { fail_at: None }, JobOptions::new(), None)
            .unwrap();
        let mut out = Vec::new();
        generator.deliver(&artifact, &mut out).unwrap();
        generator.deliver(&artifact, &mut out).unwrap();
        assert!(disk.exists(&artifact.path));
    }
}
