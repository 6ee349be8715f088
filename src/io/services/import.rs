//! Import processor.
//!
//! Drives one import job from its source to a terminal status. Every data
//! record yields exactly one [`Row`](crate::models::Row); a failing record
//! never stops the batch. Only an unreadable stream or a header that does not
//! match the declared schema fails the whole job, and even then the outcome
//! is reported through the job, not as an error.

use crate::io::formats::CsvImportSource;
use crate::io::traits::{ImportSource, SourceRecord};
use crate::io::validation::{RuleValidator, Validator};
use crate::models::{Finalization, Job, NewRow, RowCounts, RowPayload, RowStatus};
use crate::observability::metrics;
use crate::registry::Importer;
use crate::storage::{Disk, Ledger};
use crate::Result;
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use tracing::instrument;

/// Progress callback invoked after each row is recorded.
pub type ProgressCallback = Box<dyn Fn(&ImportProgress) + Send + Sync>;

/// Running tally reported to a [`ProgressCallback`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportProgress {
    /// Rows recorded so far.
    pub counts: RowCounts,
    /// Line of the last recorded row.
    pub line: u64,
}

/// Why an import job failed before any row was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupFailure {
    /// The stored file could not be opened or read.
    StreamOpen(String),
    /// The header record could not be decoded.
    HeaderUnreadable(String),
    /// The header differs from the declared schema.
    HeaderMismatch {
        /// Declared schema.
        expected: Vec<String>,
        /// Header as read.
        found: Vec<String>,
    },
}

impl fmt::Display for SetupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StreamOpen(cause) => write!(f, "cannot open source: {cause}"),
            Self::HeaderUnreadable(cause) => write!(f, "cannot read header: {cause}"),
            Self::HeaderMismatch { expected, found } => write!(
                f,
                "header mismatch: expected [{}], found [{}]",
                expected.join(","),
                found.join(",")
            ),
        }
    }
}

/// Outcome of one data record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// Validated, transformed and persisted.
    Processed {
        /// Source line.
        line: u64,
        /// Fields as read.
        payload: RowPayload,
    },
    /// Rejected or failed while handling.
    Failed {
        /// Source line.
        line: u64,
        /// Fields as read (empty if undecodable).
        payload: RowPayload,
        /// Diagnostic.
        message: String,
    },
}

impl RowOutcome {
    /// Returns the row status for this outcome.
    #[must_use]
    pub const fn status(&self) -> RowStatus {
        match self {
            Self::Processed { .. } => RowStatus::Processed,
            Self::Failed { .. } => RowStatus::Failed,
        }
    }
}

/// Runs import jobs against a ledger.
pub struct ImportProcessor {
    ledger: Arc<dyn Ledger>,
    validator: Arc<dyn Validator>,
    progress: Option<ProgressCallback>,
}

impl ImportProcessor {
    /// Creates a processor using the default [`RuleValidator`].
    #[must_use]
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            ledger,
            validator: Arc::new(RuleValidator::new()),
            progress: None,
        }
    }

    /// Replaces the validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// Installs a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Processes the job's stored file from a disk.
    ///
    /// # Errors
    ///
    /// Returns an error only if the ledger fails.
    pub fn process_from_disk(
        &self,
        job: &Job,
        importer: &dyn Importer,
        disk: &dyn Disk,
    ) -> Result<Job> {
        match disk.open_read(&job.path) {
            Ok(reader) => self.process_reader(job, importer, reader),
            Err(e) => self.fail_setup(job, &SetupFailure::StreamOpen(e.to_string())),
        }
    }

    /// Processes CSV from a byte stream.
    ///
    /// # Errors
    ///
    /// Returns an error only if the ledger fails.
    pub fn process_reader<R: Read>(
        &self,
        job: &Job,
        importer: &dyn Importer,
        reader: R,
    ) -> Result<Job> {
        match CsvImportSource::new(reader) {
            Ok(source) => self.process(job, importer, source),
            Err(e) => self.fail_setup(job, &SetupFailure::StreamOpen(e.to_string())),
        }
    }

    /// Processes an already opened source.
    ///
    /// # Errors
    ///
    /// Returns an error only if the ledger fails; header and row problems are
    /// recorded on the job.
    #[instrument(
        name = "tabport.import.process",
        skip_all,
        fields(job.id = %job.id, job.type_name = %job.type_name)
    )]
    pub fn process<S: ImportSource>(
        &self,
        job: &Job,
        importer: &dyn Importer,
        mut source: S,
    ) -> Result<Job> {
        let expected = importer.headers();
        match source.read_header() {
            Err(cause) => return self.fail_setup(job, &SetupFailure::HeaderUnreadable(cause)),
            Ok(found) if found != expected => {
                return self.fail_setup(job, &SetupFailure::HeaderMismatch { expected, found });
            },
            Ok(_) => {},
        }

        let mut counts = RowCounts::default();
        while let Some(record) = source.next_record() {
            let fatal = matches!(record, SourceRecord::Invalid { fatal: true, .. });
            let outcome = self.evaluate(importer, &expected, record);
            self.record(job, outcome, &mut counts)?;
            if fatal {
                tracing::warn!(job.id = %job.id, "source stopped mid-stream");
                break;
            }
        }

        let finalized = self
            .ledger
            .finalize_job(&job.id, Finalization::from_counts(counts))?;
        metrics::record_job(finalized.direction, finalized.status);
        tracing::info!(
            job.id = %finalized.id,
            job.status = %finalized.status,
            total = finalized.total_rows,
            success = finalized.success_rows,
            failed = finalized.failed_rows,
            "import finished"
        );
        Ok(finalized)
    }

    /// Validates, transforms and persists one record.
    ///
    /// The payload kept on the outcome is the mapping as read, before any
    /// transform.
    pub fn evaluate(
        &self,
        importer: &dyn Importer,
        headers: &[String],
        record: SourceRecord,
    ) -> RowOutcome {
        let (line, fields) = match record {
            SourceRecord::Fields { line, fields } => (line, fields),
            SourceRecord::Invalid { line, reason, .. } => {
                return RowOutcome::Failed {
                    line,
                    payload: RowPayload::new(),
                    message: reason,
                };
            },
        };

        let payload = RowPayload::from_record(headers, &fields);
        if fields.len() != headers.len() {
            return RowOutcome::Failed {
                line,
                payload,
                message: format!(
                    "expected {} fields, found {}",
                    headers.len(),
                    fields.len()
                ),
            };
        }

        if let Some(rules) = importer.rules()
            && let Err(errors) = self.validator.validate(&payload, rules)
        {
            return RowOutcome::Failed {
                line,
                payload,
                message: errors.to_json(),
            };
        }

        match importer
            .transform(payload.clone())
            .and_then(|transformed| importer.persist(&transformed))
        {
            Ok(()) => RowOutcome::Processed { line, payload },
            Err(e) => RowOutcome::Failed {
                line,
                payload,
                message: format!("{e:#}"),
            },
        }
    }

    fn record(&self, job: &Job, outcome: RowOutcome, counts: &mut RowCounts) -> Result<()> {
        let status = outcome.status();
        let line = match outcome {
            RowOutcome::Processed { line, payload } => {
                self.ledger
                    .record_row(NewRow::processed(job.id.clone(), line, payload))?;
                counts.record_success();
                line
            },
            RowOutcome::Failed {
                line,
                payload,
                message,
            } => {
                tracing::debug!(job.id = %job.id, row_index = line, %message, "row failed");
                self.ledger
                    .record_row(NewRow::failed(job.id.clone(), line, payload, message))?;
                counts.record_failure();
                line
            },
        };

        metrics::record_row(status);
        if let Some(callback) = &self.progress {
            callback(&ImportProgress {
                counts: *counts,
                line,
            });
        }
        Ok(())
    }

    fn fail_setup(&self, job: &Job, failure: &SetupFailure) -> Result<Job> {
        tracing::warn!(job.id = %job.id, job.type_name = %job.type_name, reason = %failure, "import setup failed");
        let finalized = self.ledger.finalize_job(&job.id, Finalization::failed())?;
        metrics::record_job(finalized.direction, finalized.status);
        Ok(finalized)
    }
}
