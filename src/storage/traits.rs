//! Ledger trait definitions.
//!
//! The job ledger and the row ledger are separate seams so an alternative
//! store can implement one without the other, but [`SqliteLedger`] implements
//! both over a single database.
//!
//! [`SqliteLedger`]: super::SqliteLedger

use crate::Result;
use crate::models::{Finalization, Job, JobId, JobQuery, NewJob, NewRow, Page, Row};

/// Persistent store for job records.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait JobLedger: Send + Sync {
    /// Creates a job and returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the job cannot be stored.
    fn create_job(&self, job: NewJob) -> Result<Job>;

    /// Gets a job by ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) for unknown IDs.
    fn get_job(&self, id: &JobId) -> Result<Job>;

    /// Applies the terminal update to a job.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The job does not exist
    /// - The job is already terminal ([`Error::JobFinalized`](crate::Error::JobFinalized))
    /// - The finalization is not terminal or its counts do not add up
    fn finalize_job(&self, id: &JobId, finalization: Finalization) -> Result<Job>;

    /// Lists jobs matching the query, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list_jobs(&self, query: &JobQuery) -> Result<Page<Job>>;

    /// Deletes a job and, by cascade, its rows.
    ///
    /// Returns `false` if the job did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn delete_job(&self, id: &JobId) -> Result<bool>;
}

/// Persistent store for per-row import outcomes.
///
/// Rows are append-only; there is no update operation.
pub trait RowLedger: Send + Sync {
    /// Records one row outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the owning job is missing or already terminal.
    fn record_row(&self, row: NewRow) -> Result<Row>;

    /// Returns a job's rows ordered by `row_index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn rows_for_job(&self, id: &JobId) -> Result<Vec<Row>>;

    /// Counts a job's rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn count_rows(&self, id: &JobId) -> Result<u64>;
}

/// A store that keeps both jobs and their rows.
pub trait Ledger: JobLedger + RowLedger {}

impl<T: JobLedger + RowLedger> Ledger for T {}
