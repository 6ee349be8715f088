//! # Tabport
//!
//! Tabular import/export pipeline with job-level and row-level outcome tracking.
//!
//! Tabport ingests CSV files into application records through registered
//! importers and generates CSV files from application data through registered
//! exporters. Every request is recorded as a [`Job`]; every imported data line
//! is recorded as a [`Row`], so partial failures stay visible after the fact.
//!
//! ## Features
//!
//! - Per-row error isolation: one bad line never aborts an import batch
//! - Deterministic job status aggregation (`completed`, `partial`, `failed`)
//! - Exporters stream lazily into a BOM-prefixed CSV artifact
//! - `SQLite` job/row ledger, local and in-memory storage disks
//! - Config-declared types for use without custom handler code
//!
//! ## Example
//!
//! ```rust,ignore
//! use tabport::{ImportExportService, ImportRequest, TypeRegistry};
//!
//! let registry = TypeRegistry::builder()
//!     .importer("contacts", ContactsImporter::default())
//!     .build()?;
//! let service = ImportExportService::new(Arc::new(registry), ledger, disk, settings);
//! let job = service.submit_import(ImportRequest::new("contacts", bytes))?;
//! println!("{} rows, {} failed", job.total_rows, job.failed_rows);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod handlers;
pub mod io;
pub mod models;
pub mod observability;
pub mod registry;
pub mod storage;

// Re-exports for convenience
pub use config::TabportConfig;
pub use io::services::{
    ExportArtifact, ExportGenerator, ImportExportService, ImportProcessor, ImportRequest,
    ServiceSettings,
};
pub use models::{Cell, Direction, FieldValue, Job, JobId, JobStatus, Row, RowPayload, RowStatus};
pub use registry::{Exporter, Importer, TypeRegistry};
pub use storage::{Disk, JobLedger, RecordStore, RowLedger, SqliteLedger};

/// Error type for tabport operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed config, rule strings, filters, or upload metadata |
/// | `NotRegistered` | No importer/exporter registered for the requested type |
/// | `InvalidCapability` | A handler bundle is rejected at registration time |
/// | `NotFound` | A job id does not exist in the ledger |
/// | `JobFinalized` | A terminal job would be mutated |
/// | `ExportFailed` | The producer, mapper, or artifact write failed during export |
/// | `OperationFailed` | `SQLite` or filesystem operations fail |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No handler is registered for the type and direction.
    ///
    /// Raised before any job is created.
    #[error("{direction} handler for [{type_name}] is not registered")]
    NotRegistered {
        /// The requested logical type.
        type_name: String,
        /// The requested direction.
        direction: models::Direction,
    },

    /// A capability bundle was rejected during registration.
    #[error("invalid {direction} capability for [{type_name}]: {reason}")]
    InvalidCapability {
        /// The logical type being registered.
        type_name: String,
        /// The direction being registered.
        direction: models::Direction,
        /// Why the bundle was rejected.
        reason: String,
    },

    /// A requested entity does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Kind of entity ("job", "file").
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// A job in a terminal status would be mutated.
    #[error("job '{id}' is already {status}")]
    JobFinalized {
        /// The job identifier.
        id: String,
        /// The terminal status the job holds.
        status: models::JobStatus,
    },

    /// An export run failed; the job has been marked failed.
    #[error("export of [{type_name}] failed (job {job_id}): {cause}")]
    ExportFailed {
        /// The exported type.
        type_name: String,
        /// The job that was marked failed.
        job_id: String,
        /// The underlying failure.
        cause: String,
    },

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from any displayable cause.
    pub fn operation(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for tabport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use tabport::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
