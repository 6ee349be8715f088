//! Import and export pipelines.
//!
//! [`ImportProcessor`] and [`ExportGenerator`] each drive one job to a
//! terminal status; [`ImportExportService`] wires them to the registry, the
//! ledger and a disk.

pub mod export;
pub mod import;
mod service;

pub use export::{DEFAULT_EXPORT_DIR, ExportArtifact, ExportGenerator};
pub use import::{ImportProcessor, ImportProgress, ProgressCallback, RowOutcome, SetupFailure};
pub use service::{DEFAULT_IMPORT_DIR, ImportExportService, ImportRequest, ServiceSettings};
