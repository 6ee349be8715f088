//! Tabular import/export I/O.
//!
//! # Architecture
//!
//! - **Format adapters** implement [`ImportSource`] (CSV reading) and provide
//!   the BOM-prefixed export sink
//! - **Validation** checks row payloads against declared rule sets
//! - **Services** run import and export jobs and record their outcomes
//!
//! # Examples
//!
//! ```rust,ignore
//! use tabport::io::{ImportExportService, ImportRequest};
//!
//! let job = service.submit_import(
//!     ImportRequest::new("contacts", std::fs::read("contacts.csv")?)
//!         .with_original_name("contacts.csv"),
//! )?;
//! println!("{}: {} ok, {} failed", job.status, job.success_rows, job.failed_rows);
//! ```

pub mod formats;
pub mod services;
pub mod traits;
pub mod validation;

// Re-exports for convenience
pub use formats::{CsvExportSink, CsvImportSource, UTF8_BOM, template_bytes};
pub use services::{
    ExportArtifact, ExportGenerator, ImportExportService, ImportProcessor, ImportProgress,
    ImportRequest, ServiceSettings,
};
pub use traits::{ImportSource, SourceRecord};
pub use validation::{Rule, RuleSet, RuleValidator, ValidationErrors, Validator};
