//! Command handlers module.
//!
//! This module organizes the CLI command implementations into separate files:
//! - `transfer.rs`: Template, import and export commands
//! - `jobs.rs`: Job listing and inspection
//! - `types.rs`: Registered type listing

mod jobs;
mod transfer;
mod types;

use clap::Subcommand;
use std::sync::Arc;
use tabport::io::ImportProgress;
use tabport::storage::{Ledger, RecordStore};
use tabport::{ImportExportService, ImportProcessor, SqliteLedger, TabportConfig, TypeRegistry};

// Re-export command functions
pub use jobs::{cmd_jobs_list, cmd_jobs_show};
pub use transfer::{cmd_export, cmd_import, cmd_template};
pub use types::cmd_types;

/// Jobs subcommands.
#[derive(Subcommand)]
pub enum JobsAction {
    /// List jobs, newest first.
    List {
        /// Only jobs of this type.
        #[arg(long = "type")]
        type_name: Option<String>,

        /// Only jobs in this direction: import or export.
        #[arg(long)]
        direction: Option<String>,

        /// Only jobs in this status.
        #[arg(long)]
        status: Option<String>,

        /// Page number.
        #[arg(long, default_value = "1")]
        page: u32,

        /// Page size (configured default when omitted).
        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Show a job and its rows.
    Show {
        /// Job ID.
        id: String,
    },
}

/// Opens the registry for the configured types.
fn open_registry(config: &TabportConfig) -> tabport::Result<TypeRegistry> {
    let store = Arc::new(RecordStore::new(config.database_path())?);
    config.build_registry(&store)
}

/// Builds the service for the configured disk, database and types.
///
/// With `progress`, imports report a running tally on stderr.
fn open_service(config: &TabportConfig, progress: bool) -> tabport::Result<ImportExportService> {
    let registry = Arc::new(open_registry(config)?);
    let ledger: Arc<dyn Ledger> = Arc::new(SqliteLedger::new(config.database_path())?);
    let disk = config.open_disk()?;

    let service = ImportExportService::new(
        registry,
        Arc::clone(&ledger),
        disk,
        config.service_settings(),
    );
    if !progress {
        return Ok(service);
    }

    let processor = ImportProcessor::new(ledger).with_progress(Box::new(|p: &ImportProgress| {
        eprint!(
            "\rProcessed: {} (ok {}, failed {})",
            p.counts.total, p.counts.success, p.counts.failed
        );
    }));
    Ok(service.with_processor(processor))
}
