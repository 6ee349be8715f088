//! `SQLite` stores.
//!
//! - `connection`: lock acquisition with poison recovery, pragma setup
//! - `metrics`: per-operation counters and latency histograms
//! - [`SqliteLedger`]: `ie_jobs` / `ie_rows`
//! - [`RecordStore`]: `ie_records`, written by configured importers
//!
//! Each store owns its own connection; two stores may open the same file.

mod connection;
mod ledger;
mod metrics;
mod records;

pub use connection::{acquire_lock, configure_connection};
pub use ledger::SqliteLedger;
pub use metrics::observe_operation;
pub use records::{RecordFilter, RecordScan, RecordStore, StoredRecord};
