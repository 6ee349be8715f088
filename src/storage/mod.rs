//! Storage layer.
//!
//! - [`JobLedger`] / [`RowLedger`]: job and row records, backed by `SQLite`
//! - [`Disk`]: named file stores holding uploads and generated artifacts
//! - [`RecordStore`]: application records written by configured importers

mod disk;
pub mod sqlite;
mod traits;

pub use disk::{DeliveryHandle, Disk, LocalDisk, MemoryDisk};
pub use sqlite::{RecordFilter, RecordStore, SqliteLedger, StoredRecord};
pub use traits::{JobLedger, Ledger, RowLedger};
