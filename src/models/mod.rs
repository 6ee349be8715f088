//! Data models for tabport.
//!
//! This module contains the job and row records tracked by the ledger, the
//! row payload read from import files, and the field values produced by
//! exporters.

mod job;
mod payload;
mod row;
mod value;

pub use job::{
    Direction, Finalization, Job, JobId, JobOptions, JobQuery, JobStatus, NewJob, Page, RowCounts,
};
pub use payload::RowPayload;
pub use row::{NewRow, Row, RowStatus};
pub use value::{BackedEnum, Cell, FieldValue};
