//! Pipeline metrics.
//!
//! Emitted through the `metrics` facade; without an installed recorder the
//! calls are no-ops.

use crate::models::{Direction, JobStatus, RowStatus};

/// Counts a finalized job.
pub fn record_job(direction: Direction, status: JobStatus) {
    metrics::counter!(
        "tabport_jobs_total",
        "direction" => direction.as_str(),
        "status" => status.as_str()
    )
    .increment(1);
}

/// Counts one imported row outcome.
pub fn record_row(status: RowStatus) {
    metrics::counter!("tabport_rows_total", "status" => status.as_str()).increment(1);
}

/// Counts rows written by an export.
pub fn record_export_rows(count: u64) {
    metrics::counter!("tabport_export_rows_total").increment(count);
}
