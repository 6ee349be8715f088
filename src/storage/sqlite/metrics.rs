//! Ledger operation metrics.

use std::time::Instant;

/// Counts a ledger call and records its latency.
///
/// Labels: `backend`, `operation`, and `status` (`success` or `error`,
/// taken from the call's result).
pub fn observe_operation<T, E>(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    result: &Result<T, E>,
) {
    let status = if result.is_ok() { "success" } else { "error" };
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(elapsed_ms);
}
