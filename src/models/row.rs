//! Per-row import outcomes.

use super::{JobId, RowPayload};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one imported source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    /// Validated, transformed, and persisted.
    Processed,
    /// Rejected by validation or failed during transform/persist.
    Failed,
}

impl RowStatus {
    /// Returns the status as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "processed" => Some(Self::Processed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted row outcome. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Ledger-assigned identifier.
    pub id: i64,
    /// Owning job.
    pub job_id: JobId,
    /// 1-based source line number (the header is line 1).
    pub row_index: u64,
    /// Field values as read.
    pub payload: RowPayload,
    /// Outcome.
    pub status: RowStatus,
    /// Diagnostic, present only on failure.
    pub message: Option<String>,
    /// When the row was handled (Unix epoch seconds).
    pub processed_at: u64,
}

/// Parameters for recording a row outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRow {
    /// Owning job.
    pub job_id: JobId,
    /// 1-based source line number.
    pub row_index: u64,
    /// Field values as read.
    pub payload: RowPayload,
    /// Outcome.
    pub status: RowStatus,
    /// Diagnostic for failures.
    pub message: Option<String>,
}

impl NewRow {
    /// A successfully processed row.
    #[must_use]
    pub const fn processed(job_id: JobId, row_index: u64, payload: RowPayload) -> Self {
        Self {
            job_id,
            row_index,
            payload,
            status: RowStatus::Processed,
            message: None,
        }
    }

    /// A failed row with its diagnostic.
    #[must_use]
    pub fn failed(
        job_id: JobId,
        row_index: u64,
        payload: RowPayload,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            row_index,
            payload,
            status: RowStatus::Failed,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_row_constructors() {
        let job = JobId::new("j1");
        let ok = NewRow::processed(job.clone(), 2, RowPayload::new());
        assert_eq!(ok.status, RowStatus::Processed);
        assert!(ok.message.is_none());

        let bad = NewRow::failed(job, 3, RowPayload::new(), "boom");
        assert_eq!(bad.status, RowStatus::Failed);
        assert_eq!(bad.message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_row_status_parse() {
        assert_eq!(RowStatus::parse("processed"), Some(RowStatus::Processed));
        assert_eq!(RowStatus::parse("Failed"), Some(RowStatus::Failed));
        assert_eq!(RowStatus::parse("pending"), None);
    }
}
