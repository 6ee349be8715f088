//! Job records and their lifecycle status.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form parameter map stored on a job (export filters, request options).
pub type JobOptions = BTreeMap<String, serde_json::Value>;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Creates a job ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh, time-ordered job ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Whether a job reads a file in or writes a file out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// File ingested into application records.
    Import,
    /// File generated from application data.
    Export,
}

impl Direction {
    /// Returns the direction as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Export => "export",
        }
    }

    /// Parses a direction from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "import" => Some(Self::Import),
            "export" => Some(Self::Export),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a job.
///
/// Imports move `uploaded → completed | partial | failed`; exports move
/// `processing → completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// File stored, processing not yet finished.
    #[default]
    Uploaded,
    /// Generation in flight.
    Processing,
    /// Every row succeeded.
    Completed,
    /// Some rows succeeded, some failed.
    Partial,
    /// No row succeeded, or the job could not be set up.
    Failed,
}

impl JobStatus {
    /// Returns all status variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Uploaded,
            Self::Processing,
            Self::Completed,
            Self::Partial,
            Self::Failed,
        ]
    }

    /// Returns the status as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "uploaded" => Some(Self::Uploaded),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns true for statuses the pipeline never leaves.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Partial | Self::Failed)
    }

    /// Derives the terminal status from success and failure counts.
    ///
    /// `completed` when nothing failed, `partial` when both outcomes occurred,
    /// `failed` when rows failed and none succeeded.
    #[must_use]
    pub const fn aggregate(success_rows: u64, failed_rows: u64) -> Self {
        if failed_rows == 0 {
            Self::Completed
        } else if success_rows > 0 {
            Self::Partial
        } else {
            Self::Failed
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate row counts for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RowCounts {
    /// Rows seen.
    pub total: u64,
    /// Rows that succeeded.
    pub success: u64,
    /// Rows that failed.
    pub failed: u64,
}

impl RowCounts {
    /// Records one successful row.
    pub const fn record_success(&mut self) {
        self.total += 1;
        self.success += 1;
    }

    /// Records one failed row.
    pub const fn record_failure(&mut self) {
        self.total += 1;
        self.failed += 1;
    }

    /// Returns the terminal status these counts aggregate to.
    #[must_use]
    pub const fn status(&self) -> JobStatus {
        JobStatus::aggregate(self.success, self.failed)
    }
}

/// A persisted import or export request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier.
    pub id: JobId,
    /// Logical handler key.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Import or export.
    pub direction: Direction,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Storage disk holding the file.
    pub disk: String,
    /// Path of the file on the disk (empty until an export is written).
    pub path: String,
    /// Client-facing file name.
    pub original_name: Option<String>,
    /// Declared MIME type of an upload.
    pub mimetype: Option<String>,
    /// File size in bytes.
    pub size: Option<u64>,
    /// Rows seen.
    pub total_rows: u64,
    /// Rows that succeeded.
    pub success_rows: u64,
    /// Rows that failed.
    pub failed_rows: u64,
    /// Free-form request parameters.
    pub options: JobOptions,
    /// Reference to the requesting user.
    pub owner: Option<String>,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
    /// Last update timestamp (Unix epoch seconds).
    pub updated_at: u64,
}

impl Job {
    /// Returns the aggregate counts as a [`RowCounts`].
    #[must_use]
    pub const fn counts(&self) -> RowCounts {
        RowCounts {
            total: self.total_rows,
            success: self.success_rows,
            failed: self.failed_rows,
        }
    }
}

/// Parameters for creating a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    /// Logical handler key.
    pub type_name: String,
    /// Import or export.
    pub direction: Direction,
    /// Initial status.
    pub status: JobStatus,
    /// Storage disk.
    pub disk: String,
    /// File path on the disk.
    pub path: String,
    /// Client-facing file name.
    pub original_name: Option<String>,
    /// Declared MIME type.
    pub mimetype: Option<String>,
    /// File size in bytes.
    pub size: Option<u64>,
    /// Free-form request parameters.
    pub options: JobOptions,
    /// Requesting user.
    pub owner: Option<String>,
}

impl NewJob {
    /// Starts an import job in the `uploaded` status.
    #[must_use]
    pub fn import(
        type_name: impl Into<String>,
        disk: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            direction: Direction::Import,
            status: JobStatus::Uploaded,
            disk: disk.into(),
            path: path.into(),
            original_name: None,
            mimetype: None,
            size: None,
            options: JobOptions::new(),
            owner: None,
        }
    }

    /// Starts an export job in the `processing` status.
    ///
    /// The path stays empty until the artifact is written.
    #[must_use]
    pub fn export(type_name: impl Into<String>, disk: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            direction: Direction::Export,
            status: JobStatus::Processing,
            disk: disk.into(),
            path: String::new(),
            original_name: None,
            mimetype: None,
            size: None,
            options: JobOptions::new(),
            owner: None,
        }
    }

    /// Sets the client-facing file name.
    #[must_use]
    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }

    /// Sets the declared MIME type.
    #[must_use]
    pub fn with_mimetype(mut self, mimetype: Option<String>) -> Self {
        self.mimetype = mimetype;
        self
    }

    /// Sets the file size.
    #[must_use]
    pub const fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the request parameters.
    #[must_use]
    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the owner reference.
    #[must_use]
    pub fn with_owner(mut self, owner: Option<String>) -> Self {
        self.owner = owner;
        self
    }
}

/// Terminal update applied to a job exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalization {
    /// Terminal status.
    pub status: JobStatus,
    /// Final row counts.
    pub counts: RowCounts,
    /// Artifact location, when the run produced one.
    pub path: Option<String>,
    /// Artifact size, when the run produced one.
    pub size: Option<u64>,
}

impl Finalization {
    /// Finalizes with the status the counts aggregate to.
    #[must_use]
    pub const fn from_counts(counts: RowCounts) -> Self {
        Self {
            status: counts.status(),
            counts,
            path: None,
            size: None,
        }
    }

    /// Finalizes as failed with zero counts.
    #[must_use]
    pub fn failed() -> Self {
        Self {
            status: JobStatus::Failed,
            counts: RowCounts::default(),
            path: None,
            size: None,
        }
    }

    /// Attaches the written artifact.
    #[must_use]
    pub fn with_artifact(mut self, path: impl Into<String>, size: u64) -> Self {
        self.path = Some(path.into());
        self.size = Some(size);
        self
    }
}

/// Filters and pagination for job listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQuery {
    /// Only jobs of this type.
    pub type_name: Option<String>,
    /// Only jobs in this direction.
    pub direction: Option<Direction>,
    /// Only jobs in this status.
    pub status: Option<JobStatus>,
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub per_page: u32,
}

impl Default for JobQuery {
    fn default() -> Self {
        Self {
            type_name: None,
            direction: None,
            status: None,
            page: 1,
            per_page: Self::DEFAULT_PER_PAGE,
        }
    }
}

impl JobQuery {
    /// Default page size.
    pub const DEFAULT_PER_PAGE: u32 = 20;
    /// Largest accepted page size.
    pub const MAX_PER_PAGE: u32 = 100;

    /// Restricts to a type.
    #[must_use]
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Restricts to a direction.
    #[must_use]
    pub const fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Restricts to a status.
    #[must_use]
    pub const fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Selects a page.
    #[must_use]
    pub const fn with_page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    /// Page size clamped to `1..=MAX_PER_PAGE`.
    #[must_use]
    pub fn effective_per_page(&self) -> u32 {
        self.per_page.clamp(1, Self::MAX_PER_PAGE)
    }

    /// Number of records to skip for the requested page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.effective_per_page())
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: u32,
    /// Page size used.
    pub per_page: u32,
    /// Total matching items across all pages.
    pub total: u64,
}

impl<T> Page<T> {
    /// Returns the number of pages.
    #[must_use]
    pub fn last_page(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.per_page)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_aggregate() {
        assert_eq!(JobStatus::aggregate(0, 0), JobStatus::Completed);
        assert_eq!(JobStatus::aggregate(3, 0), JobStatus::Completed);
        assert_eq!(JobStatus::aggregate(1, 1), JobStatus::Partial);
        assert_eq!(JobStatus::aggregate(0, 2), JobStatus::Failed);
    }

    #[test]
    fn test_status_terminal() {
        assert!(!JobStatus::Uploaded.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Partial.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_parse_roundtrip() {
        for status in JobStatus::all() {
            assert_eq!(JobStatus::parse(status.as_str()), Some(*status));
        }
        assert_eq!(JobStatus::parse("FAILED"), Some(JobStatus::Failed));
        assert_eq!(JobStatus::parse("queued"), None);
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(Direction::parse("import"), Some(Direction::Import));
        assert_eq!(Direction::parse("Export"), Some(Direction::Export));
        assert_eq!(Direction::parse("sideways"), None);
    }

    #[test]
    fn test_row_counts() {
        let mut counts = RowCounts::default();
        counts.record_success();
        counts.record_failure();
        counts.record_success();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.success, 2);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.status(), JobStatus::Partial);
    }

    #[test]
    fn test_job_query_pagination() {
        let query = JobQuery::default();
        assert_eq!(query.offset(), 0);
        assert_eq!(query.effective_per_page(), 20);

        let query = JobQuery::default().with_page(3, 10);
        assert_eq!(query.offset(), 20);

        let query = JobQuery::default().with_page(0, 500);
        assert_eq!(query.offset(), 0);
        assert_eq!(query.effective_per_page(), JobQuery::MAX_PER_PAGE);
    }

    #[test]
    fn test_page_last_page() {
        let page: Page<u8> = Page {
            items: vec![],
            page: 1,
            per_page: 20,
            total: 41,
        };
        assert_eq!(page.last_page(), 3);

        let empty: Page<u8> = Page {
            items: vec![],
            page: 1,
            per_page: 20,
            total: 0,
        };
        assert_eq!(empty.last_page(), 1);
    }
}
