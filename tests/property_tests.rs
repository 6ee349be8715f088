//! Property-based tests for job accounting.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Terminal counts always add up
//! - Status follows from the counts alone
//! - Header mismatches never record rows
//! - Exports never record failures, and failed exports keep no counts

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use proptest::prelude::*;
use tabport::io::services::ServiceSettings;
use tabport::io::validation::RuleSet;
use tabport::models::{FieldValue, JobOptions, JobStatus, RowCounts};
use tabport::registry::ItemStream;
use tabport::storage::{JobLedger, MemoryDisk, RowLedger};
use tabport::{
    Exporter, ImportExportService, ImportRequest, Importer, SqliteLedger, TypeRegistry,
};

struct Emails {
    rules: RuleSet,
}

impl Importer for Emails {
    fn headers(&self) -> Vec<String> {
        vec!["name".to_string(), "email".to_string()]
    }

    fn rules(&self) -> Option<&RuleSet> {
        Some(&self.rules)
    }
}

struct Numbers {
    fail_at: Option<u64>,
}

impl Exporter for Numbers {
    type Item = u64;

    fn headers(&self) -> Vec<String> {
        vec!["n".to_string(), "even".to_string()]
    }

    fn source(&self, filters: &JobOptions) -> anyhow::Result<ItemStream<'_, Self::Item>> {
        let count = filters
            .get("count")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);
        Ok(Box::new((0..count).map(Ok::<u64, anyhow::Error>)))
    }

    fn map(&self, item: &Self::Item) -> anyhow::Result<Vec<FieldValue>> {
        if self.fail_at == Some(*item) {
            anyhow::bail!("item {item} is unreadable");
        }
        Ok(vec![i64::try_from(*item)?.into(), (item % 2 == 0).into()])
    }
}

fn service_failing_at(fail_at: u64) -> (Arc<SqliteLedger>, ImportExportService) {
    let registry = TypeRegistry::builder()
        .importer(
            "emails",
            Emails {
                rules: RuleSet::new().rule("email", "required|email").unwrap(),
            },
        )
        .exporter("numbers", Numbers { fail_at: None })
        .exporter("flaky", Numbers { fail_at: Some(fail_at) })
        .build()
        .unwrap();
    let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
    let service = ImportExportService::new(
        Arc::new(registry),
        ledger.clone(),
        Arc::new(MemoryDisk::new()),
        ServiceSettings::default(),
    );
    (ledger, service)
}

fn service() -> (Arc<SqliteLedger>, ImportExportService) {
    service_failing_at(u64::MAX)
}

fn assert_status_matches(counts: RowCounts, status: JobStatus) {
    let expected = if counts.failed == 0 {
        JobStatus::Completed
    } else if counts.success == 0 {
        JobStatus::Failed
    } else {
        JobStatus::Partial
    };
    assert_eq!(status, expected, "counts {counts:?}");
}

proptest! {
    /// Property: aggregation depends only on the success and failure counts.
    #[test]
    fn prop_aggregate_status(success in 0u64..1_000, failed in 0u64..1_000) {
        let status = JobStatus::aggregate(success, failed);
        prop_assert!(status.is_terminal());
        prop_assert_eq!(status == JobStatus::Completed, failed == 0);
        prop_assert_eq!(status == JobStatus::Partial, failed > 0 && success > 0);
        prop_assert_eq!(status == JobStatus::Failed, failed > 0 && success == 0);
    }

    /// Property: a tally always adds up.
    #[test]
    fn prop_tally_adds_up(outcomes in prop::collection::vec(any::<bool>(), 0..200)) {
        let mut counts = RowCounts::default();
        for ok in &outcomes {
            if *ok { counts.record_success() } else { counts.record_failure() }
        }
        prop_assert_eq!(counts.total, outcomes.len() as u64);
        prop_assert_eq!(counts.total, counts.success + counts.failed);
        prop_assert_eq!(counts.status(), JobStatus::aggregate(counts.success, counts.failed));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: every data line yields one row and the job counts add up.
    #[test]
    fn prop_import_counts_add_up(rows in prop::collection::vec(
        ("[a-z]{1,8}", any::<bool>()),
        0..40,
    )) {
        let (ledger, service) = service();
        let mut input = String::from("name,email\n");
        for (name, valid) in &rows {
            let email = if *valid { format!("{name}@example.com") } else { name.clone() };
            input.push_str(&format!("{name},{email}\n"));
        }

        let job = service.submit_import(ImportRequest::new("emails", input)).unwrap();
        let valid = rows.iter().filter(|(_, v)| *v).count() as u64;

        prop_assert_eq!(job.total_rows, rows.len() as u64);
        prop_assert_eq!(job.success_rows, valid);
        prop_assert_eq!(job.total_rows, job.success_rows + job.failed_rows);
        prop_assert_eq!(ledger.count_rows(&job.id).unwrap(), job.total_rows);
        assert_status_matches(job.counts(), job.status);
    }

    /// Property: any header other than the declared one fails with no rows.
    #[test]
    fn prop_header_mismatch_records_nothing(
        header in prop::collection::vec("[a-z]{1,6}", 0..4),
        lines in 0usize..5,
    ) {
        prop_assume!(header != ["name", "email"]);
        let (ledger, service) = service();
        let mut input = header.join(",");
        input.push('\n');
        for _ in 0..lines {
            input.push_str("Ada,ada@example.com\n");
        }

        let job = service.submit_import(ImportRequest::new("emails", input)).unwrap();
        prop_assert_eq!(job.status, JobStatus::Failed);
        prop_assert_eq!(job.total_rows, 0);
        prop_assert_eq!(ledger.count_rows(&job.id).unwrap(), 0);
    }

    /// Property: exports count every item as a success.
    #[test]
    fn prop_export_never_fails_rows(count in 0u64..60) {
        let (ledger, service) = service();
        let mut filters = JobOptions::new();
        filters.insert("count".to_string(), serde_json::json!(count));

        let artifact = service.export("numbers", filters, None).unwrap();
        prop_assert_eq!(artifact.job.status, JobStatus::Completed);
        prop_assert_eq!(artifact.job.total_rows, count);
        prop_assert_eq!(artifact.job.success_rows, count);
        prop_assert_eq!(artifact.job.failed_rows, 0);
        prop_assert_eq!(ledger.count_rows(&artifact.job.id).unwrap(), 0);
    }

    /// Property: a failed export keeps no row counts.
    #[test]
    fn prop_failed_export_has_zero_counts(count in 1u64..60, fail_at in 0u64..60) {
        prop_assume!(fail_at < count);
        let (ledger, service) = service_failing_at(fail_at);
        let mut filters = JobOptions::new();
        filters.insert("count".to_string(), serde_json::json!(count));

        let err = service.export("flaky", filters, None).unwrap_err();
        let tabport::Error::ExportFailed { job_id, .. } = err else {
            panic!("expected ExportFailed, got {err}");
        };
        let job = ledger.get_job(&job_id.into()).unwrap();
        prop_assert_eq!(job.status, JobStatus::Failed);
        prop_assert_eq!(job.total_rows, 0);
        prop_assert_eq!(job.success_rows, 0);
        prop_assert_eq!(job.failed_rows, 0);
    }
}
