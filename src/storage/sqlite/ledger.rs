//! `SQLite` job and row ledger.

use super::connection::{acquire_lock, from_db, open_connection, open_in_memory, to_db};
use super::metrics::observe_operation;
use crate::models::{
    Direction, Finalization, Job, JobId, JobOptions, JobQuery, JobStatus, NewJob, NewRow, Page,
    Row, RowPayload, RowStatus,
};
use crate::storage::{JobLedger, RowLedger};
use crate::{Error, Result, current_timestamp};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite";

const JOB_COLUMNS: &str = "id, type, direction, status, disk, path, original_name, mimetype, \
     size, total_rows, success_rows, failed_rows, options, owner, created_at, updated_at";

const ROW_COLUMNS: &str = "id, job_id, row_index, payload, status, message, processed_at";

/// Job and row ledger over one `SQLite` database.
///
/// Jobs live in `ie_jobs`, rows in `ie_rows`; deleting a job cascades to its
/// rows.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteLedger {
    /// Opens (or creates) a ledger at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = open_connection(&db_path)?;
        let ledger = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        ledger.initialize()?;
        Ok(ledger)
    }

    /// Creates an in-memory ledger (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let ledger = Self {
            conn: Mutex::new(open_in_memory()?),
            db_path: None,
        };
        ledger.initialize()?;
        Ok(ledger)
    }

    /// Returns the database path, if file-backed.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS ie_jobs (
                id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                direction TEXT NOT NULL,
                status TEXT NOT NULL,
                disk TEXT NOT NULL,
                path TEXT NOT NULL DEFAULT '',
                original_name TEXT,
                mimetype TEXT,
                size INTEGER,
                total_rows INTEGER NOT NULL DEFAULT 0,
                success_rows INTEGER NOT NULL DEFAULT 0,
                failed_rows INTEGER NOT NULL DEFAULT 0,
                options TEXT NOT NULL DEFAULT '{}',
                owner TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ie_jobs_type_direction ON ie_jobs(type, direction);
            CREATE INDEX IF NOT EXISTS idx_ie_jobs_status ON ie_jobs(status);
            CREATE INDEX IF NOT EXISTS idx_ie_jobs_created_at ON ie_jobs(created_at);

            CREATE TABLE IF NOT EXISTS ie_rows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL,
                row_index INTEGER NOT NULL,
                payload TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT,
                processed_at INTEGER NOT NULL,
                FOREIGN KEY (job_id) REFERENCES ie_jobs(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_ie_rows_job_row ON ie_rows(job_id, row_index);
            CREATE INDEX IF NOT EXISTS idx_ie_rows_status ON ie_rows(status);
            ",
        )
        .map_err(|e| Error::operation("initialize_ledger_schema", e))
    }

    fn fetch_job(conn: &Connection, id: &JobId) -> Result<Option<Job>> {
        conn.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM ie_jobs WHERE id = ?1"),
            params![id.as_str()],
            job_from_row,
        )
        .optional()
        .map_err(|e| Error::operation("get_job", e))
    }

    fn fetch_status(conn: &Connection, id: &JobId) -> Result<JobStatus> {
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM ie_jobs WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::operation("get_job_status", e))?;

        let status = status.ok_or_else(|| Error::NotFound {
            entity: "job",
            id: id.to_string(),
        })?;

        JobStatus::parse(&status)
            .ok_or_else(|| Error::operation("get_job_status", format!("unknown status '{status}'")))
    }

    fn require_open(conn: &Connection, id: &JobId) -> Result<()> {
        let status = Self::fetch_status(conn, id)?;
        if status.is_terminal() {
            return Err(Error::JobFinalized {
                id: id.to_string(),
                status,
            });
        }
        Ok(())
    }

    fn insert_job(conn: &Connection, job: NewJob) -> Result<Job> {
        let now = current_timestamp();
        let job = Job {
            id: JobId::generate(),
            type_name: job.type_name,
            direction: job.direction,
            status: job.status,
            disk: job.disk,
            path: job.path,
            original_name: job.original_name,
            mimetype: job.mimetype,
            size: job.size,
            total_rows: 0,
            success_rows: 0,
            failed_rows: 0,
            options: job.options,
            owner: job.owner,
            created_at: now,
            updated_at: now,
        };

        let options =
            serde_json::to_string(&job.options).map_err(|e| Error::operation("create_job", e))?;

        conn.execute(
            &format!(
                "INSERT INTO ie_jobs ({JOB_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, 0, 0, ?10, ?11, ?12, ?12)"
            ),
            params![
                job.id.as_str(),
                job.type_name,
                job.direction.as_str(),
                job.status.as_str(),
                job.disk,
                job.path,
                job.original_name,
                job.mimetype,
                job.size.map(to_db),
                options,
                job.owner,
                to_db(now),
            ],
        )
        .map_err(|e| Error::operation("create_job", e))?;

        Ok(job)
    }

    fn apply_finalization(
        conn: &Connection,
        id: &JobId,
        finalization: &Finalization,
    ) -> Result<Job> {
        if !finalization.status.is_terminal() {
            return Err(Error::InvalidInput(format!(
                "cannot finalize job '{id}' as {}",
                finalization.status
            )));
        }

        let counts = finalization.counts;
        if counts.total != counts.success + counts.failed {
            return Err(Error::InvalidInput(format!(
                "row counts do not add up: total {} != success {} + failed {}",
                counts.total, counts.success, counts.failed
            )));
        }

        Self::require_open(conn, id)?;

        conn.execute(
            "UPDATE ie_jobs
             SET status = ?2, total_rows = ?3, success_rows = ?4, failed_rows = ?5,
                 path = COALESCE(?6, path), size = COALESCE(?7, size), updated_at = ?8
             WHERE id = ?1",
            params![
                id.as_str(),
                finalization.status.as_str(),
                to_db(counts.total),
                to_db(counts.success),
                to_db(counts.failed),
                finalization.path,
                finalization.size.map(to_db),
                to_db(current_timestamp()),
            ],
        )
        .map_err(|e| Error::operation("finalize_job", e))?;

        Self::fetch_job(conn, id)?.ok_or_else(|| Error::NotFound {
            entity: "job",
            id: id.to_string(),
        })
    }

    fn query_jobs(conn: &Connection, query: &JobQuery) -> Result<Page<Job>> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(type_name) = &query.type_name {
            values.push(Value::Text(type_name.clone()));
            clauses.push(format!("type = ?{}", values.len()));
        }
        if let Some(direction) = query.direction {
            values.push(Value::Text(direction.as_str().to_string()));
            clauses.push(format!("direction = ?{}", values.len()));
        }
        if let Some(status) = query.status {
            values.push(Value::Text(status.as_str().to_string()));
            clauses.push(format!("status = ?{}", values.len()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM ie_jobs{where_clause}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )
            .map_err(|e| Error::operation("count_jobs", e))?;

        let per_page = query.effective_per_page();
        let limit_idx = values.len() + 1;
        let offset_idx = values.len() + 2;
        values.push(Value::Integer(i64::from(per_page)));
        values.push(Value::Integer(to_db(query.offset())));

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM ie_jobs{where_clause}
                 ORDER BY created_at DESC, rowid DESC LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
            ))
            .map_err(|e| Error::operation("prepare_list_jobs", e))?;

        let items = stmt
            .query_map(params_from_iter(values.iter()), job_from_row)
            .map_err(|e| Error::operation("list_jobs", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::operation("list_jobs", e))?;

        Ok(Page {
            items,
            page: query.page.max(1),
            per_page,
            total: from_db(total),
        })
    }

    fn insert_row(conn: &Connection, row: NewRow) -> Result<Row> {
        Self::require_open(conn, &row.job_id)?;

        let payload = row.payload.to_json()?;
        let processed_at = current_timestamp();
        conn.execute(
            "INSERT INTO ie_rows (job_id, row_index, payload, status, message, processed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                row.job_id.as_str(),
                to_db(row.row_index),
                payload,
                row.status.as_str(),
                row.message,
                to_db(processed_at),
            ],
        )
        .map_err(|e| Error::operation("record_row", e))?;

        Ok(Row {
            id: conn.last_insert_rowid(),
            job_id: row.job_id,
            row_index: row.row_index,
            payload: row.payload,
            status: row.status,
            message: row.message,
            processed_at,
        })
    }

    fn select_rows(conn: &Connection, id: &JobId) -> Result<Vec<Row>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ROW_COLUMNS} FROM ie_rows WHERE job_id = ?1 ORDER BY row_index, id"
            ))
            .map_err(|e| Error::operation("prepare_rows_for_job", e))?;

        stmt.query_map(params![id.as_str()], row_from_row)
            .map_err(|e| Error::operation("rows_for_job", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::operation("rows_for_job", e))
    }
}

impl JobLedger for SqliteLedger {
    #[instrument(
        name = "tabport.ledger.create_job",
        skip(self, job),
        fields(job.type_name = %job.type_name, job.direction = %job.direction)
    )]
    fn create_job(&self, job: NewJob) -> Result<Job> {
        let start = Instant::now();
        let result = Self::insert_job(&acquire_lock(&self.conn), job);
        observe_operation(BACKEND, "create_job", start, &result);
        result
    }

    fn get_job(&self, id: &JobId) -> Result<Job> {
        let start = Instant::now();
        let result = Self::fetch_job(&acquire_lock(&self.conn), id).and_then(|job| {
            job.ok_or_else(|| Error::NotFound {
                entity: "job",
                id: id.to_string(),
            })
        });
        observe_operation(BACKEND, "get_job", start, &result);
        result
    }

    #[instrument(
        name = "tabport.ledger.finalize_job",
        skip(self, finalization),
        fields(job.id = %id, job.status = %finalization.status)
    )]
    fn finalize_job(&self, id: &JobId, finalization: Finalization) -> Result<Job> {
        let start = Instant::now();
        let result = Self::apply_finalization(&acquire_lock(&self.conn), id, &finalization);
        observe_operation(BACKEND, "finalize_job", start, &result);
        result
    }

    fn list_jobs(&self, query: &JobQuery) -> Result<Page<Job>> {
        let start = Instant::now();
        let result = Self::query_jobs(&acquire_lock(&self.conn), query);
        observe_operation(BACKEND, "list_jobs", start, &result);
        result
    }

    #[instrument(name = "tabport.ledger.delete_job", skip(self), fields(job.id = %id))]
    fn delete_job(&self, id: &JobId) -> Result<bool> {
        let start = Instant::now();
        let result = acquire_lock(&self.conn)
            .execute("DELETE FROM ie_jobs WHERE id = ?1", params![id.as_str()])
            .map(|deleted| deleted > 0)
            .map_err(|e| Error::operation("delete_job", e));
        observe_operation(BACKEND, "delete_job", start, &result);
        result
    }
}

impl RowLedger for SqliteLedger {
    fn record_row(&self, row: NewRow) -> Result<Row> {
        let start = Instant::now();
        let result = Self::insert_row(&acquire_lock(&self.conn), row);
        observe_operation(BACKEND, "record_row", start, &result);
        result
    }

    fn rows_for_job(&self, id: &JobId) -> Result<Vec<Row>> {
        let start = Instant::now();
        let result = Self::select_rows(&acquire_lock(&self.conn), id);
        observe_operation(BACKEND, "rows_for_job", start, &result);
        result
    }

    fn count_rows(&self, id: &JobId) -> Result<u64> {
        acquire_lock(&self.conn)
            .query_row(
                "SELECT COUNT(*) FROM ie_rows WHERE job_id = ?1",
                params![id.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .map(from_db)
            .map_err(|e| Error::operation("count_rows", e))
    }
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

fn parse_enum<T>(idx: usize, value: &str, parse: impl Fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(value).ok_or_else(|| conversion_error(idx, format!("unexpected value '{value}'")))
}

fn job_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let direction: String = row.get(2)?;
    let status: String = row.get(3)?;
    let options: String = row.get(12)?;

    Ok(Job {
        id: JobId::new(row.get::<_, String>(0)?),
        type_name: row.get(1)?,
        direction: parse_enum(2, &direction, Direction::parse)?,
        status: parse_enum(3, &status, JobStatus::parse)?,
        disk: row.get(4)?,
        path: row.get(5)?,
        original_name: row.get(6)?,
        mimetype: row.get(7)?,
        size: row.get::<_, Option<i64>>(8)?.map(from_db),
        total_rows: from_db(row.get(9)?),
        success_rows: from_db(row.get(10)?),
        failed_rows: from_db(row.get(11)?),
        options: serde_json::from_str::<JobOptions>(&options)
            .map_err(|e| conversion_error(12, e.to_string()))?,
        owner: row.get(13)?,
        created_at: from_db(row.get(14)?),
        updated_at: from_db(row.get(15)?),
    })
}

fn row_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    let payload: String = row.get(3)?;
    let status: String = row.get(4)?;

    Ok(Row {
        id: row.get(0)?,
        job_id: JobId::new(row.get::<_, String>(1)?),
        row_index: from_db(row.get(2)?),
        payload: RowPayload::from_json(&payload).map_err(|e| conversion_error(3, e.to_string()))?,
        status: parse_enum(4, &status, RowStatus::parse)?,
        message: row.get(5)?,
        processed_at: from_db(row.get(6)?),
    })
}
