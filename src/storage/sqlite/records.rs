//! Application records written by configured importers.
//!
//! Each processed import row becomes one record holding its type and JSON
//! payload. Configured exporters read them back through [`RecordScan`], which
//! pages through the table so large stores are never loaded at once.

use super::connection::{acquire_lock, from_db, open_connection, open_in_memory, to_db};
use super::metrics::observe_operation;
use crate::models::RowPayload;
use crate::{Error, Result, current_timestamp};
use rusqlite::{Connection, params};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

const SCAN_BATCH: i64 = 256;

/// A stored application record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Store-assigned identifier, increasing with insertion order.
    pub id: i64,
    /// Logical type the record belongs to.
    pub type_name: String,
    /// Field values.
    pub payload: RowPayload,
    /// Insertion time (Unix epoch seconds).
    pub created_at: u64,
}

/// Selection applied while scanning records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Only records created at or after this time.
    pub since: Option<u64>,
    /// Stop after this many matching records.
    pub limit: Option<u64>,
    /// Exact field matches.
    pub fields: BTreeMap<String, String>,
}

impl RecordFilter {
    fn matches(&self, record: &StoredRecord) -> bool {
        self.fields
            .iter()
            .all(|(column, expected)| record.payload.get(column) == Some(expected.as_str()))
    }
}

/// `SQLite` store for application records (`ie_records`).
pub struct RecordStore {
    conn: Mutex<Connection>,
}

impl RecordStore {
    /// Opens (or creates) a record store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(open_connection(path.as_ref())?),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory record store.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(open_in_memory()?),
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        acquire_lock(&self.conn)
            .execute_batch(
                r"
                CREATE TABLE IF NOT EXISTS ie_records (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    type TEXT NOT NULL,
                    payload TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_ie_records_type ON ie_records(type, id);
                ",
            )
            .map_err(|e| Error::operation("initialize_record_schema", e))
    }

    /// Inserts a record and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub fn insert(&self, type_name: &str, payload: &RowPayload) -> Result<i64> {
        let start = Instant::now();
        let result = payload.to_json().and_then(|json| {
            let conn = acquire_lock(&self.conn);
            conn.execute(
                "INSERT INTO ie_records (type, payload, created_at) VALUES (?1, ?2, ?3)",
                params![type_name, json, to_db(current_timestamp())],
            )
            .map(|_| conn.last_insert_rowid())
            .map_err(|e| Error::operation("insert_record", e))
        });
        observe_operation("sqlite", "insert_record", start, &result);
        result
    }

    /// Counts records of a type.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn count(&self, type_name: &str) -> Result<u64> {
        acquire_lock(&self.conn)
            .query_row(
                "SELECT COUNT(*) FROM ie_records WHERE type = ?1",
                params![type_name],
                |row| row.get::<_, i64>(0),
            )
            .map(from_db)
            .map_err(|e| Error::operation("count_records", e))
    }

    /// Lazily scans records of a type in insertion order.
    #[must_use]
    pub fn scan(&self, type_name: impl Into<String>, filter: RecordFilter) -> RecordScan<'_> {
        RecordScan {
            store: self,
            type_name: type_name.into(),
            remaining: filter.limit,
            filter,
            after_id: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn fetch_batch(
        &self,
        type_name: &str,
        after_id: i64,
        since: Option<u64>,
    ) -> Result<Vec<StoredRecord>> {
        // Timestamps beyond the column range match nothing.
        let since = since.map_or(0, |s| i64::try_from(s).unwrap_or(i64::MAX));
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT id, type, payload, created_at FROM ie_records
                 WHERE type = ?1 AND id > ?2 AND created_at >= ?3
                 ORDER BY id LIMIT ?4",
            )
            .map_err(|e| Error::operation("prepare_scan_records", e))?;

        let rows = stmt
            .query_map(
                params![type_name, after_id, since, SCAN_BATCH],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .map_err(|e| Error::operation("scan_records", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::operation("scan_records", e))?;

        rows.into_iter()
            .map(|(id, type_name, payload, created_at)| {
                Ok(StoredRecord {
                    id,
                    type_name,
                    payload: RowPayload::from_json(&payload)?,
                    created_at: from_db(created_at),
                })
            })
            .collect()
    }
}

/// Paged iterator over stored records.
pub struct RecordScan<'a> {
    store: &'a RecordStore,
    type_name: String,
    filter: RecordFilter,
    remaining: Option<u64>,
    after_id: i64,
    buffer: VecDeque<StoredRecord>,
    exhausted: bool,
}

impl Iterator for RecordScan<'_> {
    type Item = Result<StoredRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining == Some(0) {
                return None;
            }

            if let Some(record) = self.buffer.pop_front() {
                if !self.filter.matches(&record) {
                    continue;
                }
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                return Some(Ok(record));
            }

            if self.exhausted {
                return None;
            }

            match self
                .store
                .fetch_batch(&self.type_name, self.after_id, self.filter.since)
            {
                Ok(batch) => {
                    self.exhausted = i64::try_from(batch.len()).map_or(true, |n| n < SCAN_BATCH);
                    if let Some(last) = batch.last() {
                        self.after_id = last.id;
                    }
                    self.buffer.extend(batch);
                },
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                },
            }
        }
    }
}
