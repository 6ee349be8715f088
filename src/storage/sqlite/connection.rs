//! Shared connection handling for the `SQLite` stores.

use crate::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Acquires a mutex lock, recovering from poison.
///
/// A panic inside a previous critical section leaves the connection itself
/// usable, so the inner value is taken back and a warning is logged.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("storage mutex was poisoned, recovering");
            metrics::counter!("storage_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Applies connection pragmas.
///
/// - **WAL mode**: concurrent readers with a single writer
/// - **NORMAL synchronous**: durability/throughput balance under WAL
/// - **`busy_timeout`**: waits up to 5 seconds on lock contention
/// - **`foreign_keys`**: required for row cascade on job deletion
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if foreign keys cannot be enabled.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns a row, which pragma_update tolerates; in-memory
    // databases answer "memory" instead of "wal".
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");

    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| Error::operation("enable_foreign_keys", e))
}

/// Opens and configures a file-backed connection, creating parent
/// directories as needed.
///
/// # Errors
///
/// Returns an error if the directory or database cannot be created.
pub fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::operation("create_database_dir", e))?;
    }

    let conn = Connection::open(path).map_err(|e| Error::operation("open_database", e))?;
    configure_connection(&conn)?;
    Ok(conn)
}

/// Opens and configures an in-memory connection.
///
/// # Errors
///
/// Returns an error if the database cannot be created.
pub fn open_in_memory() -> Result<Connection> {
    let conn =
        Connection::open_in_memory().map_err(|e| Error::operation("open_database_memory", e))?;
    configure_connection(&conn)?;
    Ok(conn)
}

/// Converts a u64 value to i64 for `SQLite` storage.
#[allow(clippy::cast_possible_wrap)]
pub const fn to_db(value: u64) -> i64 {
    value as i64
}

/// Converts an i64 from `SQLite` back to u64.
#[allow(clippy::cast_sign_loss)]
pub const fn from_db(value: i64) -> u64 {
    value as u64
}
