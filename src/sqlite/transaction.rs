use std::thread;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::DriverError;
use crate::types::IsolationLevel;

const ROLLBACK_BUSY_RETRIES: &[Duration] = &[
    Duration::from_millis(10),
    Duration::from_millis(25),
    Duration::from_millis(50),
];

/// Statement that opens a transaction at `isolation`.
///
/// `SQLite` transactions are always serializable; `Serializable` takes the write lock
/// up front, everything else defers it to the first write.
#[must_use]
pub fn begin_statement(isolation: IsolationLevel) -> &'static str {
    match isolation {
        IsolationLevel::Serializable => "BEGIN IMMEDIATE",
        _ => "BEGIN DEFERRED",
    }
}

pub(crate) fn begin(conn: &Connection, isolation: IsolationLevel) -> Result<(), DriverError> {
    let read_uncommitted = i64::from(isolation == IsolationLevel::ReadUncommitted);
    conn.pragma_update(None, "read_uncommitted", read_uncommitted)?;
    conn.execute_batch(begin_statement(isolation))?;
    Ok(())
}

pub(crate) fn commit(conn: &Connection) -> Result<(), DriverError> {
    if conn.is_autocommit() {
        return Err(DriverError::InvalidState(
            "SQLite transaction not active".into(),
        ));
    }
    conn.execute_batch("COMMIT")?;
    Ok(())
}

/// Roll back, retrying briefly while another connection holds the database busy.
pub(crate) fn rollback_with_busy_retries(conn: &Connection) -> Result<(), DriverError> {
    if conn.is_autocommit() {
        return Err(DriverError::InvalidState(
            "SQLite transaction not active".into(),
        ));
    }

    for (idx, delay) in ROLLBACK_BUSY_RETRIES.iter().copied().enumerate() {
        match conn.execute_batch("ROLLBACK") {
            Ok(()) => return Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    && idx + 1 < ROLLBACK_BUSY_RETRIES.len() =>
            {
                tracing::debug!(attempt = idx + 1, "rollback busy, retrying");
                thread::sleep(delay);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(DriverError::Other("rollback retries exhausted".into()))
}
