use std::fmt;
use std::time::Duration;

use rusqlite::Connection;

use super::params::bind_parameters;
use super::query::build_data_table;
use super::{schema, transaction};
use crate::command::Command;
use crate::error::DriverError;
use crate::provider::DriverConnection;
use crate::results::DataReader;
use crate::types::{CommandKind, ConnectionState, IsolationLevel};

/// Busy timeout applied on open and restored after a per-command override.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `SQLite` driver connection. The connection string is a file path or `:memory:`.
#[derive(Default)]
pub struct SqliteConnection {
    connection_string: String,
    conn: Option<Connection>,
}

impl SqliteConnection {
    fn conn(&self) -> Result<&Connection, DriverError> {
        self.conn
            .as_ref()
            .ok_or_else(|| DriverError::InvalidState("SQLite connection is not open".into()))
    }

    /// Borrow the raw rusqlite connection, if open.
    #[must_use]
    pub fn raw(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    /// Run `func` with the command's timeout applied as the busy timeout.
    fn with_timeout<R>(
        &self,
        timeout: Option<Duration>,
        func: impl FnOnce(&Connection) -> Result<R, DriverError>,
    ) -> Result<R, DriverError> {
        let conn = self.conn()?;
        let Some(timeout) = timeout else {
            return func(conn);
        };
        conn.busy_timeout(timeout)?;
        let result = func(conn);
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        result
    }
}

/// SQL the driver actually runs for `command`.
fn command_sql(command: &Command) -> Result<String, DriverError> {
    match command.kind {
        CommandKind::Text => Ok(command.text.clone()),
        CommandKind::TableDirect => Ok(format!(
            "SELECT * FROM \"{}\"",
            command.text.replace('"', "\"\"")
        )),
        CommandKind::StoredProcedure => Err(DriverError::Unsupported(
            "SQLite has no stored procedures".into(),
        )),
    }
}

impl DriverConnection for SqliteConnection {
    fn set_connection_string(&mut self, connection_string: &str) {
        connection_string.clone_into(&mut self.connection_string);
    }

    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn state(&self) -> ConnectionState {
        if self.conn.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    fn open(&mut self) -> Result<(), DriverError> {
        if self.conn.is_some() {
            return Ok(());
        }
        if self.connection_string.is_empty() {
            return Err(DriverError::InvalidState(
                "SQLite connection string is empty".into(),
            ));
        }
        let conn = Connection::open(&self.connection_string)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        self.conn = Some(conn);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| DriverError::Sqlite(e))?;
        }
        Ok(())
    }

    fn begin_transaction(&mut self, isolation: IsolationLevel) -> Result<(), DriverError> {
        transaction::begin(self.conn()?, isolation)
    }

    fn commit_transaction(&mut self) -> Result<(), DriverError> {
        transaction::commit(self.conn()?)
    }

    fn rollback_transaction(&mut self) -> Result<(), DriverError> {
        transaction::rollback_with_busy_retries(self.conn()?)
    }

    fn execute_non_query(&mut self, command: &mut Command) -> Result<usize, DriverError> {
        let sql = command_sql(command)?;
        self.with_timeout(command.timeout, |conn| {
            let mut stmt = conn.prepare(&sql)?;
            bind_parameters(&mut stmt, &command.parameters)?;
            Ok(stmt.raw_execute()?)
        })
    }

    fn execute_reader(&mut self, command: &mut Command) -> Result<DataReader, DriverError> {
        let sql = command_sql(command)?;
        let name = match command.kind {
            CommandKind::TableDirect => command.text.clone(),
            _ => String::new(),
        };
        self.with_timeout(command.timeout, |conn| {
            let mut stmt = conn.prepare(&sql)?;
            bind_parameters(&mut stmt, &command.parameters)?;
            let table = build_data_table(&mut stmt, &name)?;
            let affected = if stmt.readonly() {
                0
            } else {
                usize::try_from(conn.changes()).unwrap_or(usize::MAX)
            };
            Ok(DataReader::buffered(vec![table], affected))
        })
    }

    fn schema(&mut self, collection: Option<&str>) -> Result<crate::results::DataTable, DriverError> {
        schema::collection(self.conn()?, collection)
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("connection_string", &self.connection_string)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Parameter;
    use crate::types::DbValue;

    fn open_memory() -> SqliteConnection {
        let mut conn = SqliteConnection::default();
        conn.set_connection_string(":memory:");
        conn.open().unwrap();
        conn
    }

    fn text(sql: &str) -> Command {
        Command {
            text: sql.into(),
            ..Command::default()
        }
    }

    #[test]
    fn open_and_close_track_state() {
        let mut conn = open_memory();
        assert_eq!(conn.state(), ConnectionState::Open);
        conn.close().unwrap();
        assert_eq!(conn.state(), ConnectionState::Closed);
        conn.close().unwrap();
    }

    #[test]
    fn empty_connection_string_is_rejected() {
        let mut conn = SqliteConnection::default();
        assert!(matches!(conn.open(), Err(DriverError::InvalidState(_))));
    }

    #[test]
    fn table_direct_and_scalar() {
        let mut conn = open_memory();
        conn.execute_non_query(&mut text("CREATE TABLE t (id INTEGER, name TEXT)"))
            .unwrap();
        let mut insert = text("INSERT INTO t (id, name) VALUES (@id, @name)");
        insert.parameters = vec![Parameter::input("id", 1), Parameter::input("name", "a")];
        assert_eq!(conn.execute_non_query(&mut insert).unwrap(), 1);

        let mut direct = Command {
            text: "t".into(),
            kind: CommandKind::TableDirect,
            ..Command::default()
        };
        let tables = conn.execute_reader(&mut direct).unwrap().into_tables().unwrap();
        assert_eq!(tables[0].name, "t");
        assert_eq!(tables[0].value(0, "name"), Some(&DbValue::Text("a".into())));

        let count = conn
            .execute_scalar(&mut text("SELECT COUNT(*) FROM t"))
            .unwrap();
        assert_eq!(count, DbValue::Int(1));
    }

    #[test]
    fn stored_procedures_are_unsupported() {
        let mut conn = open_memory();
        let mut cmd = Command {
            text: "sp_who".into(),
            kind: CommandKind::StoredProcedure,
            ..Command::default()
        };
        assert!(matches!(
            conn.execute_non_query(&mut cmd),
            Err(DriverError::Unsupported(_))
        ));
    }
}
