use std::time::Duration;

use super::DbManager;
use crate::command::{Command, CommandOptions};
use crate::error::{DriverError, ProviderComponent, SqlExecError};
use crate::provider::DriverConnection;
use crate::results::{DataReader, DataSet, DataTable, Locale};
use crate::types::{CommandKind, DbValue};

/// Fluent builder for a single execution.
///
/// ```rust,no_run
/// use sql_exec::prelude::*;
/// # fn demo(db: &mut DbManager) -> Result<(), SqlExecError> {
/// let rows = db
///     .command("users")
///     .kind(CommandKind::TableDirect)
///     .timeout(std::time::Duration::from_secs(2))
///     .data_table()?;
/// # let _ = rows;
/// # Ok(())
/// # }
/// ```
pub struct CommandBuilder<'m, 'q> {
    manager: &'m mut DbManager,
    text: &'q str,
    kind: CommandKind,
    options: CommandOptions,
}

impl<'m, 'q> CommandBuilder<'m, 'q> {
    #[must_use]
    pub fn kind(mut self, kind: CommandKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn options(mut self, options: CommandOptions) -> Self {
        self.options = options;
        self
    }

    /// Execute and return the affected-row count.
    ///
    /// # Errors
    /// Returns `SqlExecError::ProviderResolution` if the factory yields no connection or
    /// command, or `SqlExecError::Execution` wrapping the driver failure.
    pub fn non_query(self) -> Result<usize, SqlExecError> {
        self.manager
            .execute("non query", self.kind, self.text, self.options, |conn, cmd| {
                conn.execute_non_query(cmd)
            })
    }

    /// Execute and store the reader on the manager, returning it.
    ///
    /// # Errors
    /// See [`CommandBuilder::non_query`].
    pub fn reader(self) -> Result<&'m mut DataReader, SqlExecError> {
        let manager = self.manager;
        manager.state.close_reader();
        let reader = manager.execute("data reader", self.kind, self.text, self.options, |conn, cmd| {
            conn.execute_reader(cmd)
        })?;
        Ok(manager.state.set_reader(reader))
    }

    /// First column of the first row, `DbValue::Null` without rows.
    ///
    /// # Errors
    /// See [`CommandBuilder::non_query`].
    pub fn scalar(self) -> Result<DbValue, SqlExecError> {
        self.manager
            .execute("scalar", self.kind, self.text, self.options, |conn, cmd| {
                conn.execute_scalar(cmd)
            })
    }

    /// Fill a dataset through the provider's data adapter.
    ///
    /// # Errors
    /// Returns `SqlExecError::ProviderResolution` if the factory yields no adapter, plus
    /// everything [`CommandBuilder::non_query`] can return.
    pub fn data_set(self) -> Result<DataSet, SqlExecError> {
        let mut set = self.manager.fill("dataset", self.kind, self.text, self.options)?;
        set.set_locale(Locale::Invariant);
        Ok(set)
    }

    /// First table of the filled dataset, or an empty table when there is none.
    ///
    /// # Errors
    /// See [`CommandBuilder::data_set`].
    pub fn data_table(self) -> Result<DataTable, SqlExecError> {
        let set = self.manager.fill("data table", self.kind, self.text, self.options)?;
        let mut table = set.tables.into_iter().next().unwrap_or_default();
        table.locale = Locale::Invariant;
        Ok(table)
    }
}

impl DbManager {
    /// Start a fluent execution of `text`.
    pub fn command<'m, 'q>(&'m mut self, text: &'q str) -> CommandBuilder<'m, 'q> {
        let options = CommandOptions {
            timeout: self.options.command_timeout(),
        };
        CommandBuilder {
            manager: self,
            text,
            kind: CommandKind::Text,
            options,
        }
    }

    /// # Errors
    /// See [`CommandBuilder::non_query`].
    pub fn execute_non_query(&mut self, kind: CommandKind, text: &str) -> Result<usize, SqlExecError> {
        self.command(text).kind(kind).non_query()
    }

    /// # Errors
    /// See [`CommandBuilder::reader`].
    pub fn execute_reader(
        &mut self,
        kind: CommandKind,
        text: &str,
    ) -> Result<&mut DataReader, SqlExecError> {
        self.command(text).kind(kind).reader()
    }

    /// # Errors
    /// See [`CommandBuilder::scalar`].
    pub fn execute_scalar(&mut self, kind: CommandKind, text: &str) -> Result<DbValue, SqlExecError> {
        self.command(text).kind(kind).scalar()
    }

    /// # Errors
    /// See [`CommandBuilder::data_table`].
    pub fn execute_data_table(
        &mut self,
        kind: CommandKind,
        text: &str,
    ) -> Result<DataTable, SqlExecError> {
        self.command(text).kind(kind).data_table()
    }

    /// # Errors
    /// See [`CommandBuilder::data_set`].
    pub fn execute_data_set(&mut self, kind: CommandKind, text: &str) -> Result<DataSet, SqlExecError> {
        self.command(text).kind(kind).data_set()
    }

    /// Metadata collection lookup; `None` lists the collections the driver offers.
    ///
    /// Failures are reported as `SchemaRetrieval` with the driver error as cause and no
    /// diagnostic context.
    ///
    /// # Errors
    /// Returns `SqlExecError::ProviderResolution` if the factory yields no connection,
    /// otherwise `SqlExecError::SchemaRetrieval`.
    pub fn get_schema(&mut self, collection: Option<&str>) -> Result<DataTable, SqlExecError> {
        let lookup = self.open().and_then(|()| {
            let connection = self.state.connection_mut()?;
            Ok(connection.schema(collection)?)
        });
        match lookup {
            Ok(table) => Ok(table),
            Err(SqlExecError::Driver(source)) => Err(SqlExecError::SchemaRetrieval { source }),
            Err(other) => Err(other),
        }
    }

    /// Shared pipeline: open, prepare, run, enrich failures.
    fn execute<R>(
        &mut self,
        operation: &'static str,
        kind: CommandKind,
        text: &str,
        options: CommandOptions,
        run: impl FnOnce(&mut dyn DriverConnection, &mut Command) -> Result<R, DriverError>,
    ) -> Result<R, SqlExecError> {
        self.execute_unenriched(kind, text, options, run)
            .map_err(|e| self.enrich(operation, text, e))
    }

    fn execute_unenriched<R>(
        &mut self,
        kind: CommandKind,
        text: &str,
        options: CommandOptions,
        run: impl FnOnce(&mut dyn DriverConnection, &mut Command) -> Result<R, DriverError>,
    ) -> Result<R, SqlExecError> {
        self.open()?;
        self.state
            .prepare_command(self.factory.as_ref(), kind, text, options)?;
        let (connection, command) = self.state.connection_and_command()?;
        Ok(run(connection, command)?)
    }

    fn fill(
        &mut self,
        operation: &'static str,
        kind: CommandKind,
        text: &str,
        options: CommandOptions,
    ) -> Result<DataSet, SqlExecError> {
        self.open().map_err(|e| self.enrich(operation, text, e))?;
        let mut adapter =
            self.factory
                .create_data_adapter()
                .ok_or_else(|| SqlExecError::ProviderResolution {
                    provider: self.factory.name(),
                    component: ProviderComponent::DataAdapter,
                })?;
        self.execute(operation, kind, text, options, |conn, cmd| {
            adapter.fill(conn, cmd)
        })
    }
}
