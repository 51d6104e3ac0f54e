//! Lifecycle state owned by a manager.
//!
//! The fields are private to this module; `open`, `close`, `begin`, `commit`,
//! `rollback` and `prepare_command` are the only transitions that mutate them.

use tracing::{debug, trace};

use crate::command::{Command, CommandOptions, TransactionHandle};
use crate::error::{DriverError, ProviderComponent, SqlExecError};
use crate::parameter::{Parameter, ParameterRegistry};
use crate::provider::{DriverConnection, ProviderFactory};
use crate::results::DataReader;
use crate::types::{CommandKind, ConnectionState, IsolationLevel};

#[derive(Default)]
pub(crate) struct EngineState {
    connection: Option<Box<dyn DriverConnection>>,
    transaction: Option<TransactionHandle>,
    parameters: ParameterRegistry,
    command: Option<Command>,
    reader: Option<DataReader>,
    next_transaction_id: u64,
}

impl EngineState {
    pub(crate) fn connection_state(&self) -> Option<ConnectionState> {
        self.connection.as_ref().map(|c| c.state())
    }

    pub(crate) fn is_open(&self) -> bool {
        self.connection_state() == Some(ConnectionState::Open)
    }

    pub(crate) fn transaction(&self) -> Option<&TransactionHandle> {
        self.transaction.as_ref()
    }

    pub(crate) fn command(&self) -> Option<&Command> {
        self.command.as_ref()
    }

    pub(crate) fn parameters(&self) -> &ParameterRegistry {
        &self.parameters
    }

    pub(crate) fn reader_mut(&mut self) -> Option<&mut DataReader> {
        self.reader.as_mut()
    }

    /// Open the connection, allocating a new one unless the current one is open.
    pub(crate) fn open(
        &mut self,
        factory: &dyn ProviderFactory,
        connection_string: &str,
    ) -> Result<(), SqlExecError> {
        if self.is_open() {
            return Ok(());
        }
        let mut connection =
            factory
                .create_connection()
                .ok_or_else(|| SqlExecError::ProviderResolution {
                    provider: factory.name(),
                    component: ProviderComponent::Connection,
                })?;
        connection.set_connection_string(connection_string);
        if connection.state() != ConnectionState::Open {
            connection.open()?;
        }
        debug!(provider = %factory.name(), "connection opened");
        self.connection = Some(connection);
        self.discard_transaction();
        Ok(())
    }

    /// Clear parameters, then close the connection if there is one. The connection
    /// object is kept; the next `open` replaces it. A transaction handle does not
    /// outlive its connection.
    pub(crate) fn close(&mut self) -> Result<(), SqlExecError> {
        self.clear_parameters();
        let Some(connection) = self.connection.as_mut() else {
            return Ok(());
        };
        if connection.state() != ConnectionState::Closed {
            connection.close()?;
            debug!("connection closed");
        }
        self.discard_transaction();
        Ok(())
    }

    fn discard_transaction(&mut self) {
        if let Some(handle) = self.transaction.take() {
            debug!(transaction = handle.id, "transaction discarded with its connection");
        }
    }

    pub(crate) fn begin(
        &mut self,
        factory: &dyn ProviderFactory,
        connection_string: &str,
        isolation: IsolationLevel,
    ) -> Result<TransactionHandle, SqlExecError> {
        self.open(factory, connection_string)?;
        if let Some(existing) = self.transaction {
            return Ok(existing);
        }
        let connection = self.connection_mut()?;
        connection.begin_transaction(isolation)?;
        self.next_transaction_id += 1;
        let handle = TransactionHandle {
            id: self.next_transaction_id,
            isolation,
        };
        debug!(transaction = handle.id, ?isolation, "transaction started");
        self.transaction = Some(handle);
        Ok(handle)
    }

    /// Commit the active transaction. The handle is cleared only when the driver
    /// call succeeds; a failed commit leaves the transaction active.
    pub(crate) fn commit(&mut self) -> Result<(), SqlExecError> {
        let Some(handle) = self.transaction else {
            return Ok(());
        };
        self.transaction_connection()?
            .commit_transaction()
            .map_err(SqlExecError::Transaction)?;
        debug!(transaction = handle.id, "transaction committed");
        self.transaction = None;
        Ok(())
    }

    /// Roll back the active transaction; same handle rules as [`EngineState::commit`].
    pub(crate) fn rollback(&mut self) -> Result<(), SqlExecError> {
        let Some(handle) = self.transaction else {
            return Ok(());
        };
        self.transaction_connection()?
            .rollback_transaction()
            .map_err(SqlExecError::Transaction)?;
        debug!(transaction = handle.id, "transaction rolled back");
        self.transaction = None;
        Ok(())
    }

    pub(crate) fn add_parameter(&mut self, parameter: Option<Parameter>) {
        self.parameters.add(parameter);
    }

    pub(crate) fn clear_parameters(&mut self) {
        self.parameters.clear();
        if let Some(command) = self.command.as_mut() {
            command.parameters.clear();
        }
    }

    /// Build a fresh command carrying the current transaction and parameters.
    pub(crate) fn prepare_command(
        &mut self,
        factory: &dyn ProviderFactory,
        kind: CommandKind,
        text: &str,
        options: CommandOptions,
    ) -> Result<(), SqlExecError> {
        let mut command =
            factory
                .create_command()
                .ok_or_else(|| SqlExecError::ProviderResolution {
                    provider: factory.name(),
                    component: ProviderComponent::Command,
                })?;
        text.clone_into(&mut command.text);
        command.kind = kind;
        if options.timeout.is_some() {
            command.timeout = options.timeout;
        }
        command.transaction = self.transaction;
        if !self.parameters.is_empty() {
            self.parameters.attach(factory, &mut command);
        }
        trace!(
            command = %command.text,
            parameters = command.parameters.len(),
            in_transaction = command.transaction.is_some(),
            "command prepared"
        );
        self.command = Some(command);
        Ok(())
    }

    /// Split borrow of the open connection and the prepared command.
    pub(crate) fn connection_and_command(
        &mut self,
    ) -> Result<(&mut dyn DriverConnection, &mut Command), SqlExecError> {
        let connection = self
            .connection
            .as_deref_mut()
            .ok_or_else(|| DriverError::InvalidState("no connection".into()))?;
        let command = self
            .command
            .as_mut()
            .ok_or_else(|| DriverError::InvalidState("no prepared command".into()))?;
        Ok((connection, command))
    }

    pub(crate) fn connection_mut(&mut self) -> Result<&mut dyn DriverConnection, SqlExecError> {
        Ok(self
            .connection
            .as_deref_mut()
            .ok_or_else(|| DriverError::InvalidState("no connection".into()))?)
    }

    fn transaction_connection(&mut self) -> Result<&mut dyn DriverConnection, SqlExecError> {
        match self.connection.as_deref_mut() {
            Some(connection) => Ok(connection),
            None => Err(SqlExecError::Transaction(DriverError::InvalidState(
                "no connection".into(),
            ))),
        }
    }

    pub(crate) fn set_reader(&mut self, reader: DataReader) -> &mut DataReader {
        self.reader.insert(reader)
    }

    /// Close and drop the current reader, if any.
    pub(crate) fn close_reader(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.close();
        }
    }

    /// Drop every reference without closing the connection.
    pub(crate) fn release(&mut self) {
        self.parameters = ParameterRegistry::default();
        self.command = None;
        self.reader = None;
        self.transaction = None;
        self.connection = None;
    }
}
