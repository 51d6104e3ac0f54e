//! The [`DbManager`] façade.
//!
//! A manager owns one logical connection, at most one transaction, a queue of pending
//! parameters and the most recent command and reader. It is not meant to be shared:
//! every operation takes `&mut self`, so callers serialize access by construction.

mod batch;
mod enrich;
mod executor;
mod projection;
mod state;

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::command::TransactionHandle;
use crate::config::ManagerOptions;
use crate::error::SqlExecError;
use crate::parameter::Parameter;
use crate::provider::{ProviderFactory, ProviderRegistry};
use crate::results::DataReader;
use crate::types::{ConnectionState, DbValue, IsolationLevel, ProviderTag};

pub use batch::{BatchCommand, BatchOutcome, FailurePolicy};
pub use executor::CommandBuilder;

use state::EngineState;

/// What dropping a manager does with its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownPolicy {
    /// Drop references only; the connection is not closed explicitly. Some drivers
    /// misbehave when a connection is closed while their own finalizers run, so this
    /// is the default and callers close deterministically with `close` or `scope`.
    #[default]
    ReleaseOnly,
    /// Close the connection before dropping references.
    CloseConnection,
}

pub struct DbManager {
    factory: Arc<dyn ProviderFactory>,
    options: ManagerOptions,
    state: EngineState,
}

impl DbManager {
    /// Manager resolved against the default registry.
    ///
    /// # Errors
    /// Returns `SqlExecError` if the options are invalid or the provider is not registered.
    pub fn new(options: ManagerOptions) -> Result<Self, SqlExecError> {
        Self::with_registry(options, &ProviderRegistry::default())
    }

    /// Manager resolved against `registry`; a custom factory in `options` skips it.
    ///
    /// # Errors
    /// Returns `SqlExecError` if the options are invalid or the provider is not registered.
    pub fn with_registry(
        options: ManagerOptions,
        registry: &ProviderRegistry,
    ) -> Result<Self, SqlExecError> {
        options.validate()?;
        let factory = registry.resolve(&options.descriptor())?;
        Ok(Self {
            factory,
            options,
            state: EngineState::default(),
        })
    }

    #[must_use]
    pub fn provider(&self) -> Option<ProviderTag> {
        self.factory.provider()
    }

    #[must_use]
    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// State of the current connection, `None` before the first open.
    #[must_use]
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.state.connection_state()
    }

    /// Open the connection. A no-op when already open.
    ///
    /// # Errors
    /// Returns `SqlExecError::ProviderResolution` if the factory yields no connection,
    /// or the driver error if opening fails.
    pub fn open(&mut self) -> Result<(), SqlExecError> {
        self.state
            .open(self.factory.as_ref(), &self.options.connection_string)
    }

    /// Clear queued parameters and close the connection if one exists.
    ///
    /// # Errors
    /// Returns the driver error if closing fails.
    pub fn close(&mut self) -> Result<(), SqlExecError> {
        self.state.close()
    }

    /// Begin a transaction, opening the connection first. Returns the existing handle
    /// if one is already active.
    ///
    /// # Errors
    /// Returns `SqlExecError` if opening or beginning fails.
    pub fn begin_transaction(
        &mut self,
        isolation: IsolationLevel,
    ) -> Result<TransactionHandle, SqlExecError> {
        self.state.begin(
            self.factory.as_ref(),
            &self.options.connection_string,
            isolation,
        )
    }

    /// Begin a transaction at the configured isolation level.
    ///
    /// # Errors
    /// See [`DbManager::begin_transaction`].
    pub fn begin_default_transaction(&mut self) -> Result<TransactionHandle, SqlExecError> {
        self.begin_transaction(self.options.isolation)
    }

    /// Commit the active transaction; a no-op without one.
    ///
    /// If the driver commit fails the error is returned unwrapped and the transaction
    /// stays active, so the caller must still roll back.
    ///
    /// # Errors
    /// Returns `SqlExecError::Transaction` if the driver commit fails.
    pub fn commit_transaction(&mut self) -> Result<(), SqlExecError> {
        self.state.commit()
    }

    /// Roll back the active transaction; a no-op without one.
    ///
    /// # Errors
    /// Returns `SqlExecError::Transaction` if the driver rollback fails; the
    /// transaction stays active in that case.
    pub fn rollback_transaction(&mut self) -> Result<(), SqlExecError> {
        self.state.rollback()
    }

    #[must_use]
    pub fn transaction(&self) -> Option<&TransactionHandle> {
        self.state.transaction()
    }

    #[must_use]
    pub fn is_in_transaction(&self) -> bool {
        self.state.transaction().is_some()
    }

    /// A parameter pre-filled with the provider's defaults.
    #[must_use]
    pub fn create_parameter(&self, name: impl Into<String>, value: impl Into<DbValue>) -> Parameter {
        let mut parameter = self.factory.create_parameter();
        parameter.name = name.into();
        parameter.value = Some(value.into());
        parameter
    }

    /// Queue a parameter for the next execution; `None` is ignored.
    pub fn add_parameter(&mut self, parameter: impl Into<Option<Parameter>>) {
        self.state.add_parameter(parameter.into());
    }

    pub fn add_parameters(&mut self, parameters: impl IntoIterator<Item = Parameter>) {
        for parameter in parameters {
            self.state.add_parameter(Some(parameter));
        }
    }

    /// Empty the queue and the last command's parameters.
    pub fn clear_parameters(&mut self) {
        self.state.clear_parameters();
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.state.parameters().len()
    }

    /// Value of `name` as attached to the most recent command.
    ///
    /// Only meaningful after an execution; output parameters carry what the driver
    /// wrote back.
    #[must_use]
    pub fn get_parameter_value(&self, name: &str) -> Option<&DbValue> {
        self.state.command().and_then(|c| c.parameter_value(name))
    }

    /// Reader stored by the last `execute_reader`.
    pub fn reader_mut(&mut self) -> Option<&mut DataReader> {
        self.state.reader_mut()
    }

    /// Close and drop the stored reader.
    pub fn close_reader(&mut self) {
        self.state.close_reader();
    }

    /// Run `func` as a unit of work with guaranteed release.
    ///
    /// On every exit path (including a panic inside `func`) the reader is closed, a
    /// transaction left active by an error is rolled back, and the manager is closed.
    ///
    /// # Errors
    /// Returns the error from `func`, or the close error if `func` succeeded.
    pub fn scope<T>(
        &mut self,
        func: impl FnOnce(&mut Self) -> Result<T, SqlExecError>,
    ) -> Result<T, SqlExecError> {
        let mut guard = ScopeGuard {
            manager: self,
            armed: true,
        };
        let result = func(&mut *guard.manager);
        guard.armed = false;
        let manager = &mut *guard.manager;
        manager.close_reader();
        if result.is_err() {
            manager.rollback_quietly();
        }
        let closed = manager.close();
        match (result, closed) {
            (Err(e), _) | (Ok(_), Err(e)) => Err(e),
            (Ok(value), Ok(())) => Ok(value),
        }
    }

    pub(crate) fn rollback_quietly(&mut self) {
        if let Err(err) = self.rollback_transaction() {
            warn!(error = %err, "rollback failed during cleanup");
        }
    }

    /// Drop the manager, applying its teardown policy.
    pub fn dispose(self) {
        drop(self);
    }
}

struct ScopeGuard<'m> {
    manager: &'m mut DbManager,
    armed: bool,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.manager.close_reader();
            self.manager.rollback_quietly();
            if let Err(err) = self.manager.close() {
                warn!(error = %err, "close failed during unwinding");
            }
        }
    }
}

impl Drop for DbManager {
    fn drop(&mut self) {
        if self.options.teardown == TeardownPolicy::CloseConnection
            && let Err(err) = self.state.close()
        {
            warn!(error = %err, "close failed during teardown");
        }
        self.state.release();
    }
}

impl fmt::Debug for DbManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbManager")
            .field("provider", &self.factory.name())
            .field("connection_state", &self.state.connection_state())
            .field("transaction", &self.state.transaction())
            .field("parameters", &self.state.parameters().len())
            .finish_non_exhaustive()
    }
}
