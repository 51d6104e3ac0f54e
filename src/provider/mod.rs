//! Provider factory contract and the driver traits it hands out.
//!
//! A provider is resolved either through a [`ProviderRegistry`] keyed by
//! [`ProviderTag`], or supplied directly as a custom factory that skips the registry.

pub mod adapter;
pub mod registry;

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::command::Command;
use crate::error::DriverError;
use crate::parameter::Parameter;
use crate::results::{DataReader, DataSet, DataTable};
use crate::types::{ConnectionState, DbValue, IsolationLevel, ProviderTag};

pub use adapter::ReaderAdapter;
pub use registry::ProviderRegistry;

/// A single driver-level connection.
///
/// Commands are executed through the connection that owns them; the transaction,
/// if any, is the one begun on this connection.
pub trait DriverConnection: Send {
    fn set_connection_string(&mut self, connection_string: &str);

    fn connection_string(&self) -> &str;

    fn state(&self) -> ConnectionState;

    /// # Errors
    /// Returns `DriverError` if the driver cannot open the connection.
    fn open(&mut self) -> Result<(), DriverError>;

    /// # Errors
    /// Returns `DriverError` if the driver fails while closing.
    fn close(&mut self) -> Result<(), DriverError>;

    /// # Errors
    /// Returns `DriverError` if the transaction cannot be started.
    fn begin_transaction(&mut self, isolation: IsolationLevel) -> Result<(), DriverError>;

    /// # Errors
    /// Returns `DriverError` if committing fails.
    fn commit_transaction(&mut self) -> Result<(), DriverError>;

    /// # Errors
    /// Returns `DriverError` if rolling back fails.
    fn rollback_transaction(&mut self) -> Result<(), DriverError>;

    /// Execute a statement and return the affected-row count.
    ///
    /// Drivers write output parameter values back into `command.parameters`.
    ///
    /// # Errors
    /// Returns `DriverError` if execution fails.
    fn execute_non_query(&mut self, command: &mut Command) -> Result<usize, DriverError>;

    /// # Errors
    /// Returns `DriverError` if execution fails.
    fn execute_reader(&mut self, command: &mut Command) -> Result<DataReader, DriverError>;

    /// First column of the first row, or `DbValue::Null` when there are no rows.
    ///
    /// # Errors
    /// Returns `DriverError` if execution or reading fails.
    fn execute_scalar(&mut self, command: &mut Command) -> Result<DbValue, DriverError> {
        let mut reader = self.execute_reader(command)?;
        let value = if reader.read()? && reader.field_count() > 0 {
            reader.get(0)?.clone()
        } else {
            DbValue::Null
        };
        reader.close();
        Ok(value)
    }

    /// Metadata collection lookup; `None` lists the available collections.
    ///
    /// # Errors
    /// Returns `DriverError` if the collection is unknown or the lookup fails.
    fn schema(&mut self, collection: Option<&str>) -> Result<DataTable, DriverError>;
}

/// Fills a [`DataSet`] from a prepared command.
pub trait DataAdapter: Send {
    /// # Errors
    /// Returns `DriverError` if executing the command or reading its results fails.
    fn fill(
        &mut self,
        connection: &mut dyn DriverConnection,
        command: &mut Command,
    ) -> Result<DataSet, DriverError>;
}

/// Constructors for one driver family.
///
/// Returning `None` from a constructor is a provider resolution failure; the engine
/// raises it before any driver call is attempted.
pub trait ProviderFactory: Send + Sync {
    /// Tag this factory serves, `None` for a fully custom factory.
    fn provider(&self) -> Option<ProviderTag>;

    fn name(&self) -> String {
        self.provider()
            .map_or_else(|| "custom".to_owned(), |tag| tag.to_string())
    }

    fn create_connection(&self) -> Option<Box<dyn DriverConnection>>;

    fn create_command(&self) -> Option<Command> {
        Some(Command::default())
    }

    fn create_parameter(&self) -> Parameter {
        Parameter::default()
    }

    fn create_data_adapter(&self) -> Option<Box<dyn DataAdapter>> {
        Some(Box::new(ReaderAdapter))
    }

    /// Provider-native representation of a date/time input parameter.
    fn coerce_datetime(&self, value: NaiveDateTime) -> DbValue {
        DbValue::Timestamp(value)
    }

    /// Value bound for an input parameter whose value is unset.
    fn null_value(&self) -> DbValue {
        DbValue::Null
    }
}

/// How a manager picks its provider factory.
#[derive(Clone)]
pub enum ProviderDescriptor {
    /// Resolve through a registry.
    Tag(ProviderTag),
    /// Use this factory as-is.
    Custom(Arc<dyn ProviderFactory>),
}

impl ProviderDescriptor {
    /// Tag of the resolved provider, if any.
    #[must_use]
    pub fn tag(&self) -> Option<ProviderTag> {
        match self {
            ProviderDescriptor::Tag(tag) => Some(*tag),
            ProviderDescriptor::Custom(factory) => factory.provider(),
        }
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderDescriptor::Tag(tag) => f.debug_tuple("Tag").field(tag).finish(),
            ProviderDescriptor::Custom(factory) => {
                f.debug_tuple("Custom").field(&factory.name()).finish()
            }
        }
    }
}

impl From<ProviderTag> for ProviderDescriptor {
    fn from(tag: ProviderTag) -> Self {
        ProviderDescriptor::Tag(tag)
    }
}
