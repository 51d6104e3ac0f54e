//! Provider-agnostic, synchronous database execution engine.
//!
//! A [`DbManager`] owns one connection, at most one transaction and a queue of
//! parameters, and exposes the usual operation shapes (non-query, reader, scalar,
//! table, dataset, schema) on top of any driver family that implements the
//! [`provider::ProviderFactory`] contract. Two higher-level helpers sit on top:
//! [`DbManager::execute_batch`] for per-record parameterized execution inside one
//! transaction, and [`DbManager::query_map`] for projecting reader rows into values.
//!
//! ```rust,no_run
//! use sql_exec::prelude::*;
//!
//! # fn main() -> Result<(), SqlExecError> {
//! let mut db = ManagerOptions::builder(ProviderTag::Sqlite, "app.db").build()?;
//! db.execute_non_query(CommandKind::Text, "CREATE TABLE IF NOT EXISTS t (id INTEGER)")?;
//! db.add_parameter(Parameter::input("id", 1));
//! db.execute_non_query(CommandKind::Text, "INSERT INTO t (id) VALUES (@id)")?;
//! let count = db.execute_scalar(CommandKind::Text, "SELECT COUNT(*) FROM t")?;
//! db.close()?;
//! # let _ = count;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod parameter;
pub mod prelude;
pub mod provider;
pub mod results;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod types;

pub use command::{Command, CommandOptions, TransactionHandle};
pub use config::{ManagerOptions, ManagerOptionsBuilder};
pub use engine::{
    BatchCommand, BatchOutcome, CommandBuilder, DbManager, FailurePolicy, TeardownPolicy,
};
pub use error::{DiagnosticContext, DriverError, ProviderComponent, SqlExecError};
pub use parameter::{Parameter, ParameterRegistry};
pub use results::{DataReader, DataRow, DataSet, DataTable, Locale};
pub use types::{
    CommandKind, ConnectionState, DbType, DbValue, IsolationLevel, ParameterDirection,
    ProviderTag,
};
