//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types so that a single
//! `use sql_exec::prelude::*;` is enough to drive a manager.

pub use crate::command::{CommandOptions, TransactionHandle};
pub use crate::config::{ManagerOptions, ManagerOptionsBuilder};
pub use crate::engine::{
    BatchCommand, BatchOutcome, CommandBuilder, DbManager, FailurePolicy, TeardownPolicy,
};
pub use crate::error::{DiagnosticContext, DriverError, SqlExecError};
pub use crate::parameter::Parameter;
pub use crate::provider::{ProviderDescriptor, ProviderFactory, ProviderRegistry};
pub use crate::results::{DataReader, DataRow, DataSet, DataTable, Locale};
pub use crate::types::{
    CommandKind, ConnectionState, DbType, DbValue, IsolationLevel, ParameterDirection,
    ProviderTag,
};
