#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDateTime;
use sql_exec::Command;
use sql_exec::prelude::*;
use sql_exec::provider::{DataAdapter, DriverConnection, ReaderAdapter};
use sql_exec::results::{DataRow, RowCursor};

/// Driver calls observed by a [`MockProvider`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Calls {
    pub connections_created: usize,
    pub commands_created: usize,
    pub opens: usize,
    pub closes: usize,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub non_queries: usize,
    pub readers: usize,
    pub reader_closes: usize,
    pub schema_lookups: usize,
}

/// What the mock driver does.
#[derive(Debug, Default)]
pub struct Script {
    pub null_connection: bool,
    pub null_command: bool,
    pub null_adapter: bool,
    pub fail_open: bool,
    pub fail_commit: bool,
    pub fail_schema: bool,
    /// Results for successive non-queries; `Ok(1)` once exhausted.
    pub non_query_results: VecDeque<Result<usize, String>>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<DbValue>>,
    /// Row index (0-based) whose `read` fails.
    pub fail_read_at: Option<usize>,
    /// Values written into output parameters by `execute_non_query`.
    pub outputs: Vec<(String, DbValue)>,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub calls: Calls,
    pub script: Script,
    /// Parameters attached to each executed command, in order.
    pub seen_parameters: Vec<Vec<Parameter>>,
    pub seen_transactions: Vec<Option<TransactionHandle>>,
    pub seen_texts: Vec<String>,
    pub seen_timeouts: Vec<Option<Duration>>,
}

#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Script) -> Self {
        let provider = Self::default();
        provider.lock().script = script;
        provider
    }

    pub fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    pub fn calls(&self) -> Calls {
        self.lock().calls.clone()
    }

    pub fn manager(&self) -> DbManager {
        self.manager_with(|b| b)
    }

    pub fn manager_with(
        &self,
        configure: impl FnOnce(ManagerOptionsBuilder) -> ManagerOptionsBuilder,
    ) -> DbManager {
        configure(
            ManagerOptions::builder(ProviderTag::SqlServer, "Server=mock;Database=test")
                .custom_factory(Arc::new(self.clone())),
        )
        .build()
        .expect("mock manager")
    }
}

impl ProviderFactory for MockProvider {
    fn provider(&self) -> Option<ProviderTag> {
        Some(ProviderTag::SqlServer)
    }

    fn create_connection(&self) -> Option<Box<dyn DriverConnection>> {
        let mut state = self.lock();
        if state.script.null_connection {
            return None;
        }
        state.calls.connections_created += 1;
        Some(Box::new(MockConnection {
            shared: Arc::clone(&self.state),
            connection_string: String::new(),
            state: ConnectionState::Closed,
            in_transaction: false,
        }))
    }

    fn create_command(&self) -> Option<Command> {
        let mut state = self.lock();
        if state.script.null_command {
            return None;
        }
        state.calls.commands_created += 1;
        Some(Command::default())
    }

    fn create_data_adapter(&self) -> Option<Box<dyn DataAdapter>> {
        if self.lock().script.null_adapter {
            None
        } else {
            Some(Box::new(ReaderAdapter))
        }
    }

    fn coerce_datetime(&self, value: NaiveDateTime) -> DbValue {
        DbValue::Text(value.format("%Y%m%d %H:%M:%S").to_string())
    }

    fn null_value(&self) -> DbValue {
        DbValue::Text("DBNULL".into())
    }
}

pub struct MockConnection {
    shared: Arc<Mutex<MockState>>,
    connection_string: String,
    state: ConnectionState,
    in_transaction: bool,
}

impl MockConnection {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.shared.lock().expect("mock state poisoned")
    }

    fn record(&self, command: &Command) {
        let mut shared = self.lock();
        shared.seen_parameters.push(command.parameters.clone());
        shared.seen_transactions.push(command.transaction);
        shared.seen_texts.push(command.text.clone());
        shared.seen_timeouts.push(command.timeout);
    }
}

impl DriverConnection for MockConnection {
    fn set_connection_string(&mut self, connection_string: &str) {
        self.connection_string = connection_string.to_owned();
    }

    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn open(&mut self) -> Result<(), DriverError> {
        let mut shared = self.lock();
        shared.calls.opens += 1;
        if shared.script.fail_open {
            return Err(DriverError::Other("server unreachable".into()));
        }
        drop(shared);
        self.state = ConnectionState::Open;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.lock().calls.closes += 1;
        self.state = ConnectionState::Closed;
        Ok(())
    }

    fn begin_transaction(&mut self, _isolation: IsolationLevel) -> Result<(), DriverError> {
        self.lock().calls.begins += 1;
        self.in_transaction = true;
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<(), DriverError> {
        let mut shared = self.lock();
        shared.calls.commits += 1;
        if shared.script.fail_commit {
            return Err(DriverError::Other("commit refused".into()));
        }
        drop(shared);
        self.in_transaction = false;
        Ok(())
    }

    fn rollback_transaction(&mut self) -> Result<(), DriverError> {
        self.lock().calls.rollbacks += 1;
        self.in_transaction = false;
        Ok(())
    }

    fn execute_non_query(&mut self, command: &mut Command) -> Result<usize, DriverError> {
        self.record(command);
        let mut shared = self.lock();
        shared.calls.non_queries += 1;
        for (name, value) in shared.script.outputs.clone() {
            if let Some(p) = command.parameter_mut(&name) {
                p.value = Some(value);
            }
        }
        match shared.script.non_query_results.pop_front() {
            Some(Ok(n)) => Ok(n),
            Some(Err(msg)) => Err(DriverError::Other(msg)),
            None => Ok(1),
        }
    }

    fn execute_reader(&mut self, command: &mut Command) -> Result<DataReader, DriverError> {
        self.record(command);
        let mut shared = self.lock();
        shared.calls.readers += 1;
        let columns = Arc::new(shared.script.columns.clone());
        let rows = shared
            .script
            .rows
            .iter()
            .map(|values| DataRow::new(Arc::clone(&columns), values.clone()))
            .collect();
        let fail_read_at = shared.script.fail_read_at;
        drop(shared);
        Ok(DataReader::new(Box::new(MockCursor {
            shared: Arc::clone(&self.shared),
            columns,
            rows,
            position: None,
            fail_read_at,
        })))
    }

    fn schema(&mut self, collection: Option<&str>) -> Result<DataTable, DriverError> {
        let mut shared = self.lock();
        shared.calls.schema_lookups += 1;
        if shared.script.fail_schema {
            return Err(DriverError::Unsupported("no catalog".into()));
        }
        Ok(DataTable::new(
            collection.unwrap_or("MetaDataCollections"),
            vec!["CollectionName".into()],
        ))
    }
}

struct MockCursor {
    shared: Arc<Mutex<MockState>>,
    columns: Arc<Vec<String>>,
    rows: Vec<DataRow>,
    position: Option<usize>,
    fail_read_at: Option<usize>,
}

impl RowCursor for MockCursor {
    fn column_names(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.columns)
    }

    fn read(&mut self) -> Result<bool, DriverError> {
        let next = self.position.map_or(0, |p| p + 1);
        if self.fail_read_at == Some(next) {
            return Err(DriverError::Other(format!("read failed at row {next}")));
        }
        self.position = Some(next);
        Ok(next < self.rows.len())
    }

    fn current(&self) -> Option<&DataRow> {
        self.position.and_then(|p| self.rows.get(p))
    }

    fn next_result(&mut self) -> Result<bool, DriverError> {
        Ok(false)
    }

    fn close(&mut self) {
        self.shared
            .lock()
            .expect("mock state poisoned")
            .calls
            .reader_closes += 1;
    }
}
