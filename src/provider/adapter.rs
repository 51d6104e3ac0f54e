use super::{DataAdapter, DriverConnection};
use crate::command::Command;
use crate::error::DriverError;
use crate::results::DataSet;

/// Default adapter: runs the command as a reader and drains every result into a table.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReaderAdapter;

impl DataAdapter for ReaderAdapter {
    fn fill(
        &mut self,
        connection: &mut dyn DriverConnection,
        command: &mut Command,
    ) -> Result<DataSet, DriverError> {
        let reader = connection.execute_reader(command)?;
        Ok(DataSet::new(reader.into_tables()?))
    }
}
