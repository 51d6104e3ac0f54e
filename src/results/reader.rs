use std::fmt;
use std::sync::Arc;

use super::row::DataRow;
use super::table::DataTable;
use crate::error::DriverError;
use crate::types::DbValue;

/// Driver-side forward-only cursor.
///
/// Drivers that stream rows implement this directly; drivers that materialize
/// their results can hand back a [`BufferedCursor`].
pub trait RowCursor: Send {
    /// Column names of the current result.
    fn column_names(&self) -> Arc<Vec<String>>;

    /// Advance to the next row of the current result.
    ///
    /// # Errors
    /// Returns `DriverError` if the driver fails to produce the next row.
    fn read(&mut self) -> Result<bool, DriverError>;

    /// Row the cursor is positioned on, if any.
    fn current(&self) -> Option<&DataRow>;

    /// Move to the next result of a multi-result command.
    ///
    /// # Errors
    /// Returns `DriverError` if the driver fails while switching results.
    fn next_result(&mut self) -> Result<bool, DriverError>;

    /// Rows changed by the statement(s) that produced this cursor.
    fn records_affected(&self) -> usize {
        0
    }

    /// Name the driver gives the current result, if any.
    fn table_name(&self) -> Option<&str> {
        None
    }

    fn close(&mut self);
}

/// Cursor over results that were already materialized.
#[derive(Debug, Default)]
pub struct BufferedCursor {
    tables: Vec<DataTable>,
    table_idx: usize,
    position: Option<usize>,
    records_affected: usize,
}

impl BufferedCursor {
    #[must_use]
    pub fn new(tables: Vec<DataTable>, records_affected: usize) -> Self {
        Self {
            tables,
            table_idx: 0,
            position: None,
            records_affected,
        }
    }
}

impl RowCursor for BufferedCursor {
    fn column_names(&self) -> Arc<Vec<String>> {
        self.tables
            .get(self.table_idx)
            .map(|t| Arc::clone(t.column_names()))
            .unwrap_or_default()
    }

    fn read(&mut self) -> Result<bool, DriverError> {
        let Some(table) = self.tables.get(self.table_idx) else {
            return Ok(false);
        };
        let next = self.position.map_or(0, |p| p + 1);
        if next < table.rows.len() {
            self.position = Some(next);
            Ok(true)
        } else {
            self.position = Some(table.rows.len());
            Ok(false)
        }
    }

    fn current(&self) -> Option<&DataRow> {
        let table = self.tables.get(self.table_idx)?;
        self.position.and_then(|p| table.rows.get(p))
    }

    fn next_result(&mut self) -> Result<bool, DriverError> {
        if self.table_idx + 1 < self.tables.len() {
            self.table_idx += 1;
            self.position = None;
            Ok(true)
        } else {
            self.table_idx = self.tables.len();
            Ok(false)
        }
    }

    fn records_affected(&self) -> usize {
        self.records_affected
    }

    fn table_name(&self) -> Option<&str> {
        self.tables
            .get(self.table_idx)
            .map(|t| t.name.as_str())
            .filter(|name| !name.is_empty())
    }

    fn close(&mut self) {
        self.tables.clear();
        self.position = None;
    }
}

/// Forward-only reader returned by `execute_reader`.
///
/// Closing is idempotent: the underlying cursor's `close` runs at most once, either
/// explicitly or when the reader is dropped.
pub struct DataReader {
    cursor: Box<dyn RowCursor>,
    closed: bool,
}

impl DataReader {
    #[must_use]
    pub fn new(cursor: Box<dyn RowCursor>) -> Self {
        Self {
            cursor,
            closed: false,
        }
    }

    /// Reader over already materialized tables.
    #[must_use]
    pub fn buffered(tables: Vec<DataTable>, records_affected: usize) -> Self {
        Self::new(Box::new(BufferedCursor::new(tables, records_affected)))
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed {
            Err(DriverError::InvalidState("reader is closed".into()))
        } else {
            Ok(())
        }
    }

    /// Advance to the next row.
    ///
    /// # Errors
    /// Returns `DriverError` if the reader is closed or the driver fails.
    pub fn read(&mut self) -> Result<bool, DriverError> {
        self.ensure_open()?;
        self.cursor.read()
    }

    /// Advance to the next result.
    ///
    /// # Errors
    /// Returns `DriverError` if the reader is closed or the driver fails.
    pub fn next_result(&mut self) -> Result<bool, DriverError> {
        self.ensure_open()?;
        self.cursor.next_result()
    }

    #[must_use]
    pub fn column_names(&self) -> Arc<Vec<String>> {
        self.cursor.column_names()
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.cursor.column_names().len()
    }

    /// Ordinal of `name` in the current result.
    ///
    /// # Errors
    /// Returns `DriverError::InvalidState` if no such column exists.
    pub fn get_ordinal(&self, name: &str) -> Result<usize, DriverError> {
        let columns = self.cursor.column_names();
        columns
            .iter()
            .position(|c| c == name)
            .or_else(|| columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
            .ok_or_else(|| DriverError::InvalidState(format!("no column named {name}")))
    }

    /// Value at `ordinal` on the current row.
    ///
    /// # Errors
    /// Returns `DriverError::InvalidState` if the reader is closed, not positioned on a row,
    /// or `ordinal` is out of range.
    pub fn get(&self, ordinal: usize) -> Result<&DbValue, DriverError> {
        self.ensure_open()?;
        let row = self
            .cursor
            .current()
            .ok_or_else(|| DriverError::InvalidState("reader is not positioned on a row".into()))?;
        row.get_by_index(ordinal)
            .ok_or_else(|| DriverError::InvalidState(format!("ordinal {ordinal} out of range")))
    }

    /// Value of column `name` on the current row.
    ///
    /// # Errors
    /// See [`DataReader::get`] and [`DataReader::get_ordinal`].
    pub fn get_by_name(&self, name: &str) -> Result<&DbValue, DriverError> {
        let ordinal = self.get_ordinal(name)?;
        self.get(ordinal)
    }

    #[must_use]
    pub fn current_row(&self) -> Option<&DataRow> {
        if self.closed {
            None
        } else {
            self.cursor.current()
        }
    }

    #[must_use]
    pub fn records_affected(&self) -> usize {
        self.cursor.records_affected()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.cursor.close();
        }
    }

    /// Drain every remaining result into tables, closing the reader.
    ///
    /// Results the driver leaves unnamed become `Table`, `Table1`, `Table2` and so on.
    ///
    /// # Errors
    /// Returns `DriverError` if reading fails.
    pub fn into_tables(mut self) -> Result<Vec<DataTable>, DriverError> {
        let mut tables = Vec::new();
        loop {
            let name = match (self.cursor.table_name(), tables.len()) {
                (Some(name), _) => name.to_owned(),
                (None, 0) => "Table".to_owned(),
                (None, n) => format!("Table{n}"),
            };
            let mut table = DataTable::with_shared_columns(name, self.column_names());
            while self.read()? {
                if let Some(row) = self.cursor.current() {
                    table.add_row_values(row.values.clone());
                }
            }
            tables.push(table);
            if !self.next_result()? {
                break;
            }
        }
        self.close();
        Ok(tables)
    }
}

impl fmt::Debug for DataReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataReader")
            .field("columns", &self.cursor.column_names())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Drop for DataReader {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_row_table() -> DataTable {
        let mut t = DataTable::new("t", vec!["id".into()]);
        t.add_row_values(vec![DbValue::Int(1)]);
        t.add_row_values(vec![DbValue::Int(2)]);
        t
    }

    #[test]
    fn buffered_reader_walks_rows_in_order() {
        let mut reader = DataReader::buffered(vec![two_row_table()], 0);
        assert!(reader.get(0).is_err());
        assert!(reader.read().unwrap());
        assert_eq!(reader.get(0).unwrap(), &DbValue::Int(1));
        assert!(reader.read().unwrap());
        assert_eq!(reader.get_by_name("ID").unwrap(), &DbValue::Int(2));
        assert!(!reader.read().unwrap());
        assert!(!reader.next_result().unwrap());
    }

    #[test]
    fn closed_reader_rejects_reads() {
        let mut reader = DataReader::buffered(vec![two_row_table()], 0);
        reader.close();
        reader.close();
        assert!(reader.is_closed());
        assert!(reader.read().is_err());
    }

    #[test]
    fn into_tables_keeps_every_result() {
        let mut unnamed = two_row_table();
        unnamed.name.clear();
        let reader = DataReader::buffered(vec![unnamed.clone(), unnamed, two_row_table()], 0);
        let tables = reader.into_tables().unwrap();
        assert_eq!(tables.len(), 3);
        assert_eq!(tables[1].len(), 2);
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Table", "Table1", "t"]);
    }
}
