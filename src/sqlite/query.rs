use std::sync::Arc;

use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::DriverError;
use crate::results::DataTable;
use crate::types::DbValue;

/// Extract a `DbValue` from a `SQLite` row.
///
/// # Errors
///
/// Returns `DriverError` if the value cannot be read.
pub fn sqlite_extract_value(row: &rusqlite::Row<'_>, idx: usize) -> Result<DbValue, DriverError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => DbValue::Null,
        Value::Integer(i) => DbValue::Int(i),
        Value::Real(f) => DbValue::Float(f),
        Value::Text(s) => DbValue::Text(s),
        Value::Blob(b) => DbValue::Blob(b),
    })
}

/// Run an already bound statement and collect its rows into a table.
///
/// DML statements run too; they simply yield a table without rows.
///
/// # Errors
/// Returns `DriverError` if stepping the statement or reading a value fails.
pub fn build_data_table(stmt: &mut Statement<'_>, name: &str) -> Result<DataTable, DriverError> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();

    let mut table = DataTable::with_shared_columns(name, Arc::new(column_names));
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value(row, i)?);
        }
        table.add_row_values(row_values);
    }
    Ok(table)
}
