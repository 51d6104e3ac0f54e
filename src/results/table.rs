use std::sync::Arc;

use super::row::{ColumnIndex, DataRow, build_column_index};
use crate::types::DbValue;

/// Culture a table's values should be parsed and formatted with.
///
/// Tables built by the engine's executors are always pinned to `Invariant` so that
/// consumers never depend on the host environment when reading numbers or dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    /// Whatever the host environment uses
    #[default]
    Current,
    /// Environment independent formatting (ISO dates, `.` decimal separator)
    Invariant,
}

/// A fully materialized result.
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    pub name: String,
    pub rows: Vec<DataRow>,
    pub locale: Locale,
    column_names: Arc<Vec<String>>,
    column_index: ColumnIndex,
}

impl DataTable {
    #[must_use]
    pub fn new(name: impl Into<String>, column_names: Vec<String>) -> Self {
        Self::with_shared_columns(name, Arc::new(column_names))
    }

    #[must_use]
    pub fn with_shared_columns(name: impl Into<String>, column_names: Arc<Vec<String>>) -> Self {
        let column_index = build_column_index(&column_names);
        Self {
            name: name.into(),
            rows: Vec::new(),
            locale: Locale::default(),
            column_names,
            column_index,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &Arc<Vec<String>> {
        &self.column_names
    }

    /// Ordinal of a column, exact match first, then ASCII case-insensitive.
    #[must_use]
    pub fn column_ordinal(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index.get(column_name) {
            return Some(idx);
        }
        self.column_names
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column_name))
    }

    /// Append a row that shares this table's column names.
    pub fn add_row_values(&mut self, values: Vec<DbValue>) {
        self.rows.push(DataRow::with_index(
            Arc::clone(&self.column_names),
            values,
            Arc::clone(&self.column_index),
        ));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value at `(row, column)`, by column name.
    #[must_use]
    pub fn value(&self, row: usize, column_name: &str) -> Option<&DbValue> {
        let ordinal = self.column_ordinal(column_name)?;
        self.rows.get(row).and_then(|r| r.get_by_index(ordinal))
    }
}

/// Ordered collection of tables filled by a data adapter.
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    pub tables: Vec<DataTable>,
    pub locale: Locale,
}

impl DataSet {
    #[must_use]
    pub fn new(tables: Vec<DataTable>) -> Self {
        Self {
            tables,
            locale: Locale::default(),
        }
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&DataTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Pin the set and every table in it to `locale`.
    pub fn set_locale(&mut self, locale: Locale) {
        self.locale = locale;
        for table in &mut self.tables {
            table.locale = locale;
        }
    }
}
