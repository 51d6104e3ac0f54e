//! Materialized results: rows, tables, datasets and the forward-only reader.

pub mod reader;
pub mod row;
pub mod table;

pub use reader::{BufferedCursor, DataReader, RowCursor};
pub use row::DataRow;
pub use table::{DataSet, DataTable, Locale};
