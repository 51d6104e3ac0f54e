use rusqlite::Connection;

use super::query::build_data_table;
use crate::error::DriverError;
use crate::results::DataTable;
use crate::types::DbValue;

/// Collections answered by [`collection`].
pub const COLLECTIONS: &[&str] = &["MetaDataCollections", "Tables", "Views", "Indexes", "Columns"];

const TABLES_SQL: &str = "SELECT name AS TABLE_NAME, type AS TABLE_TYPE FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

const VIEWS_SQL: &str = "SELECT name AS TABLE_NAME, sql AS VIEW_DEFINITION FROM sqlite_master \
     WHERE type = 'view' ORDER BY name";

const INDEXES_SQL: &str = "SELECT name AS INDEX_NAME, tbl_name AS TABLE_NAME FROM sqlite_master \
     WHERE type = 'index' AND name NOT LIKE 'sqlite_%' ORDER BY tbl_name, name";

const COLUMNS_SQL: &str = "SELECT m.name AS TABLE_NAME, p.name AS COLUMN_NAME, \
     p.cid AS ORDINAL_POSITION, p.type AS DATA_TYPE, NOT p.\"notnull\" AS IS_NULLABLE, \
     p.dflt_value AS COLUMN_DEFAULT, p.pk AS PRIMARY_KEY \
     FROM sqlite_master m JOIN pragma_table_info(m.name) p \
     WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%' ORDER BY m.name, p.cid";

fn run(conn: &Connection, sql: &str, name: &str) -> Result<DataTable, DriverError> {
    let mut stmt = conn.prepare(sql)?;
    build_data_table(&mut stmt, name)
}

/// Look up a metadata collection by (case-insensitive) name.
///
/// # Errors
/// Returns `DriverError::Unsupported` for unknown collections, or the `SQLite` error
/// if the catalog query fails.
pub fn collection(conn: &Connection, name: Option<&str>) -> Result<DataTable, DriverError> {
    let name = name.unwrap_or("MetaDataCollections");
    match name.to_ascii_lowercase().as_str() {
        "metadatacollections" => {
            let mut table = DataTable::new("MetaDataCollections", vec!["CollectionName".into()]);
            for c in COLLECTIONS {
                table.add_row_values(vec![DbValue::Text((*c).to_owned())]);
            }
            Ok(table)
        }
        "tables" => run(conn, TABLES_SQL, "Tables"),
        "views" => run(conn, VIEWS_SQL, "Views"),
        "indexes" => run(conn, INDEXES_SQL, "Indexes"),
        "columns" => run(conn, COLUMNS_SQL, "Columns"),
        _ => Err(DriverError::Unsupported(format!(
            "unknown schema collection {name}"
        ))),
    }
}
