// SQLite provider - the built-in driver family behind the `sqlite` feature
//
// - connection: `DriverConnection` over a `rusqlite::Connection`
// - params: binding engine parameters onto prepared statements
// - query: result extraction into tables
// - schema: metadata collections
// - transaction: BEGIN/COMMIT/ROLLBACK helpers

pub mod connection;
pub mod params;
pub mod query;
pub mod schema;
pub mod transaction;

use chrono::NaiveDateTime;

use crate::provider::{DriverConnection, ProviderFactory};
use crate::types::{DbValue, ProviderTag};

pub use connection::SqliteConnection;
pub use query::build_data_table;

/// Factory registered for [`ProviderTag::Sqlite`] in the default registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteProviderFactory;

impl ProviderFactory for SqliteProviderFactory {
    fn provider(&self) -> Option<ProviderTag> {
        Some(ProviderTag::Sqlite)
    }

    fn create_connection(&self) -> Option<Box<dyn DriverConnection>> {
        Some(Box::new(SqliteConnection::default()))
    }

    fn coerce_datetime(&self, value: NaiveDateTime) -> DbValue {
        DbValue::Text(params::format_timestamp(&value))
    }
}
