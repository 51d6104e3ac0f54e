use super::DbManager;
use crate::error::SqlExecError;
use crate::parameter::Parameter;
use crate::results::DataReader;
use crate::types::CommandKind;

impl DbManager {
    /// Run `text` as a reader and map every row with `map`, in cursor order.
    ///
    /// # Errors
    /// See [`DbManager::query_map_with`].
    pub fn query_map<T>(
        &mut self,
        text: &str,
        parameters: impl IntoIterator<Item = Parameter>,
        mut map: impl FnMut(&DataReader) -> Result<T, SqlExecError>,
    ) -> Result<Vec<T>, SqlExecError> {
        self.query_map_with(text, parameters, |_| Ok(()), |reader, ()| map(reader))
    }

    /// Run `text` as a reader, call `prepare` once before the first row (typically to
    /// resolve column ordinals), then map every row with `map`.
    ///
    /// The reader and the connection are closed on every exit path. Errors from
    /// reading rows, `prepare` or `map` are returned as they are, without diagnostic
    /// context; only the reader execution itself is enriched.
    ///
    /// ```rust,no_run
    /// use sql_exec::prelude::*;
    /// # fn demo(db: &mut DbManager) -> Result<(), SqlExecError> {
    /// let names = db.query_map_with(
    ///     "SELECT id, name FROM users WHERE active = @active",
    ///     [Parameter::input("active", true)],
    ///     |r| Ok((r.get_ordinal("id")?, r.get_ordinal("name")?)),
    ///     |r, &(id, name)| {
    ///         Ok(format!("{:?}:{:?}", r.get(id)?, r.get(name)?))
    ///     },
    /// )?;
    /// # let _ = names;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns the enriched execution error, any error from `prepare`, `map` or the
    /// cursor, or the close error when everything else succeeded.
    pub fn query_map_with<T, S>(
        &mut self,
        text: &str,
        parameters: impl IntoIterator<Item = Parameter>,
        prepare: impl FnOnce(&DataReader) -> Result<S, SqlExecError>,
        map: impl FnMut(&DataReader, &S) -> Result<T, SqlExecError>,
    ) -> Result<Vec<T>, SqlExecError> {
        self.add_parameters(parameters);
        let result = self.project_rows(text, prepare, map);
        self.close_reader();
        let closed = self.close();
        match (result, closed) {
            (Err(e), _) | (Ok(_), Err(e)) => Err(e),
            (Ok(rows), Ok(())) => Ok(rows),
        }
    }

    fn project_rows<T, S>(
        &mut self,
        text: &str,
        prepare: impl FnOnce(&DataReader) -> Result<S, SqlExecError>,
        mut map: impl FnMut(&DataReader, &S) -> Result<T, SqlExecError>,
    ) -> Result<Vec<T>, SqlExecError> {
        let reader = self.execute_reader(CommandKind::Text, text)?;
        let state = prepare(&*reader)?;
        let mut rows = Vec::new();
        while reader.read()? {
            rows.push(map(&*reader, &state)?);
        }
        Ok(rows)
    }
}
