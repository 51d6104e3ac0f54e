use std::fmt::Write;

use chrono::NaiveDateTime;
use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::DriverError;
use crate::parameter::Parameter;
use crate::types::{DbValue, ParameterDirection};

// Thread-local buffer for timestamp formatting
thread_local! {
    static TIMESTAMP_BUF: std::cell::RefCell<String> = std::cell::RefCell::new(String::with_capacity(32));
}

/// Text form `SQLite` stores timestamps in.
#[must_use]
pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    TIMESTAMP_BUF.with(|buf| {
        let mut borrow = buf.borrow_mut();
        borrow.clear();
        // writing into a String cannot fail
        let _ = write!(borrow, "{}", dt.format("%F %T%.f"));
        borrow.clone()
    })
}

/// Convert a single `DbValue` to a rusqlite `Value`.
#[must_use]
pub fn db_value_to_sqlite_value(value: &DbValue) -> Value {
    match value {
        DbValue::Int(i) => Value::Integer(*i),
        DbValue::Float(f) => Value::Real(*f),
        DbValue::Text(s) => Value::Text(s.clone()),
        DbValue::Bool(b) => Value::Integer(i64::from(*b)),
        DbValue::Timestamp(dt) => Value::Text(format_timestamp(dt)),
        DbValue::Null => Value::Null,
        DbValue::Json(jval) => Value::Text(jval.to_string()),
        DbValue::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

const NAME_PREFIXES: [char; 3] = [':', '@', '$'];

/// 1-based index of a named parameter in `stmt`.
///
/// Names given with a prefix are looked up verbatim; bare names are tried with each
/// prefix `SQLite` accepts.
fn named_index(stmt: &Statement<'_>, name: &str) -> Result<Option<usize>, DriverError> {
    if name.starts_with(NAME_PREFIXES) || name.starts_with('?') {
        return Ok(stmt.parameter_index(name)?);
    }
    for prefix in NAME_PREFIXES {
        if let Some(idx) = stmt.parameter_index(&format!("{prefix}{name}"))? {
            return Ok(Some(idx));
        }
    }
    Ok(None)
}

/// Bind the command's parameters onto `stmt`.
///
/// Named parameters bind by name; unnamed ones bind positionally (for `?`
/// placeholders). Output and return-value parameters are not bound since `SQLite` has
/// no way to fill them.
///
/// # Errors
/// Returns `DriverError` if a name is not declared by the statement, a positional
/// parameter has no slot, a declared placeholder is left unbound, or binding fails.
pub fn bind_parameters(stmt: &mut Statement<'_>, parameters: &[Parameter]) -> Result<(), DriverError> {
    let expected = stmt.parameter_count();
    let mut bound = vec![false; expected];
    for (position, parameter) in parameters.iter().enumerate() {
        if matches!(
            parameter.direction,
            ParameterDirection::Output | ParameterDirection::ReturnValue
        ) {
            continue;
        }
        let index = if parameter.name.is_empty() {
            Some(position + 1).filter(|idx| *idx <= expected)
        } else {
            named_index(stmt, &parameter.name)?
        };
        let Some(index) = index else {
            return Err(DriverError::Other(format!(
                "no placeholder for parameter {:?} (statement declares {expected})",
                parameter.name
            )));
        };
        let value = parameter
            .value
            .as_ref()
            .map_or(Value::Null, db_value_to_sqlite_value);
        stmt.raw_bind_parameter(index, value)?;
        bound[index - 1] = true;
    }
    if let Some(missing) = bound.iter().position(|b| !b) {
        let name = stmt
            .parameter_name(missing + 1)
            .map_or_else(|| format!("?{}", missing + 1), str::to_owned);
        return Err(DriverError::Other(format!(
            "placeholder {name} has no parameter"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn timestamps_become_iso_text() {
        let dt = NaiveDate::from_ymd_opt(2023, 12, 31)
            .unwrap()
            .and_hms_milli_opt(23, 59, 58, 500)
            .unwrap();
        assert_eq!(
            db_value_to_sqlite_value(&DbValue::Timestamp(dt)),
            Value::Text("2023-12-31 23:59:58.500".into())
        );
    }

    #[test]
    fn bools_become_integers() {
        assert_eq!(db_value_to_sqlite_value(&DbValue::Bool(true)), Value::Integer(1));
    }

    #[test]
    fn binds_bare_names_and_positions() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT :a + ?2").unwrap();
        bind_parameters(
            &mut stmt,
            &[Parameter::input("a", 40), Parameter::input("", 2)],
        )
        .unwrap();
        let mut rows = stmt.raw_query();
        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.get::<_, i64>(0).unwrap(), 42);
    }

    #[test]
    fn undeclared_name_is_rejected() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT @a, @b").unwrap();
        let err = bind_parameters(
            &mut stmt,
            &[Parameter::input("typo", "X"), Parameter::input("a", "A")],
        )
        .unwrap_err();
        assert!(err.to_string().contains("typo"));
    }

    #[test]
    fn unbound_placeholder_is_rejected() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT @a, @b").unwrap();
        let err = bind_parameters(&mut stmt, &[Parameter::input("a", "A")]).unwrap_err();
        assert!(err.to_string().contains("@b"));
    }
}
