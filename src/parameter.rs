use crate::command::Command;
use crate::provider::ProviderFactory;
use crate::types::{DbType, DbValue, ParameterDirection};

/// A named command parameter.
///
/// `value` is `None` until set; unset input values are bound as the provider's
/// null marker when the parameter is attached to a command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: Option<DbValue>,
    pub direction: ParameterDirection,
    pub db_type: Option<DbType>,
    pub source_column: Option<String>,
}

impl Parameter {
    /// Input parameter with a value.
    #[must_use]
    pub fn input(name: impl Into<String>, value: impl Into<DbValue>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Output parameter, populated by the driver after execution.
    #[must_use]
    pub fn output(name: impl Into<String>, db_type: DbType) -> Self {
        Self {
            name: name.into(),
            direction: ParameterDirection::Output,
            db_type: Some(db_type),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_direction(mut self, direction: ParameterDirection) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub fn with_db_type(mut self, db_type: DbType) -> Self {
        self.db_type = Some(db_type);
        self
    }

    #[must_use]
    pub fn with_source_column(mut self, column: impl Into<String>) -> Self {
        self.source_column = Some(column.into());
        self
    }

    /// Bare name with any `@`, `:`, `$` or `?` prefix removed.
    #[must_use]
    pub fn bare_name(&self) -> &str {
        self.name.trim_start_matches(['@', ':', '$', '?'])
    }
}

/// Parameters queued independently of any command.
///
/// The queue is created on first use and survives executions; it is emptied only by
/// [`ParameterRegistry::clear`].
#[derive(Debug, Default)]
pub struct ParameterRegistry {
    queued: Option<Vec<Parameter>>,
}

impl ParameterRegistry {
    /// Queue a parameter; `None` is ignored.
    pub fn add(&mut self, parameter: Option<Parameter>) {
        if let Some(parameter) = parameter {
            self.queued.get_or_insert_with(Vec::new).push(parameter);
        }
    }

    pub fn clear(&mut self) {
        if let Some(queued) = self.queued.as_mut() {
            queued.clear();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queued.as_ref().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.queued.iter().flatten()
    }

    /// Copy the queue onto `command`, coercing input values for the provider.
    ///
    /// Coercion happens here and never at queue time, so the queue keeps the caller's
    /// values untouched across executions.
    pub(crate) fn attach(&self, factory: &dyn ProviderFactory, command: &mut Command) {
        for parameter in self.iter() {
            let mut attached = parameter.clone();
            if attached.direction == ParameterDirection::Input {
                attached.value = Some(match attached.value.take() {
                    None | Some(DbValue::Null) => factory.null_value(),
                    Some(DbValue::Timestamp(dt)) => factory.coerce_datetime(dt),
                    Some(other) => other,
                });
            }
            command.parameters.push(attached);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::provider::DriverConnection;
    use crate::types::ProviderTag;

    struct TextDates;

    impl ProviderFactory for TextDates {
        fn provider(&self) -> Option<ProviderTag> {
            None
        }

        fn create_connection(&self) -> Option<Box<dyn DriverConnection>> {
            None
        }

        fn coerce_datetime(&self, value: chrono::NaiveDateTime) -> DbValue {
            DbValue::Text(value.format("%F %T").to_string())
        }

        fn null_value(&self) -> DbValue {
            DbValue::Text("<null>".into())
        }
    }

    #[test]
    fn add_none_is_ignored() {
        let mut registry = ParameterRegistry::default();
        registry.add(None);
        assert_eq!(registry.len(), 0);
        registry.add(Some(Parameter::input("a", 1)));
        registry.add(Some(Parameter::input("b", 2)));
        assert_eq!(registry.len(), 2);
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn attach_coerces_only_input_parameters() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let mut registry = ParameterRegistry::default();
        registry.add(Some(Parameter::input("when", dt)));
        registry.add(Some(Parameter {
            name: "missing".into(),
            ..Parameter::default()
        }));
        registry.add(Some(Parameter::output("out", DbType::Integer)));

        let mut command = Command::default();
        registry.attach(&TextDates, &mut command);

        assert_eq!(
            command.parameters[0].value,
            Some(DbValue::Text("2024-01-02 03:04:05".into()))
        );
        assert_eq!(
            command.parameters[1].value,
            Some(DbValue::Text("<null>".into()))
        );
        assert_eq!(command.parameters[2].value, None);
        // the queue itself is left as the caller built it
        assert_eq!(
            registry.iter().next().unwrap().value,
            Some(DbValue::Timestamp(dt))
        );
    }

    #[test]
    fn bare_name_strips_prefixes() {
        assert_eq!(Parameter::input("@id", 1).bare_name(), "id");
        assert_eq!(Parameter::input(":id", 1).bare_name(), "id");
        assert_eq!(Parameter::input("id", 1).bare_name(), "id");
    }
}
