use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::engine::{DbManager, TeardownPolicy};
use crate::error::SqlExecError;
use crate::provider::{ProviderDescriptor, ProviderFactory, ProviderRegistry};
use crate::types::{IsolationLevel, ProviderTag};

/// Options for constructing a [`DbManager`].
///
/// Deserializable so a manager can be described in a JSON document:
/// ```rust
/// use sql_exec::prelude::*;
///
/// let opts = ManagerOptions::from_json(
///     r#"{ "provider": "sqlite", "connection_string": ":memory:", "command_timeout_secs": 3 }"#,
/// ).unwrap();
/// assert_eq!(opts.provider, ProviderTag::Sqlite);
/// ```
#[derive(Clone, Deserialize)]
pub struct ManagerOptions {
    pub provider: ProviderTag,
    pub connection_string: String,
    /// Isolation used by `begin_default_transaction` and batch execution.
    #[serde(default)]
    pub isolation: IsolationLevel,
    /// Default per-command timeout. Read from `command_timeout_secs` in JSON, where
    /// fractional seconds are allowed.
    #[serde(
        default,
        rename = "command_timeout_secs",
        deserialize_with = "deserialize_timeout_secs"
    )]
    pub command_timeout: Option<Duration>,
    #[serde(default)]
    pub teardown: TeardownPolicy,
    /// Factory that replaces tag resolution entirely.
    #[serde(skip)]
    pub custom_factory: Option<Arc<dyn ProviderFactory>>,
}

impl ManagerOptions {
    #[must_use]
    pub fn new(provider: ProviderTag, connection_string: impl Into<String>) -> Self {
        Self {
            provider,
            connection_string: connection_string.into(),
            isolation: IsolationLevel::default(),
            command_timeout: None,
            teardown: TeardownPolicy::default(),
            custom_factory: None,
        }
    }

    #[must_use]
    pub fn builder(
        provider: ProviderTag,
        connection_string: impl Into<String>,
    ) -> ManagerOptionsBuilder {
        ManagerOptionsBuilder::new(provider, connection_string)
    }

    /// Parse and validate options from JSON.
    ///
    /// # Errors
    /// Returns `SqlExecError::Json` for malformed input and `SqlExecError::ConfigError`
    /// if the connection string is empty.
    pub fn from_json(json: &str) -> Result<Self, SqlExecError> {
        let opts: ManagerOptions = serde_json::from_str(json)?;
        opts.validate()?;
        Ok(opts)
    }

    /// # Errors
    /// Returns `SqlExecError::ConfigError` if the connection string is empty.
    pub fn validate(&self) -> Result<(), SqlExecError> {
        if self.connection_string.trim().is_empty() {
            return Err(SqlExecError::ConfigError(
                "connection string must not be empty".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout
    }

    /// How the provider factory should be resolved.
    #[must_use]
    pub fn descriptor(&self) -> ProviderDescriptor {
        match &self.custom_factory {
            Some(factory) => ProviderDescriptor::Custom(Arc::clone(factory)),
            None => ProviderDescriptor::Tag(self.provider),
        }
    }
}

impl fmt::Debug for ManagerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerOptions")
            .field("provider", &self.descriptor())
            .field("connection_string", &self.connection_string)
            .field("isolation", &self.isolation)
            .field("command_timeout", &self.command_timeout)
            .field("teardown", &self.teardown)
            .finish()
    }
}

fn deserialize_timeout_secs<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer)?
        .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
        .transpose()
}

/// Fluent builder for [`ManagerOptions`].
#[derive(Debug, Clone)]
pub struct ManagerOptionsBuilder {
    opts: ManagerOptions,
}

impl ManagerOptionsBuilder {
    #[must_use]
    pub fn new(provider: ProviderTag, connection_string: impl Into<String>) -> Self {
        Self {
            opts: ManagerOptions::new(provider, connection_string),
        }
    }

    #[must_use]
    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.opts.isolation = isolation;
        self
    }

    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.opts.command_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn teardown(mut self, teardown: TeardownPolicy) -> Self {
        self.opts.teardown = teardown;
        self
    }

    #[must_use]
    pub fn custom_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.opts.custom_factory = Some(factory);
        self
    }

    #[must_use]
    pub fn finish(self) -> ManagerOptions {
        self.opts
    }

    /// Build a manager against the default registry.
    ///
    /// # Errors
    /// Returns `SqlExecError` if the options are invalid or the provider cannot be resolved.
    pub fn build(self) -> Result<DbManager, SqlExecError> {
        DbManager::new(self.finish())
    }

    /// Build a manager against `registry`.
    ///
    /// # Errors
    /// Returns `SqlExecError` if the options are invalid or the provider cannot be resolved.
    pub fn build_with(self, registry: &ProviderRegistry) -> Result<DbManager, SqlExecError> {
        DbManager::with_registry(self.finish(), registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_defaults() {
        let opts =
            ManagerOptions::from_json(r#"{"provider":"odbc","connection_string":"DSN=x"}"#)
                .unwrap();
        assert_eq!(opts.provider, ProviderTag::Odbc);
        assert_eq!(opts.isolation, IsolationLevel::Unspecified);
        assert_eq!(opts.teardown, TeardownPolicy::ReleaseOnly);
        assert_eq!(opts.command_timeout(), None);
    }

    #[test]
    fn json_rejects_empty_connection_string() {
        let err = ManagerOptions::from_json(r#"{"provider":"sqlite","connection_string":" "}"#)
            .unwrap_err();
        assert!(matches!(err, SqlExecError::ConfigError(_)));
    }

    #[test]
    fn json_rejects_unknown_provider() {
        let err = ManagerOptions::from_json(r#"{"provider":"oracle","connection_string":"x"}"#)
            .unwrap_err();
        assert!(matches!(err, SqlExecError::Json(_)));
    }

    #[test]
    fn json_timeout_keeps_fractions() {
        let opts = ManagerOptions::from_json(
            r#"{"provider":"sqlite","connection_string":"x","command_timeout_secs":0.25}"#,
        )
        .unwrap();
        assert_eq!(opts.command_timeout(), Some(Duration::from_millis(250)));

        let err = ManagerOptions::from_json(
            r#"{"provider":"sqlite","connection_string":"x","command_timeout_secs":-1}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SqlExecError::Json(_)));
    }

    #[test]
    fn builder_keeps_sub_second_timeout() {
        let opts = ManagerOptions::builder(ProviderTag::Sqlite, ":memory:")
            .command_timeout(Duration::from_millis(500))
            .finish();
        assert_eq!(opts.command_timeout(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn builder_sets_fields() {
        let opts = ManagerOptions::builder(ProviderTag::Sqlite, ":memory:")
            .isolation(IsolationLevel::Serializable)
            .command_timeout(Duration::from_secs(9))
            .teardown(TeardownPolicy::CloseConnection)
            .finish();
        assert_eq!(opts.command_timeout(), Some(Duration::from_secs(9)));
        assert_eq!(opts.teardown, TeardownPolicy::CloseConnection);
        assert!(matches!(opts.descriptor(), ProviderDescriptor::Tag(ProviderTag::Sqlite)));
    }
}
