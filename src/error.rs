use std::fmt;

use thiserror::Error;

use crate::types::{ConnectionState, ProviderTag};

/// Errors raised by a driver (connection, command, adapter or transaction).
#[derive(Debug, Error)]
pub enum DriverError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("Unsupported by driver: {0}")]
    Unsupported(String),

    #[error("Invalid driver state: {0}")]
    InvalidState(String),

    #[error("Driver error: {0}")]
    Other(String),
}

/// Which driver object the provider factory failed to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderComponent {
    Connection,
    Command,
    DataAdapter,
    Factory,
}

impl fmt::Display for ProviderComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderComponent::Connection => f.write_str("connection"),
            ProviderComponent::Command => f.write_str("command"),
            ProviderComponent::DataAdapter => f.write_str("data adapter"),
            ProviderComponent::Factory => f.write_str("factory"),
        }
    }
}

/// Metadata attached to every enriched execution error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticContext {
    /// Provider tag, or `None` when a custom factory reports none.
    pub provider: Option<ProviderTag>,
    /// Debug rendering of the calling thread's id.
    pub thread_id: String,
    /// Text of the command being executed, if one was prepared.
    pub command_text: Option<String>,
    /// Connection state at the time of the failure, if a connection exists.
    pub connection_state: Option<ConnectionState>,
}

impl fmt::Display for DiagnosticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.provider {
            Some(provider) => write!(f, "provider={provider}")?,
            None => f.write_str("provider=custom")?,
        }
        write!(f, ", thread={}", self.thread_id)?;
        if let Some(text) = &self.command_text {
            write!(f, ", command={text:?}")?;
        }
        if let Some(state) = self.connection_state {
            write!(f, ", connection={state}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SqlExecError {
    #[error("Provider resolution failed: {provider} returned no {component}")]
    ProviderResolution {
        provider: String,
        component: ProviderComponent,
    },

    #[error("Error executing {operation} ({context}): {source}")]
    Execution {
        operation: &'static str,
        context: Box<DiagnosticContext>,
        #[source]
        source: DriverError,
    },

    #[error("Error while retrieving schema: {source}")]
    SchemaRetrieval {
        #[source]
        source: DriverError,
    },

    #[error(transparent)]
    Transaction(DriverError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SqlExecError {
    /// Diagnostic context of an enriched execution error.
    #[must_use]
    pub fn context(&self) -> Option<&DiagnosticContext> {
        match self {
            SqlExecError::Execution { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The underlying driver error, whichever path wrapped it.
    #[must_use]
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            SqlExecError::Execution { source, .. }
            | SqlExecError::SchemaRetrieval { source }
            | SqlExecError::Transaction(source)
            | SqlExecError::Driver(source) => Some(source),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_provider_resolution(&self) -> bool {
        matches!(self, SqlExecError::ProviderResolution { .. })
    }
}
