use std::thread;

use super::DbManager;
use crate::error::{DiagnosticContext, SqlExecError};

impl DbManager {
    /// Snapshot of the provider, thread, command and connection for error reporting.
    ///
    /// `command_text` is the text of the failing call, which may never have reached a
    /// prepared command when opening failed.
    pub(crate) fn diagnostic_context(&self, command_text: &str) -> DiagnosticContext {
        DiagnosticContext {
            provider: self.factory.provider(),
            thread_id: format!("{:?}", thread::current().id()),
            command_text: Some(command_text.to_owned()),
            connection_state: self.state.connection_state(),
        }
    }

    /// Wrap a driver failure from `operation` on `command_text` with diagnostic
    /// context and trace it.
    ///
    /// Errors that are not driver failures (provider resolution in particular) pass
    /// through untouched.
    pub(crate) fn enrich(
        &self,
        operation: &'static str,
        command_text: &str,
        err: SqlExecError,
    ) -> SqlExecError {
        let SqlExecError::Driver(source) = err else {
            return err;
        };
        let context = self.diagnostic_context(command_text);
        tracing::error!(
            provider = %self.factory.name(),
            thread = %context.thread_id,
            command = context.command_text.as_deref().unwrap_or(""),
            connection_state = ?context.connection_state,
            operation,
            "Error executing {operation}\n  provider: {}\n  thread: {}\n  command: {}\n  connection: {}\n  cause: {source}",
            self.factory.name(),
            context.thread_id,
            context.command_text.as_deref().unwrap_or("<none>"),
            context
                .connection_state
                .map_or_else(|| "<none>".to_owned(), |s| s.to_string()),
        );
        SqlExecError::Execution {
            operation,
            context: Box::new(context),
            source,
        }
    }
}
