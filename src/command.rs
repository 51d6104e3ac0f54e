use std::time::Duration;

use crate::parameter::Parameter;
use crate::types::{CommandKind, DbValue, IsolationLevel};

/// Marker for the transaction a command runs inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionHandle {
    pub id: u64,
    pub isolation: IsolationLevel,
}

/// A command as handed to the driver.
///
/// Built fresh for every execution, so the transaction and parameters it carries are
/// always the manager's current ones.
#[derive(Debug, Clone, Default)]
pub struct Command {
    pub text: String,
    pub kind: CommandKind,
    pub timeout: Option<Duration>,
    pub transaction: Option<TransactionHandle>,
    pub parameters: Vec<Parameter>,
}

impl Command {
    /// Look a parameter up by name, ignoring any `@`/`:`/`$` prefix.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        let wanted = name.trim_start_matches(['@', ':', '$', '?']);
        self.parameters.iter().find(|p| p.bare_name() == wanted)
    }

    #[must_use]
    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        let wanted = name.trim_start_matches(['@', ':', '$', '?']);
        self.parameters.iter_mut().find(|p| p.bare_name() == wanted)
    }

    #[must_use]
    pub fn parameter_value(&self, name: &str) -> Option<&DbValue> {
        self.parameter(name).and_then(|p| p.value.as_ref())
    }
}

/// Per-call command configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandOptions {
    /// Driver timeout for this call; falls back to the manager default when `None`.
    pub timeout: Option<Duration>,
}

impl CommandOptions {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
