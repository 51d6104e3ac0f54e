use std::fmt;
use std::time::Duration;

use tracing::{info, warn};

use super::DbManager;
use crate::error::SqlExecError;
use crate::parameter::Parameter;
use crate::types::{CommandKind, IsolationLevel};

/// What a batch does when a record affects zero rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and move on to the next record.
    ContinueOnFailure,
    /// Stop iterating and commit the records that already succeeded.
    #[default]
    AbortOnFailure,
    /// Stop iterating and roll back everything the batch did.
    AbortAndRollback,
}

type Extractor<'a, T> = Box<dyn Fn(&T) -> Vec<Parameter> + 'a>;

/// Parameterized statement run once per record inside a single transaction.
///
/// ```rust,no_run
/// use sql_exec::prelude::*;
///
/// struct User { id: i64, name: String }
///
/// # fn demo(db: &mut DbManager, users: &[User]) {
/// let batch = BatchCommand::new("UPDATE users SET name = @name WHERE id = @id")
///     .parameters(|u: &User| vec![
///         Parameter::input("id", u.id),
///         Parameter::input("name", u.name.as_str()),
///     ])
///     .policy(FailurePolicy::ContinueOnFailure);
/// let outcome = db.execute_batch(&batch, users);
/// for idx in &outcome.failed {
///     eprintln!("user {} was not updated", users[*idx].id);
/// }
/// # }
/// ```
pub struct BatchCommand<'a, T> {
    text: String,
    kind: CommandKind,
    timeout: Option<Duration>,
    isolation: Option<IsolationLevel>,
    policy: FailurePolicy,
    extract: Extractor<'a, T>,
}

impl<'a, T> BatchCommand<'a, T> {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: CommandKind::Text,
            timeout: None,
            isolation: None,
            policy: FailurePolicy::default(),
            extract: Box::new(|_: &T| Vec::new()),
        }
    }

    /// Per-record parameter extraction.
    #[must_use]
    pub fn parameters(mut self, extract: impl Fn(&T) -> Vec<Parameter> + 'a) -> Self {
        self.extract = Box::new(extract);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: CommandKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Isolation for the batch transaction; the manager default when unset.
    #[must_use]
    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = Some(isolation);
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl<T> fmt::Debug for BatchCommand<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchCommand")
            .field("text", &self.text)
            .field("kind", &self.kind)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Result of [`DbManager::execute_batch`]. Indices refer to positions in the input.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub attempted: usize,
    pub succeeded: Vec<usize>,
    /// Records that affected zero rows.
    pub failed: Vec<usize>,
    pub last_rows_affected: usize,
    pub committed: bool,
    pub rolled_back: bool,
    /// Error that ended the batch. `rolled_back` tells whether a transaction was
    /// rolled back because of it.
    pub error: Option<SqlExecError>,
}

impl BatchOutcome {
    /// `true` when no error occurred and the last executed record changed rows.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.last_rows_affected != 0
    }
}

impl DbManager {
    /// Execute `batch` once per record inside one transaction.
    ///
    /// Parameters are cleared after every record. A zero affected-row count is handled
    /// by the batch's [`FailurePolicy`]; with `AbortOnFailure` the records that already
    /// succeeded are still committed while the outcome reports failure. Any error rolls
    /// back the transaction, if one was started, and is returned in
    /// [`BatchOutcome::error`]. The manager is
    /// closed before returning in every case.
    pub fn execute_batch<'r, T: 'r>(
        &mut self,
        batch: &BatchCommand<'_, T>,
        records: impl IntoIterator<Item = &'r T>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        if let Err(err) = self.run_batch(batch, records, &mut outcome) {
            warn!(command = %batch.text, attempted = outcome.attempted, error = %err, "batch failed");
            if self.is_in_transaction() {
                match self.rollback_transaction() {
                    Ok(()) => outcome.rolled_back = true,
                    Err(rollback) => warn!(error = %rollback, "batch rollback failed"),
                }
            }
            outcome.error = Some(err);
        }

        if let Err(err) = self.close() {
            warn!(error = %err, "close after batch failed");
        }

        info!(
            command = %batch.text,
            attempted = outcome.attempted,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            committed = outcome.committed,
            rolled_back = outcome.rolled_back,
            "batch finished"
        );
        outcome
    }

    fn run_batch<'r, T: 'r>(
        &mut self,
        batch: &BatchCommand<'_, T>,
        records: impl IntoIterator<Item = &'r T>,
        outcome: &mut BatchOutcome,
    ) -> Result<(), SqlExecError> {
        let isolation = batch.isolation.unwrap_or(self.options.isolation);
        self.begin_transaction(isolation)?;

        for (idx, record) in records.into_iter().enumerate() {
            outcome.attempted += 1;
            self.add_parameters((batch.extract)(record));
            let mut command = self.command(&batch.text).kind(batch.kind);
            if let Some(timeout) = batch.timeout {
                command = command.timeout(timeout);
            }
            let result = command.non_query();
            self.clear_parameters();
            let affected = result?;
            outcome.last_rows_affected = affected;

            if affected != 0 {
                outcome.succeeded.push(idx);
                continue;
            }
            outcome.failed.push(idx);
            match batch.policy {
                FailurePolicy::ContinueOnFailure => {}
                FailurePolicy::AbortOnFailure => break,
                FailurePolicy::AbortAndRollback => {
                    self.rollback_transaction()?;
                    outcome.rolled_back = true;
                    return Ok(());
                }
            }
        }

        self.commit_transaction()?;
        outcome.committed = true;
        Ok(())
    }
}
