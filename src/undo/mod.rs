//! Compensating actions for fixtures created during a scenario.
//!
//! Every step that mutates the system under test records the inverse of its
//! mutation on the scenario's [`CompensationStack`]. When the scenario ends the
//! stack is flushed newest-first, so later fixtures that depend on earlier ones
//! are torn down before the things they depend on.
//!
//! A flush always attempts every recorded action. Failures are collected into a
//! single [`CleanupError`] instead of stopping at the first one, so the report
//! names every fixture that may have leaked.

use std::fmt;

use tracing::{debug, warn};

use crate::error::{CleanupError, Result, UndoFailure};

/// A recorded inverse of one mutation.
///
/// The action captures its arguments at record time; replaying it needs no
/// state from the step that recorded it.
pub type UndoAction<'a> = Box<dyn FnOnce() -> Result<()> + 'a>;

struct UndoEntry<'a> {
    operation: String,
    arguments: Vec<String>,
    action: UndoAction<'a>,
}

/// Per-scenario LIFO stack of compensating actions.
#[derive(Default)]
pub struct CompensationStack<'a> {
    entries: Vec<UndoEntry<'a>>,
}

impl fmt::Debug for CompensationStack<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompensationStack")
            .field("pending", &self.pending())
            .finish()
    }
}

impl<'a> CompensationStack<'a> {
    /// Create an empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record a compensating action.
    ///
    /// `operation` and `arguments` describe the action for logs and cleanup
    /// reports only; they are never interpreted.
    pub fn record<F>(&mut self, operation: impl Into<String>, arguments: Vec<String>, action: F)
    where
        F: FnOnce() -> Result<()> + 'a,
    {
        let name = operation.into();
        debug!(
            operation = name.as_str(),
            arguments = ?arguments,
            "recorded compensating action"
        );
        self.entries.push(UndoEntry {
            operation: name,
            arguments,
            action: Box::new(action),
        });
    }

    /// Number of actions waiting to run.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no actions are waiting to run.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Operation names in the order a flush would run them.
    #[must_use]
    pub fn pending(&self) -> Vec<&str> {
        self.entries
            .iter()
            .rev()
            .map(|entry| entry.operation.as_str())
            .collect()
    }

    /// Run every recorded action, newest first, and empty the stack.
    ///
    /// The stack is empty when this returns, whether or not actions failed, so
    /// a second flush is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a `CleanupError` listing every action that failed, in the order
    /// they were attempted.
    pub fn flush(&mut self) -> std::result::Result<(), CleanupError> {
        let entries = std::mem::take(&mut self.entries);
        if entries.is_empty() {
            return Ok(());
        }

        debug!(count = entries.len(), "flushing compensating actions");
        let mut failures = Vec::new();
        for entry in entries.into_iter().rev() {
            let UndoEntry {
                operation,
                arguments,
                action,
            } = entry;
            if let Err(error) = action() {
                warn!(
                    operation = operation.as_str(),
                    arguments = ?arguments,
                    error = %error,
                    "compensating action failed"
                );
                failures.push(UndoFailure {
                    operation,
                    arguments,
                    message: error.to_string(),
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CleanupError { failures })
        }
    }
}
