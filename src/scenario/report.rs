//! Scenario outcome reporting.

use thiserror::Error;

use crate::error::{CleanupError, FailureKind, StepKitError};

/// The first step that failed in a scenario.
#[derive(Debug, Clone)]
pub struct StepFailure {
    /// The step's name, usually its Gherkin text.
    pub step: String,
    /// The error the step raised.
    pub error: StepKitError,
}

impl StepFailure {
    /// How the runner should treat the failure.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.error.kind()
    }
}

/// Everything a runner needs to report about a finished scenario.
///
/// Step failures and cleanup failures are kept apart so a leaked fixture is
/// never hidden behind an unrelated step failure.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// The scenario's name.
    pub scenario: String,
    /// The first failing step, if any.
    pub failed_step: Option<StepFailure>,
    /// Compensating actions that failed during the end-of-scenario flush.
    pub cleanup: Option<CleanupError>,
    /// Escalations still outstanding when the scenario ended.
    pub leaked_escalations: usize,
}

impl ScenarioReport {
    /// Whether every step passed and cleanup was clean.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed_step.is_none() && self.cleanup.is_none()
    }

    /// Convert the report into a result for the runner.
    ///
    /// Leaked escalations are logged when the scenario ends but do not fail
    /// it on their own.
    ///
    /// # Errors
    ///
    /// Returns the `ScenarioError` variant matching which phases failed.
    pub fn into_result(self) -> Result<(), ScenarioError> {
        let Self {
            scenario,
            failed_step,
            cleanup,
            ..
        } = self;
        match (failed_step, cleanup) {
            (None, None) => Ok(()),
            (Some(failure), None) => Err(ScenarioError::StepFailed {
                scenario,
                step: failure.step,
                source: Box::new(failure.error),
            }),
            (None, Some(source)) => Err(ScenarioError::CleanupFailed { scenario, source }),
            (Some(failure), Some(cleanup_error)) => Err(ScenarioError::StepAndCleanupFailed {
                scenario,
                step: failure.step,
                error: Box::new(failure.error),
                cleanup: cleanup_error,
            }),
        }
    }
}

/// A failed scenario, as reported to the runner.
#[derive(Debug, Clone, Error)]
pub enum ScenarioError {
    /// A step failed and cleanup succeeded.
    #[error("scenario '{scenario}' failed at step '{step}': {source}")]
    StepFailed {
        /// The scenario's name.
        scenario: String,
        /// The failing step.
        step: String,
        /// The step's error.
        source: Box<StepKitError>,
    },

    /// Every step passed but cleanup did not.
    #[error("scenario '{scenario}' passed but cleanup failed: {source}")]
    CleanupFailed {
        /// The scenario's name.
        scenario: String,
        /// The collected undo failures.
        source: CleanupError,
    },

    /// A step failed and cleanup failed too.
    #[error("scenario '{scenario}' failed at step '{step}': {error}; cleanup also failed: {cleanup}")]
    StepAndCleanupFailed {
        /// The scenario's name.
        scenario: String,
        /// The failing step.
        step: String,
        /// The step's error.
        error: Box<StepKitError>,
        /// The collected undo failures.
        cleanup: CleanupError,
    },
}
