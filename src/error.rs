//! Semantic error types for stepkit.
//!
//! Every failure a step can raise is a variant of a per-concern `thiserror`
//! enum, aggregated into [`StepKitError`]. Runners that host stepkit usually
//! convert these into `eyre::Report` at their own boundary.
//!
//! Errors are also classified by [`FailureKind`], separating "the UI did not
//! reach the expected state" from "the harness was misused or misconfigured".
//! A runner reports the former and may abort the whole run on the latter.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// How a failure should be treated by the runner hosting the scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The UI never reached the expected state. The scenario fails and the run
    /// continues.
    Assertion,
    /// The active subsystem lacks an affordance the step needs.
    Unsupported,
    /// The harness was misused or the environment is misconfigured.
    Precondition,
    /// A compensating action failed while tearing fixtures down.
    Cleanup,
}

/// Errors raised while waiting for a UI-side condition.
#[derive(Debug, Clone, Error)]
pub enum WaitError {
    /// The predicate never became truthy within the budget.
    #[error("condition timed out after {seconds} seconds: {expression}")]
    ConditionTimeout {
        /// The JavaScript predicate that was awaited.
        expression: String,
        /// The budget that elapsed, in seconds.
        seconds: u64,
    },

    /// A wait was requested with a non-positive budget.
    #[error("wait timeout must be a positive number of seconds, got {seconds}")]
    InvalidTimeout {
        /// The rejected timeout.
        seconds: u64,
    },
}

/// Errors raised by block placement and lookup.
#[derive(Debug, Clone, Error)]
pub enum BlockError {
    /// No block matching the identifier is placed in the region.
    #[error("expected block '{identifier}' to be present in '{region}' region")]
    BlockNotFound {
        /// The variant-specific block identifier.
        identifier: String,
        /// The region that was searched.
        region: String,
    },

    /// More than one block matches the identifier in the region.
    #[error("found {count} blocks matching '{identifier}' in '{region}' region, expected exactly one")]
    AmbiguousBlock {
        /// The variant-specific block identifier.
        identifier: String,
        /// The region that was searched.
        region: String,
        /// How many blocks matched.
        count: usize,
    },

    /// The active layout subsystem has no affordance for the operation.
    #[error("{variant} layouts do not support {operation}")]
    NotSupported {
        /// The layout variant name.
        variant: String,
        /// The unsupported operation.
        operation: String,
    },

    /// The identifier does not follow the variant's format.
    #[error("invalid block identifier '{identifier}': {reason}")]
    InvalidIdentifier {
        /// The rejected identifier.
        identifier: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Errors raised while switching the acting identity.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// The identity collaborator is missing or refused the switch.
    #[error("cannot switch identity: {reason}")]
    IdentityUnavailable {
        /// A description of the failure.
        reason: String,
    },

    /// `release` was called with no outstanding escalation.
    #[error("no active escalation to release")]
    NoActiveEscalation,
}

/// Errors reported by the browser session collaborator.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// No element matched the locator.
    #[error("element not found: {locator}")]
    ElementNotFound {
        /// The CSS selector or link/button locator.
        locator: String,
    },

    /// The driver cannot perform the action.
    #[error("driver does not support {action}")]
    Unsupported {
        /// The attempted action.
        action: String,
    },

    /// The driver failed for any other reason.
    #[error("browser session failed: {message}")]
    Driver {
        /// A description of the driver failure.
        message: String,
    },
}

/// Errors reported by the content and configuration collaborator.
#[derive(Debug, Clone, Error)]
pub enum ContentError {
    /// The entity type (and bundle) has no Field UI base route.
    #[error("{target} is not exposed to Field UI")]
    NotExposedToFieldUi {
        /// The entity type, optionally suffixed with `.bundle`.
        target: String,
    },

    /// The scenario was started without a content collaborator.
    #[error("no content API is available in this environment")]
    Unavailable,

    /// The content API failed.
    #[error("content API request failed: {message}")]
    Backend {
        /// A description of the failure.
        message: String,
    },
}

/// One compensating action that failed during a flush.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("undo of {operation}({}) failed: {message}", .arguments.join(", "))]
pub struct UndoFailure {
    /// The name of the compensating operation.
    pub operation: String,
    /// The arguments captured when the operation was recorded.
    pub arguments: Vec<String>,
    /// The error the operation raised.
    pub message: String,
}

/// Every compensating action that failed during one flush.
///
/// A flush never stops at the first failure, so this always lists the complete
/// set of fixtures that may have leaked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} compensating action(s) failed during cleanup: {}", .failures.len(), join_failures(.failures))]
pub struct CleanupError {
    /// The failures, in the order the actions were attempted.
    pub failures: Vec<UndoFailure>,
}

fn join_failures(failures: &[UndoFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// The path where the configuration file was expected.
        path: PathBuf,
    },

    /// The configuration file could not be read or parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error while merging layers.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Top-level error type for stepkit.
#[derive(Debug, Clone, Error)]
pub enum StepKitError {
    /// A wait failed.
    #[error(transparent)]
    Wait(#[from] WaitError),

    /// A block operation failed.
    #[error(transparent)]
    Block(#[from] BlockError),

    /// An identity switch failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The browser session failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The content API failed.
    #[error(transparent)]
    Content(#[from] ContentError),

    /// One or more compensating actions failed.
    #[error(transparent)]
    Cleanup(#[from] CleanupError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StepKitError {
    /// Classify the error for the hosting runner.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Wait(WaitError::ConditionTimeout { .. })
            | Self::Block(BlockError::BlockNotFound { .. } | BlockError::AmbiguousBlock { .. })
            | Self::Session(SessionError::ElementNotFound { .. }) => FailureKind::Assertion,
            Self::Block(BlockError::NotSupported { .. })
            | Self::Session(SessionError::Unsupported { .. }) => FailureKind::Unsupported,
            Self::Cleanup(_) => FailureKind::Cleanup,
            Self::Wait(WaitError::InvalidTimeout { .. })
            | Self::Block(BlockError::InvalidIdentifier { .. })
            | Self::Identity(_)
            | Self::Session(SessionError::Driver { .. })
            | Self::Content(_)
            | Self::Config(_) => FailureKind::Precondition,
        }
    }

    /// Whether the error is an expected negative result rather than misuse.
    #[must_use]
    pub const fn is_assertion_failure(&self) -> bool {
        matches!(self.kind(), FailureKind::Assertion)
    }
}

/// A specialised `Result` type for stepkit operations.
pub type Result<T> = std::result::Result<T, StepKitError>;
