//! Per-scenario lifecycle.
//!
//! A [`Scenario`] is created when a scenario begins and owns everything the
//! scenario mutates: its [`CompensationStack`], its [`IdentityGuard`], and the
//! block manipulator for the configured layout. Collaborators are passed in by
//! reference through [`Collaborators`]; nothing is looked up from shared state.
//!
//! Ending a scenario consumes it, so cleanup runs at most once. A scenario that
//! is dropped without being ended (for example, when a step panics) still
//! flushes its compensation stack from `Drop`.
//!
//! A compensating action that panics during that flush aborts the process,
//! since the thread is already unwinding. The pending actions are logged before
//! such a flush so the fixtures left behind can be identified.

mod report;

use std::fmt;

use tracing::{debug, error, warn};

pub use report::{ScenarioError, ScenarioReport, StepFailure};

use crate::blocks::{BlockManipulator, LayoutVariant};
use crate::config::HarnessConfig;
use crate::content::ContentApi;
use crate::error::{CleanupError, ContentError, Result};
use crate::field_ui::FieldUi;
use crate::identity::{ActingIdentity, IdentityGuard, IdentityProvider};
use crate::session::BrowserSession;
use crate::undo::CompensationStack;
use crate::wait::ConditionWaiter;

/// The external collaborators a scenario drives.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// The live browser session.
    pub session: &'a dyn BrowserSession,
    /// Identity switching, when the environment supports it.
    pub identity: Option<&'a dyn IdentityProvider>,
    /// The site's content API, when the environment exposes it.
    pub content: Option<&'a dyn ContentApi>,
}

impl<'a> Collaborators<'a> {
    /// Collaborators with only a browser session.
    #[must_use]
    pub const fn new(session: &'a dyn BrowserSession) -> Self {
        Self {
            session,
            identity: None,
            content: None,
        }
    }

    /// Add an identity provider.
    #[must_use]
    pub const fn with_identity(mut self, identity: &'a dyn IdentityProvider) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Add a content API.
    #[must_use]
    pub const fn with_content(mut self, content: &'a dyn ContentApi) -> Self {
        self.content = Some(content);
        self
    }
}

/// One running scenario.
pub struct Scenario<'a> {
    name: String,
    session: &'a dyn BrowserSession,
    content: Option<&'a dyn ContentApi>,
    waiter: ConditionWaiter<'a>,
    layout: LayoutVariant,
    blocks: Box<dyn BlockManipulator + 'a>,
    undo: CompensationStack<'a>,
    identity: IdentityGuard<'a>,
    escalation_roles: Vec<String>,
    failed_step: Option<StepFailure>,
    ended: bool,
}

impl fmt::Debug for Scenario<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("layout", &self.layout)
            .field("undo", &self.undo)
            .field("identity", &self.identity)
            .field("failed_step", &self.failed_step)
            .finish_non_exhaustive()
    }
}

impl<'a> Scenario<'a> {
    /// Begin a scenario.
    #[must_use]
    pub fn begin(name: impl Into<String>, config: &HarnessConfig, collaborators: Collaborators<'a>) -> Self {
        let scenario_name = name.into();
        let waiter = ConditionWaiter::new(collaborators.session)
            .with_default_timeout(config.wait.default_timeout_secs)
            .with_ajax_timeout(config.wait.ajax_timeout_secs);
        let identity = collaborators
            .identity
            .map_or_else(IdentityGuard::unavailable, IdentityGuard::new);

        debug!(
            scenario = scenario_name.as_str(),
            layout = %config.layout,
            "beginning scenario"
        );

        Self {
            name: scenario_name,
            session: collaborators.session,
            content: collaborators.content,
            waiter,
            layout: config.layout,
            blocks: config.layout.manipulator(collaborators.session, waiter),
            undo: CompensationStack::new(),
            identity,
            escalation_roles: config.identity.escalation_roles.clone(),
            failed_step: None,
            ended: false,
        }
    }

    /// The scenario's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The browser session.
    #[must_use]
    pub const fn session(&self) -> &'a dyn BrowserSession {
        self.session
    }

    /// The configured condition waiter.
    #[must_use]
    pub const fn waiter(&self) -> ConditionWaiter<'a> {
        self.waiter
    }

    /// The layout subsystem active for this scenario.
    #[must_use]
    pub const fn layout(&self) -> LayoutVariant {
        self.layout
    }

    /// The block manipulator for the active layout.
    #[must_use]
    pub fn blocks(&self) -> &dyn BlockManipulator {
        self.blocks.as_ref()
    }

    /// The scenario's compensation stack.
    pub const fn undo(&mut self) -> &mut CompensationStack<'a> {
        &mut self.undo
    }

    /// The scenario's identity guard.
    pub const fn identity(&mut self) -> &mut IdentityGuard<'a> {
        &mut self.identity
    }

    /// Field UI steps bound to this scenario's collaborators.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::Unavailable` when the scenario has no content
    /// API.
    pub fn field_ui(&self) -> Result<FieldUi<'a>> {
        let content = self.content.ok_or(ContentError::Unavailable)?;
        Ok(FieldUi::new(self.session, content))
    }

    /// Escalate to the configured escalation roles.
    ///
    /// # Errors
    ///
    /// As for [`IdentityGuard::acquire`].
    pub fn escalate(&mut self) -> Result<ActingIdentity> {
        self.identity.acquire(self.escalation_roles.iter().map(String::as_str))
    }

    /// The first step failure recorded so far.
    #[must_use]
    pub const fn failed_step(&self) -> Option<&StepFailure> {
        self.failed_step.as_ref()
    }

    /// Run one step.
    ///
    /// If the step fails, escalations it opened are released and the failure
    /// is recorded for the report (only the first failure is kept). The
    /// step's result is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the step's own error.
    pub fn run_step<T, F>(&mut self, step: &str, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let depth = self.identity.depth();
        debug!(scenario = self.name.as_str(), step, "running step");

        let outcome = body(self);
        if let Err(step_error) = &outcome {
            if let Err(release_error) = self.identity.release_to_depth(depth) {
                warn!(
                    scenario = self.name.as_str(),
                    step,
                    error = %release_error,
                    "failed to restore identity after step failure"
                );
            }
            if self.failed_step.is_none() {
                self.failed_step = Some(StepFailure {
                    step: String::from(step),
                    error: step_error.clone(),
                });
            }
        }
        outcome
    }

    /// End the scenario: flush compensating actions and report.
    ///
    /// The flush runs whether or not a step failed. Escalations still
    /// outstanding are logged and unwound after the flush.
    #[must_use]
    pub fn on_scenario_end(mut self) -> ScenarioReport {
        let (cleanup, leaked_escalations) = self.finish();
        ScenarioReport {
            scenario: self.name.clone(),
            failed_step: self.failed_step.take(),
            cleanup,
            leaked_escalations,
        }
    }

    fn finish(&mut self) -> (Option<CleanupError>, usize) {
        self.ended = true;
        debug!(
            scenario = self.name.as_str(),
            pending = self.undo.len(),
            "ending scenario"
        );

        let cleanup = self.undo.flush().err();

        let leaked = self.identity.depth();
        if leaked > 0 {
            warn!(
                scenario = self.name.as_str(),
                leaked,
                "escalations were not released before the scenario ended"
            );
            if let Err(release_error) = self.identity.release_to_depth(0) {
                warn!(
                    scenario = self.name.as_str(),
                    error = %release_error,
                    "failed to restore identity at scenario end"
                );
            }
        }
        (cleanup, leaked)
    }
}

impl Drop for Scenario<'_> {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        if std::thread::panicking() {
            warn!(
                scenario = self.name.as_str(),
                pending = ?self.undo.pending(),
                "flushing compensating actions while a panic unwinds"
            );
        }
        let (cleanup, _) = self.finish();
        if let Some(cleanup_error) = cleanup {
            error!(
                scenario = self.name.as_str(),
                error = %cleanup_error,
                "cleanup failed for a scenario that was not ended"
            );
        }
    }
}
