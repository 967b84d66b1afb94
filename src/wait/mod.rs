//! Condition polling against the live UI.
//!
//! A [`ConditionWaiter`] blocks the calling step until a JavaScript predicate
//! evaluates truthy in the page, or fails the step with
//! [`WaitError::ConditionTimeout`] once the budget is spent. Polling itself is
//! delegated to [`BrowserSession::wait`]; the waiter only owns the contract
//! "true before the timeout, otherwise fail".
//!
//! Element and frame waits are expressed as predicates too, with the selector
//! or frame name escaped before it is embedded in the expression.

use tracing::debug;

use crate::error::{Result, WaitError};
use crate::session::BrowserSession;

/// Default budget, in seconds, for a wait with no explicit timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default budget, in seconds, for AJAX settling.
pub const DEFAULT_AJAX_TIMEOUT_SECS: u64 = 5;

/// Predicate that holds once no jQuery request or animation is in flight.
///
/// Pages that do not load jQuery are treated as settled.
pub const AJAX_IDLE_EXPRESSION: &str = "(typeof jQuery === \"undefined\" || (jQuery.active === 0 && jQuery(\":animated\").length === 0))";

/// Escape a value for embedding in a double- or single-quoted JavaScript
/// string literal.
///
/// Backslashes, both quote characters, NUL, and the line terminators JavaScript
/// rejects inside a literal (`\n`, `\r`, U+2028 and U+2029) are escaped, so a
/// selector can never terminate the literal it is placed in.
#[must_use]
pub fn escape_js_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' | '"' | '\'' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            '\0' => escaped.push_str("\\0"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// A predicate to await and the budget to await it for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSpec {
    expression: String,
    timeout_secs: u64,
}

impl WaitSpec {
    /// Await `expression` for the default ten seconds.
    #[must_use]
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Replace the budget.
    ///
    /// # Errors
    ///
    /// Returns `WaitError::InvalidTimeout` when `timeout_secs` is zero.
    pub fn with_timeout(mut self, timeout_secs: u64) -> std::result::Result<Self, WaitError> {
        if timeout_secs == 0 {
            return Err(WaitError::InvalidTimeout {
                seconds: timeout_secs,
            });
        }
        self.timeout_secs = timeout_secs;
        Ok(self)
    }

    /// The JavaScript predicate.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The budget in seconds.
    #[must_use]
    pub const fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// The budget in milliseconds, as handed to the session.
    #[must_use]
    pub const fn timeout_ms(&self) -> u64 {
        self.timeout_secs.saturating_mul(1000)
    }
}

/// Blocks a step until a UI-side condition holds.
#[derive(Clone, Copy)]
pub struct ConditionWaiter<'a> {
    session: &'a dyn BrowserSession,
    default_timeout_secs: u64,
    ajax_timeout_secs: u64,
}

impl<'a> ConditionWaiter<'a> {
    /// Create a waiter with the default budgets.
    #[must_use]
    pub const fn new(session: &'a dyn BrowserSession) -> Self {
        Self {
            session,
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            ajax_timeout_secs: DEFAULT_AJAX_TIMEOUT_SECS,
        }
    }

    /// Override the budget used when a wait has no explicit timeout.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout_secs: u64) -> Self {
        self.default_timeout_secs = timeout_secs;
        self
    }

    /// Override the budget used by [`Self::await_ajax`].
    #[must_use]
    pub const fn with_ajax_timeout(mut self, timeout_secs: u64) -> Self {
        self.ajax_timeout_secs = timeout_secs;
        self
    }

    /// The budget used when a wait has no explicit timeout.
    #[must_use]
    pub const fn default_timeout_secs(&self) -> u64 {
        self.default_timeout_secs
    }

    /// Block until the predicate in `spec` is truthy.
    ///
    /// # Errors
    ///
    /// Returns `WaitError::ConditionTimeout` if the predicate is still falsy
    /// when the budget is spent, or the session's error if the driver fails.
    pub fn await_spec(&self, spec: &WaitSpec) -> Result<()> {
        debug!(
            expression = spec.expression(),
            timeout_secs = spec.timeout_secs(),
            "awaiting condition"
        );

        if self.session.wait(spec.timeout_ms(), spec.expression())? {
            return Ok(());
        }

        debug!(expression = spec.expression(), "condition timed out");
        Err(WaitError::ConditionTimeout {
            expression: String::from(spec.expression()),
            seconds: spec.timeout_secs(),
        }
        .into())
    }

    /// Block until `expression` is truthy.
    ///
    /// `timeout_secs` falls back to the waiter's default when `None`.
    ///
    /// # Errors
    ///
    /// Returns `WaitError::InvalidTimeout` for a zero timeout and
    /// `WaitError::ConditionTimeout` if the budget is spent.
    pub fn await_expression(&self, expression: &str, timeout_secs: Option<u64>) -> Result<()> {
        let spec = WaitSpec::new(expression)
            .with_timeout(timeout_secs.unwrap_or(self.default_timeout_secs))?;
        self.await_spec(&spec)
    }

    /// Block until an element matching `selector` exists.
    ///
    /// # Errors
    ///
    /// As for [`Self::await_expression`].
    pub fn await_element(&self, selector: &str, timeout_secs: Option<u64>) -> Result<()> {
        let expression = format!("document.querySelector(\"{}\")", escape_js_string(selector));
        self.await_expression(&expression, timeout_secs)
    }

    /// Block until a frame named `frame` is registered in the current window.
    ///
    /// # Errors
    ///
    /// As for [`Self::await_expression`].
    pub fn await_frame(&self, frame: &str, timeout_secs: Option<u64>) -> Result<()> {
        let expression = format!("window.frames[\"{}\"]", escape_js_string(frame));
        self.await_expression(&expression, timeout_secs)
    }

    /// Block until the frame named `frame` has been removed.
    ///
    /// # Errors
    ///
    /// As for [`Self::await_expression`].
    pub fn await_frame_closed(&self, frame: &str, timeout_secs: Option<u64>) -> Result<()> {
        let expression = format!(
            "typeof window.frames[\"{}\"] === \"undefined\"",
            escape_js_string(frame)
        );
        self.await_expression(&expression, timeout_secs)
    }

    /// Block until pending AJAX requests and animations have finished.
    ///
    /// # Errors
    ///
    /// As for [`Self::await_expression`].
    pub fn await_ajax(&self) -> Result<()> {
        self.await_expression(AJAX_IDLE_EXPRESSION, Some(self.ajax_timeout_secs))
    }
}
