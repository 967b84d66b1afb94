//! Browser session collaborator.
//!
//! The session is the live browser: it evaluates JavaScript, resolves CSS
//! selectors, and performs page-level actions such as clicking links. stepkit
//! never drives a browser itself; it depends only on the [`BrowserSession`] and
//! [`PageElement`] traits, which a runner implements over its WebDriver client.
//!
//! All methods block the calling step until the driver answers, matching the
//! one-step-at-a-time execution model of a scenario.

mod actions;

pub use actions::{PageActions, css_string};

use crate::error::SessionError;

/// Result type returned by session and element operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// An element handle returned by a session lookup.
pub type ElementHandle = Box<dyn PageElement>;

/// The browser session a scenario drives.
pub trait BrowserSession {
    /// Poll `expression` until it is truthy or `timeout_ms` elapses.
    ///
    /// Returns `Ok(false)` on timeout. The polling cadence belongs to the
    /// driver.
    fn wait(&self, timeout_ms: u64, expression: &str) -> SessionResult<bool>;

    /// Execute a script for its side effects.
    fn execute_script(&self, script: &str) -> SessionResult<()>;

    /// Evaluate a script and return its JSON-serialisable result.
    fn evaluate_script(&self, script: &str) -> SessionResult<serde_json::Value>;

    /// Navigate to an internal path.
    fn visit(&self, path: &str) -> SessionResult<()>;

    /// Return to the top-level window.
    fn switch_to_window(&self) -> SessionResult<()>;

    /// Enter the named frame.
    fn switch_to_frame(&self, name: &str) -> SessionResult<()>;

    /// Find the first element matching a CSS selector.
    fn find(&self, selector: &str) -> SessionResult<Option<ElementHandle>>;

    /// Find every element matching a CSS selector.
    fn find_all(&self, selector: &str) -> SessionResult<Vec<ElementHandle>>;

    /// Click a link by id, title, text, or image alt.
    fn click_link(&self, locator: &str) -> SessionResult<()>;

    /// Press a button by id, name, or value.
    fn press_button(&self, locator: &str) -> SessionResult<()>;

    /// Choose `option` in the select field identified by `select`.
    fn select_option(&self, select: &str, option: &str) -> SessionResult<()>;

    /// Check a checkbox by id, name, or label.
    fn check_option(&self, locator: &str) -> SessionResult<()>;

    /// Uncheck a checkbox by id, name, or label.
    fn uncheck_option(&self, locator: &str) -> SessionResult<()>;
}

/// A live element on the page.
pub trait PageElement {
    /// Click the element.
    fn click(&self) -> SessionResult<()>;

    /// Read an attribute, if present.
    fn attribute(&self, name: &str) -> SessionResult<Option<String>>;

    /// Read the element's visible text.
    fn text(&self) -> SessionResult<String>;

    /// Read the current value of a form control.
    fn value(&self) -> SessionResult<Option<String>>;

    /// Find the first descendant matching a CSS selector.
    fn find(&self, selector: &str) -> SessionResult<Option<ElementHandle>>;

    /// Find every descendant matching a CSS selector.
    fn find_all(&self, selector: &str) -> SessionResult<Vec<ElementHandle>>;

    /// Find a descendant link by id, title, text, or image alt.
    fn find_link(&self, locator: &str) -> SessionResult<Option<ElementHandle>>;
}
