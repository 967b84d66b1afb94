//! Element manipulation helpers built on a [`BrowserSession`].

use tracing::debug;

use super::{BrowserSession, ElementHandle, PageElement, SessionResult};
use crate::error::SessionError;
use crate::wait::escape_js_string;

/// Quote a value for use inside a double-quoted CSS attribute selector.
#[must_use]
pub fn css_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Page-level helpers for locating and clicking elements.
#[derive(Clone, Copy)]
pub struct PageActions<'a> {
    session: &'a dyn BrowserSession,
}

impl<'a> PageActions<'a> {
    /// Create helpers over the given session.
    #[must_use]
    pub const fn new(session: &'a dyn BrowserSession) -> Self {
        Self { session }
    }

    /// Return the first element matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ElementNotFound` when nothing matches.
    pub fn element_exists(&self, selector: &str) -> SessionResult<ElementHandle> {
        self.session
            .find(selector)?
            .ok_or_else(|| SessionError::ElementNotFound {
                locator: String::from(selector),
            })
    }

    /// Scroll the first element matching `selector` into the viewport.
    ///
    /// # Errors
    ///
    /// Propagates script execution failures, including
    /// `SessionError::Unsupported` from drivers without JavaScript.
    pub fn scroll_to(&self, selector: &str) -> SessionResult<()> {
        let script = format!(
            "document.querySelector(\"{}\").scrollIntoView()",
            escape_js_string(selector)
        );
        self.session.execute_script(&script)
    }

    /// Click the first element matching `selector`.
    ///
    /// JavaScript-driven pages only accept clicks on elements inside the
    /// viewport, so the element is scrolled into view first. Drivers that
    /// cannot run scripts skip the scroll.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ElementNotFound` when nothing matches, or the
    /// driver's error if the scroll or click fails.
    pub fn click_selector(&self, selector: &str) -> SessionResult<()> {
        let element = self.element_exists(selector)?;

        match self.scroll_to(selector) {
            Ok(()) | Err(SessionError::Unsupported { .. }) => {}
            Err(error) => return Err(error),
        }

        debug!(selector, "clicking element");
        element.click()
    }

    /// Click a row of a view by view id and zero-based row index.
    ///
    /// Relies on the `data-view-id` and `data-row-index` attributes the site
    /// theme adds to views and their rows.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ElementNotFound` when the row does not exist.
    pub fn click_view_item(&self, view_id: &str, index: usize) -> SessionResult<()> {
        let selector = format!(
            "[data-view-id={}] [data-row-index=\"{index}\"]",
            css_string(view_id)
        );
        self.click_selector(&selector)
    }

    /// Return the body rows of a table that pass `filter`.
    ///
    /// Header and footer rows are skipped when the table has a `tbody`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ElementNotFound` when the table does not exist,
    /// or the first error raised by `filter`.
    pub fn table_rows<F>(&self, table_selector: &str, mut filter: F) -> SessionResult<Vec<ElementHandle>>
    where
        F: FnMut(&dyn PageElement) -> SessionResult<bool>,
    {
        let table = self.element_exists(table_selector)?;
        let rows = match table.find("tbody")? {
            Some(body) => body.find_all("tr")?,
            None => table.find_all("tr")?,
        };

        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if filter(row.as_ref())? {
                kept.push(row);
            }
        }
        Ok(kept)
    }
}
