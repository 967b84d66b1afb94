//! Blocks placed through the layout wizard.
//!
//! The wizard lists placed blocks in `table#blocks`, one row per block, with
//! the block label in the first cell and a region select in the row. Adding a
//! block walks through a short AJAX-driven form; removing one goes through the
//! row's operations drop-button.

use tracing::debug;

use super::{BlockHandle, BlockManipulator, LayoutVariant, exactly_one};
use crate::error::{Result, SessionError};
use crate::session::{BrowserSession, PageActions, PageElement, SessionResult};
use crate::wait::ConditionWaiter;

const ADD_BLOCK_LINK: &str = "Add new block";
const REGION_SELECT: &str = "region";
const ADD_BLOCK_BUTTON: &str = "Add block";
const BLOCK_TABLE: &str = "table#blocks";
const ROW_REGION_SELECT: &str = "select.block-region-select";
const ROW_DROPBUTTON: &str = "ul.dropbutton";
const DROPBUTTON_TOGGLE: &str = "li.dropbutton-toggle";
const DELETE_LINK: &str = "Delete";

/// [`BlockManipulator`] for the multi-step layout wizard.
///
/// Identifiers are block labels, matched exactly against the trimmed text of
/// the first cell in each block row.
#[derive(Clone, Copy)]
pub struct WizardLayout<'a> {
    session: &'a dyn BrowserSession,
    waiter: ConditionWaiter<'a>,
}

impl<'a> WizardLayout<'a> {
    /// Create a manipulator driving `session`.
    #[must_use]
    pub const fn new(session: &'a dyn BrowserSession, waiter: ConditionWaiter<'a>) -> Self {
        Self { session, waiter }
    }

    fn row_matches(row: &dyn PageElement, label: &str, region: &str) -> SessionResult<bool> {
        let Some(select) = row.find(ROW_REGION_SELECT)? else {
            return Ok(false);
        };
        if select.value()?.as_deref() != Some(region) {
            return Ok(false);
        }
        match row.find("td")? {
            Some(cell) => Ok(cell.text()?.trim() == label),
            None => Ok(false),
        }
    }
}

impl BlockManipulator for WizardLayout<'_> {
    fn variant(&self) -> LayoutVariant {
        LayoutVariant::Wizard
    }

    fn place(&self, identifier: &str, region: &str) -> Result<()> {
        debug!(label = identifier, region, "placing block through wizard");

        self.session.click_link(ADD_BLOCK_LINK)?;
        self.waiter.await_ajax()?;

        self.session.click_link(identifier)?;
        self.waiter.await_ajax()?;

        self.session.select_option(REGION_SELECT, region)?;
        self.waiter.await_ajax()?;

        self.session.press_button(ADD_BLOCK_BUTTON)?;
        self.waiter.await_ajax()?;

        self.assert_placed(identifier, region).map(|_| ())
    }

    fn remove(&self, identifier: &str, region: &str) -> Result<()> {
        let handle = self.assert_placed(identifier, region)?;
        debug!(label = identifier, region, "removing block through wizard");

        let dropbutton = handle
            .element()
            .find(ROW_DROPBUTTON)?
            .ok_or_else(|| SessionError::ElementNotFound {
                locator: String::from(ROW_DROPBUTTON),
            })?;
        dropbutton
            .find(DROPBUTTON_TOGGLE)?
            .ok_or_else(|| SessionError::ElementNotFound {
                locator: String::from(DROPBUTTON_TOGGLE),
            })?
            .click()?;
        dropbutton
            .find_link(DELETE_LINK)?
            .ok_or_else(|| SessionError::ElementNotFound {
                locator: String::from(DELETE_LINK),
            })?
            .click()?;

        self.waiter.await_ajax()
    }

    fn assert_placed(&self, identifier: &str, region: &str) -> Result<BlockHandle> {
        let rows = PageActions::new(self.session).table_rows(BLOCK_TABLE, |row| {
            Self::row_matches(row, identifier, region)
        })?;
        exactly_one(rows, identifier, region)
    }
}
