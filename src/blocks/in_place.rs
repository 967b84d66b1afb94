//! Blocks placed through the in-place editor.
//!
//! The in-place editor adds blocks from a content tray: open the tray, pick a
//! category tab, pick a block plugin, and confirm its form. Placed blocks are
//! rendered inside their region with a `data-block-plugin-id` attribute. The
//! editor has no removal affordance that can be driven from a step.
//!
//! Changes made in the editor are kept only once the layout is saved, either
//! for the one entity being edited or as the default for its view mode.

use tracing::debug;

use super::{BlockHandle, BlockManipulator, LayoutVariant, exactly_one};
use crate::error::{BlockError, Result};
use crate::session::{BrowserSession, PageActions, css_string};
use crate::wait::ConditionWaiter;

const MANAGE_CONTENT: &str = "a[title=\"Manage Content\"]";
const ADD_BUTTON: &str = "[value=\"Add\"]";
const REGION_SELECT: &str = "select[name=\"region\"]";
const SAVE_LINK: &str = "a[title=\"Save\"]";

/// How [`InPlaceLayout::save_layout`] stores the edited layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutSave {
    /// Save as a custom layout for the entity being edited.
    Custom,
    /// Save as the default layout for the entity's view mode.
    Default,
}

impl LayoutSave {
    /// The editor's name for this save type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Custom => "custom",
            Self::Default => "default",
        }
    }
}

/// A parsed `"<category>/<plugin_id>"` identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TrayEntry<'s> {
    category: &'s str,
    plugin_id: &'s str,
}

impl<'s> TrayEntry<'s> {
    fn parse(identifier: &'s str) -> Result<Self> {
        let invalid = |reason: &str| BlockError::InvalidIdentifier {
            identifier: String::from(identifier),
            reason: String::from(reason),
        };
        let (category, plugin_id) = identifier
            .split_once('/')
            .ok_or_else(|| invalid("expected '<category>/<plugin_id>'"))?;
        if category.is_empty() {
            return Err(invalid("category is empty").into());
        }
        if plugin_id.is_empty() {
            return Err(invalid("plugin id is empty").into());
        }
        Ok(Self {
            category,
            plugin_id,
        })
    }
}

fn placed_selector(region: &str, plugin_id: &str) -> String {
    format!(
        "[data-region-name={}] [data-block-plugin-id={}]",
        css_string(region),
        css_string(plugin_id)
    )
}

/// [`BlockManipulator`] for the in-place editor.
///
/// Identifiers take the form `"<category>/<plugin_id>"`, for example
/// `"Lists (Views)/views_block:content-block_1"`.
#[derive(Clone, Copy)]
pub struct InPlaceLayout<'a> {
    session: &'a dyn BrowserSession,
    waiter: ConditionWaiter<'a>,
}

impl<'a> InPlaceLayout<'a> {
    /// Create a manipulator driving `session`.
    #[must_use]
    pub const fn new(session: &'a dyn BrowserSession, waiter: ConditionWaiter<'a>) -> Self {
        Self { session, waiter }
    }

    /// Save the layout being edited.
    ///
    /// Opens the editor's save menu and picks the entry for `save`, waiting
    /// for AJAX to settle after each click.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ElementNotFound` when the editor offers no save
    /// link or no entry for `save`, and `WaitError::ConditionTimeout` when
    /// AJAX does not settle.
    pub fn save_layout(&self, save: LayoutSave) -> Result<()> {
        debug!(save = save.name(), "saving in-place layout");
        self.click_and_settle(SAVE_LINK)?;
        self.click_and_settle(&format!("a.panelizer-ipe-save-{}", save.name()))
    }

    fn click_and_settle(&self, selector: &str) -> Result<()> {
        PageActions::new(self.session).click_selector(selector)?;
        self.waiter.await_ajax()
    }
}

impl BlockManipulator for InPlaceLayout<'_> {
    fn variant(&self) -> LayoutVariant {
        LayoutVariant::InPlace
    }

    fn place(&self, identifier: &str, region: &str) -> Result<()> {
        let entry = TrayEntry::parse(identifier)?;
        debug!(
            category = entry.category,
            plugin_id = entry.plugin_id,
            region,
            "placing block in place"
        );

        self.click_and_settle(MANAGE_CONTENT)?;
        self.click_and_settle(&format!("a[data-category={}]", css_string(entry.category)))?;
        self.click_and_settle(&format!("a[data-plugin-id={}]", css_string(entry.plugin_id)))?;

        if self.session.find(REGION_SELECT)?.is_some() {
            self.session.select_option("region", region)?;
        }
        self.click_and_settle(ADD_BUTTON)?;

        self.waiter
            .await_element(&placed_selector(region, entry.plugin_id), None)
    }

    fn remove(&self, identifier: &str, _region: &str) -> Result<()> {
        TrayEntry::parse(identifier)?;
        Err(BlockError::NotSupported {
            variant: String::from(LayoutVariant::InPlace.name()),
            operation: String::from("block removal"),
        }
        .into())
    }

    fn assert_placed(&self, identifier: &str, region: &str) -> Result<BlockHandle> {
        let entry = TrayEntry::parse(identifier)?;
        let matches = self
            .session
            .find_all(&placed_selector(region, entry.plugin_id))?;
        exactly_one(matches, identifier, region)
    }
}
