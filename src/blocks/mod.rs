//! Block placement across incompatible layout subsystems.
//!
//! A site builds its pages with one of several layout subsystems, and each
//! offers a different UI for adding blocks to a region. [`BlockManipulator`]
//! abstracts over the capability ("put this block in that region, take it out
//! again") rather than over the argument shape, so each variant defines what
//! its block identifier means:
//!
//! - [`WizardLayout`]: the block's human-readable label, as listed in the
//!   layout wizard's block table.
//! - [`InPlaceLayout`]: `"<category>/<plugin_id>"`, as offered by the in-place
//!   editor's content tray.
//!
//! The active variant is chosen from configuration through [`LayoutVariant`],
//! never by probing the page.

mod in_place;
mod wizard;

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub use in_place::{InPlaceLayout, LayoutSave};
pub use wizard::WizardLayout;

use crate::error::{BlockError, Result};
use crate::session::{BrowserSession, ElementHandle};
use crate::wait::ConditionWaiter;

/// The layout subsystem active in the environment under test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutVariant {
    /// Layouts edited through the multi-step "Add new block" wizard.
    #[default]
    Wizard,
    /// Layouts edited in place on the rendered page.
    InPlace,
}

impl LayoutVariant {
    /// Build the manipulator for this variant.
    #[must_use]
    pub fn manipulator<'a>(
        self,
        session: &'a dyn BrowserSession,
        waiter: ConditionWaiter<'a>,
    ) -> Box<dyn BlockManipulator + 'a> {
        match self {
            Self::Wizard => Box::new(WizardLayout::new(session, waiter)),
            Self::InPlace => Box::new(InPlaceLayout::new(session, waiter)),
        }
    }

    /// Short name used in logs and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Wizard => "wizard",
            Self::InPlace => "in-place",
        }
    }
}

impl fmt::Display for LayoutVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A block found in the live UI.
///
/// Holds the element the block was found at so callers can chain further
/// actions, such as opening its operations menu.
pub struct BlockHandle {
    identifier: String,
    region: String,
    element: ElementHandle,
}

impl BlockHandle {
    /// Create a handle for a block found at `element`.
    #[must_use]
    pub fn new(identifier: impl Into<String>, region: impl Into<String>, element: ElementHandle) -> Self {
        Self {
            identifier: identifier.into(),
            region: region.into(),
            element,
        }
    }

    /// The variant-specific identifier the block was looked up by.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The region the block was found in.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The row or DOM node representing the block.
    #[must_use]
    pub fn element(&self) -> &dyn crate::session::PageElement {
        self.element.as_ref()
    }
}

impl fmt::Debug for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockHandle")
            .field("identifier", &self.identifier)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Place, remove, and locate blocks in a layout region.
pub trait BlockManipulator {
    /// The layout subsystem this manipulator drives.
    fn variant(&self) -> LayoutVariant;

    /// Make the block identified by `identifier` active in `region`.
    ///
    /// Returns once the placement is visible in the UI.
    ///
    /// # Errors
    ///
    /// Returns a wait, session, or block error if the UI does not reach the
    /// placed state.
    fn place(&self, identifier: &str, region: &str) -> Result<()>;

    /// Remove the single block identified by `identifier` from `region`.
    ///
    /// # Errors
    ///
    /// Returns `BlockError::BlockNotFound` or `BlockError::AmbiguousBlock`
    /// unless exactly one block matches, and `BlockError::NotSupported` when
    /// the subsystem offers no removal.
    fn remove(&self, identifier: &str, region: &str) -> Result<()>;

    /// Find the single block identified by `identifier` in `region`.
    ///
    /// # Errors
    ///
    /// Returns `BlockError::BlockNotFound` or `BlockError::AmbiguousBlock`
    /// unless exactly one block matches.
    fn assert_placed(&self, identifier: &str, region: &str) -> Result<BlockHandle>;
}

/// Reduce a set of matches to exactly one handle.
fn exactly_one(mut matches: Vec<ElementHandle>, identifier: &str, region: &str) -> Result<BlockHandle> {
    match matches.len() {
        0 => Err(BlockError::BlockNotFound {
            identifier: String::from(identifier),
            region: String::from(region),
        }
        .into()),
        1 => matches
            .pop()
            .map(|element| BlockHandle::new(identifier, region, element))
            .ok_or_else(|| {
                BlockError::BlockNotFound {
                    identifier: String::from(identifier),
                    region: String::from(region),
                }
                .into()
            }),
        count => Err(BlockError::AmbiguousBlock {
            identifier: String::from(identifier),
            region: String::from(region),
            count,
        }
        .into()),
    }
}
