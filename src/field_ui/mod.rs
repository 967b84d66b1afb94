//! Reversible view-mode fixtures driven through Field UI.
//!
//! Every forward operation here can register its inverse on a
//! [`CompensationStack`]. The inverse is always replayed with `None` for the
//! stack, so cleanup never records new cleanup.

use std::fmt;

use tracing::debug;

use crate::content::ContentApi;
use crate::error::{ContentError, Result};
use crate::session::BrowserSession;
use crate::undo::CompensationStack;

const MANAGE_DISPLAY_LINK: &str = "Manage display";
const SAVE_BUTTON: &str = "Save";
const PANELIZER_OPTIONS: [&str; 2] = ["panelizer[enable]", "panelizer[custom]"];

/// A view mode of an entity type, optionally narrowed to one bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModeTarget {
    /// The entity type, such as `node`.
    pub entity_type: String,
    /// The view mode machine name, such as `full`.
    pub view_mode: String,
    /// The bundle, for bundleable entity types.
    pub bundle: Option<String>,
}

impl ViewModeTarget {
    /// Target `view_mode` of `entity_type` across all bundles.
    #[must_use]
    pub fn new(entity_type: impl Into<String>, view_mode: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            view_mode: view_mode.into(),
            bundle: None,
        }
    }

    /// Narrow the target to one bundle.
    #[must_use]
    pub fn in_bundle(mut self, bundle: impl Into<String>) -> Self {
        self.bundle = Some(bundle.into());
        self
    }

    /// The target's fields as compensation-report arguments.
    #[must_use]
    pub fn arguments(&self) -> Vec<String> {
        let mut arguments = vec![self.entity_type.clone(), self.view_mode.clone()];
        arguments.extend(self.bundle.clone());
        arguments
    }
}

impl fmt::Display for ViewModeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bundle {
            Some(bundle) => write!(f, "{}.{bundle}.{}", self.entity_type, self.view_mode),
            None => write!(f, "{}.{}", self.entity_type, self.view_mode),
        }
    }
}

/// Field UI steps over a browser session and the site's content API.
#[derive(Clone, Copy)]
pub struct FieldUi<'a> {
    session: &'a dyn BrowserSession,
    content: &'a dyn ContentApi,
}

impl fmt::Debug for FieldUi<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldUi").finish_non_exhaustive()
    }
}

impl<'a> FieldUi<'a> {
    /// Create Field UI steps.
    #[must_use]
    pub const fn new(session: &'a dyn BrowserSession, content: &'a dyn ContentApi) -> Self {
        Self { session, content }
    }

    /// Open the "Manage display" tab for `entity_type` and `bundle`.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::NotExposedToFieldUi` when the entity type has no
    /// Field UI route, or a session error if navigation fails.
    pub fn manage_display(&self, entity_type: &str, bundle: Option<&str>) -> Result<()> {
        let Some(path) = self.content.field_ui_path(entity_type, bundle)? else {
            let target = bundle.map_or_else(
                || String::from(entity_type),
                |name| format!("{entity_type}.{name}"),
            );
            return Err(ContentError::NotExposedToFieldUi { target }.into());
        };

        debug!(path = path.as_str(), "opening manage display");
        self.session.visit(&path)?;
        self.session.click_link(MANAGE_DISPLAY_LINK)?;
        Ok(())
    }

    /// Give the target view mode its own display settings.
    ///
    /// When `undo` is given, `uncustomize` is recorded on it.
    ///
    /// # Errors
    ///
    /// As for [`Self::manage_display`], plus session errors from the form.
    pub fn customize(&self, target: &ViewModeTarget, undo: Option<&mut CompensationStack<'a>>) -> Result<()> {
        self.set_custom_display(target, true)?;
        if let Some(stack) = undo {
            let ui = *self;
            let inverse = target.clone();
            stack.record("uncustomize", target.arguments(), move || {
                ui.uncustomize(&inverse, None)
            });
        }
        Ok(())
    }

    /// Make the target view mode fall back to the default display settings.
    ///
    /// When `undo` is given, `customize` is recorded on it.
    ///
    /// # Errors
    ///
    /// As for [`Self::customize`].
    pub fn uncustomize(&self, target: &ViewModeTarget, undo: Option<&mut CompensationStack<'a>>) -> Result<()> {
        self.set_custom_display(target, false)?;
        if let Some(stack) = undo {
            let ui = *self;
            let inverse = target.clone();
            stack.record("customize", target.arguments(), move || {
                ui.customize(&inverse, None)
            });
        }
        Ok(())
    }

    /// Enable layout overrides for the target view mode.
    ///
    /// When `undo` is given, `unpanelize` is recorded on it.
    ///
    /// # Errors
    ///
    /// As for [`Self::customize`].
    pub fn panelize(&self, target: &ViewModeTarget, undo: Option<&mut CompensationStack<'a>>) -> Result<()> {
        self.set_panelizer(target, true)?;
        if let Some(stack) = undo {
            let ui = *self;
            let inverse = target.clone();
            stack.record("unpanelize", target.arguments(), move || {
                ui.unpanelize(&inverse, None)
            });
        }
        Ok(())
    }

    /// Disable layout overrides for the target view mode.
    ///
    /// When `undo` is given, `panelize` is recorded on it.
    ///
    /// # Errors
    ///
    /// As for [`Self::customize`].
    pub fn unpanelize(&self, target: &ViewModeTarget, undo: Option<&mut CompensationStack<'a>>) -> Result<()> {
        self.set_panelizer(target, false)?;
        if let Some(stack) = undo {
            let ui = *self;
            let inverse = target.clone();
            stack.record("panelize", target.arguments(), move || {
                ui.panelize(&inverse, None)
            });
        }
        Ok(())
    }

    /// Delete the configuration entity at scenario end if it still exists.
    ///
    /// For entities a step creates through the UI, where the create itself
    /// cannot register an inverse.
    pub fn track_config_entity(&self, stack: &mut CompensationStack<'a>, entity_type: &str, id: &str) {
        let content = self.content;
        let entity_type_owned = String::from(entity_type);
        let id_owned = String::from(id);
        stack.record(
            "delete config entity",
            vec![entity_type_owned.clone(), id_owned.clone()],
            move || {
                if content.config_entity_exists(&entity_type_owned, &id_owned)? {
                    content.delete_config_entity(&entity_type_owned, &id_owned)?;
                } else {
                    debug!(
                        entity_type = entity_type_owned.as_str(),
                        id = id_owned.as_str(),
                        "tracked config entity already gone"
                    );
                }
                Ok(())
            },
        );
    }

    fn set_custom_display(&self, target: &ViewModeTarget, enabled: bool) -> Result<()> {
        self.manage_display(&target.entity_type, target.bundle.as_deref())?;
        let option = format!("display_modes_custom[{}]", target.view_mode);
        self.toggle(&option, enabled)?;
        self.session.press_button(SAVE_BUTTON)?;
        debug!(target = %target, enabled, "saved custom display setting");
        Ok(())
    }

    fn set_panelizer(&self, target: &ViewModeTarget, enabled: bool) -> Result<()> {
        self.manage_display(&target.entity_type, target.bundle.as_deref())?;
        self.session.click_link(&target.view_mode)?;
        for option in PANELIZER_OPTIONS {
            self.toggle(option, enabled)?;
        }
        self.session.press_button(SAVE_BUTTON)?;
        debug!(target = %target, enabled, "saved layout override setting");
        Ok(())
    }

    fn toggle(&self, option: &str, enabled: bool) -> Result<()> {
        if enabled {
            self.session.check_option(option)?;
        } else {
            self.session.uncheck_option(option)?;
        }
        Ok(())
    }
}
