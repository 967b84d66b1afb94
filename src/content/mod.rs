//! Content and configuration collaborator.
//!
//! Fixture steps need a little knowledge of the site's configuration: where an
//! entity type's field administration lives, and whether a configuration
//! entity created during a scenario still exists. A runner supplies this
//! through [`ContentApi`], usually backed by the site's own API.

use crate::error::ContentError;

/// Result type returned by content API operations.
pub type ContentResult<T> = Result<T, ContentError>;

/// Read and delete access to the site's configuration.
pub trait ContentApi {
    /// The internal path of the Field UI base route for `entity_type`.
    ///
    /// `bundle` narrows the route for bundleable entity types. Returns
    /// `Ok(None)` when the entity type is not exposed to Field UI.
    fn field_ui_path(&self, entity_type: &str, bundle: Option<&str>) -> ContentResult<Option<String>>;

    /// Whether the configuration entity `id` of `entity_type` exists.
    fn config_entity_exists(&self, entity_type: &str, id: &str) -> ContentResult<bool>;

    /// Delete the configuration entity `id` of `entity_type`.
    fn delete_config_entity(&self, entity_type: &str, id: &str) -> ContentResult<()>;
}
