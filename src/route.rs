//! REST resource path construction.
//!
//! Paths have the shape `/{route}[/{id}[/{subroute}][/{subId}]]`. Routes come
//! from the fixture configuration or, when none is set, from pluralising the
//! logical type name. Identifiers are expected to be alias-substituted by
//! the caller; empty identifiers count as absent.

use crate::fixture::{FixtureConfig, FixtureError};

/// Build the path for a resource or a nested resource.
///
/// The nested route is only appended when both `id` and `sub_type` are
/// present, while `sub_id` is appended whenever it is present.
///
/// # Errors
///
/// Returns [`FixtureError::EntityTypeNotConfigured`] when `entity_type`, or a
/// `sub_type` that is used, has no descriptor.
pub fn resource_uri(
    catalog: &FixtureConfig,
    entity_type: &str,
    id: Option<&str>,
    sub_type: Option<&str>,
    sub_id: Option<&str>,
) -> Result<String, FixtureError> {
    let id = id.filter(|id| !id.is_empty());
    let sub_id = sub_id.filter(|id| !id.is_empty());

    let mut uri = format!("/{}", catalog.route(entity_type)?);
    if let Some(id) = id {
        uri.push('/');
        uri.push_str(id);
        if let Some(sub_type) = sub_type {
            uri.push('/');
            uri.push_str(&catalog.route(sub_type)?);
        }
    }
    if let Some(sub_id) = sub_id {
        uri.push('/');
        uri.push_str(sub_id);
    }
    Ok(uri)
}
