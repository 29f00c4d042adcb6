//! Static per-type fixture configuration and its lookup rules.

use super::FixtureError;
use crate::pluralize::pluralize;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Configuration for one logical entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityTypeDescriptor {
    /// Concrete class name known to the entity store.
    pub entity: String,
    /// Explicit REST route segment. Derived by pluralisation when absent.
    #[serde(default)]
    pub route: Option<String>,
    /// Additional logical names resolving to this descriptor.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Property values applied before step-supplied values.
    #[serde(default)]
    pub default_properties: Option<Map<String, Value>>,
    /// Name of a custom hydrator registered with the scenario.
    #[serde(default)]
    pub hydrator: Option<String>,
}

impl EntityTypeDescriptor {
    /// Descriptor for `entity` with no defaults.
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Self::default()
        }
    }

    /// Set the explicit route segment.
    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Add an alternative logical name.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Set the default property values.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.default_properties = Some(defaults);
        self
    }

    /// Name a custom hydrator.
    #[must_use]
    pub fn with_hydrator(mut self, hydrator: impl Into<String>) -> Self {
        self.hydrator = Some(hydrator.into());
        self
    }
}

/// Ordered table of logical type names to descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FixtureConfig {
    entities: IndexMap<String, EntityTypeDescriptor>,
}

impl FixtureConfig {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the descriptor for `entity_type`.
    #[must_use]
    pub fn with_type(
        mut self,
        entity_type: impl Into<String>,
        descriptor: EntityTypeDescriptor,
    ) -> Self {
        self.entities.insert(entity_type.into(), descriptor);
        self
    }

    /// Configured types in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &EntityTypeDescriptor)> {
        self.entities.iter()
    }

    /// Number of configured types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` when no types are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Resolve `entity_type` by direct key, then by the first descriptor
    /// listing it among its aliases.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::EntityTypeNotConfigured`] when neither matches.
    pub fn descriptor(&self, entity_type: &str) -> Result<&EntityTypeDescriptor, FixtureError> {
        self.entities
            .get(entity_type)
            .or_else(|| {
                self.entities
                    .values()
                    .find(|descriptor| descriptor.aliases.iter().any(|a| a == entity_type))
            })
            .ok_or_else(|| FixtureError::EntityTypeNotConfigured {
                entity_type: entity_type.to_owned(),
            })
    }

    /// Concrete class configured for `entity_type`.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::EntityTypeNotConfigured`] for unknown types.
    pub fn class(&self, entity_type: &str) -> Result<&str, FixtureError> {
        Ok(self.descriptor(entity_type)?.entity.as_str())
    }

    /// REST route segment for `entity_type`, pluralising the given name when
    /// no explicit route is configured.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::EntityTypeNotConfigured`] for unknown types.
    pub fn route(&self, entity_type: &str) -> Result<String, FixtureError> {
        let descriptor = self.descriptor(entity_type)?;
        Ok(descriptor
            .route
            .as_deref()
            .filter(|route| !route.is_empty())
            .map_or_else(|| pluralize(entity_type), ToOwned::to_owned))
    }

    /// Default properties for `entity_type`.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::EntityTypeNotConfigured`] for unknown types and
    /// [`FixtureError::MissingDefaultProperties`] when the defaults are absent
    /// or empty.
    pub fn default_properties(&self, entity_type: &str) -> Result<&Map<String, Value>, FixtureError> {
        self.descriptor(entity_type)?
            .default_properties
            .as_ref()
            .filter(|defaults| !defaults.is_empty())
            .ok_or_else(|| FixtureError::MissingDefaultProperties {
                entity_type: entity_type.to_owned(),
            })
    }
}
