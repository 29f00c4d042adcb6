//! Scenario-scoped alias registry.
//!
//! Scalar aliases and collection aliases live in separate slots so that
//! registering `posts` as a collection never shadows a scalar `posts`.

use crate::entity::SharedEntity;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Errors raised by alias lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AliasError {
    /// The alias was never registered in the current scenario.
    #[error("alias '{alias}' was not registered in this scenario")]
    NotFound {
        /// Requested alias name.
        alias: String,
    },
    /// The collection alias was never registered in the current scenario.
    #[error("collection alias '{alias}' was not registered in this scenario")]
    CollectionNotFound {
        /// Requested collection name.
        alias: String,
    },
}

/// Mapping from alias name to previously created entities.
#[derive(Debug, Default)]
pub struct AliasRegistry {
    scalars: HashMap<String, SharedEntity>,
    collections: HashMap<String, Vec<SharedEntity>>,
}

impl AliasRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `entity`, replacing any previous binding.
    pub fn register(&mut self, name: impl Into<String>, entity: SharedEntity) {
        let name = name.into();
        debug!(alias = %name, class = entity.class_name(), "alias registered");
        self.scalars.insert(name, entity);
    }

    /// Append `entity` to the collection `name`, creating it when absent.
    pub fn register_in(&mut self, name: impl Into<String>, entity: SharedEntity) {
        let name = name.into();
        debug!(collection = %name, class = entity.class_name(), "alias appended");
        self.collections.entry(name).or_default().push(entity);
    }

    /// Look up a scalar alias.
    ///
    /// # Errors
    ///
    /// Returns [`AliasError::NotFound`] when `name` is not registered.
    pub fn resolve(&self, name: &str) -> Result<&SharedEntity, AliasError> {
        self.scalars.get(name).ok_or_else(|| AliasError::NotFound {
            alias: name.to_owned(),
        })
    }

    /// Look up a collection alias.
    ///
    /// # Errors
    ///
    /// Returns [`AliasError::CollectionNotFound`] when `name` is not
    /// registered.
    pub fn collection(&self, name: &str) -> Result<&[SharedEntity], AliasError> {
        self.collections
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| AliasError::CollectionNotFound {
                alias: name.to_owned(),
            })
    }

    /// Returns `true` when a scalar alias `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.scalars.contains_key(name)
    }

    /// Total number of scalar and collection bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scalars.len() + self.collections.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every binding.
    pub fn reset(&mut self) {
        self.scalars.clear();
        self.collections.clear();
    }
}
