//! Entity fixtures: configuration lookup, hydration and creation steps.

mod catalog;
mod context;
pub mod hydrate;

pub use catalog::{EntityTypeDescriptor, FixtureConfig};
pub use context::EntityFixtures;

use crate::alias::AliasError;
use crate::entity::EntityError;
use crate::store::StoreError;
use crate::table::TableError;
use hydrate::HydrationError;
use thiserror::Error;

/// Errors raised by fixture configuration lookups and fixture steps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureError {
    /// No descriptor matches the logical type, directly or by alias.
    #[error("no fixture configuration for entity type '{entity_type}'")]
    EntityTypeNotConfigured {
        /// Requested logical type.
        entity_type: String,
    },
    /// The descriptor has no default properties.
    #[error("no default properties configured for entity type '{entity_type}'")]
    MissingDefaultProperties {
        /// Requested logical type.
        entity_type: String,
    },
    /// The descriptor names a hydrator that was never registered.
    #[error("hydrator '{name}' for entity type '{entity_type}' is not registered")]
    UnknownHydrator {
        /// Requested logical type.
        entity_type: String,
        /// Configured hydrator name.
        name: String,
    },
    /// The class has no factory of that name.
    #[error("class '{class}' has no factory named '{factory}'")]
    UnknownFactory {
        /// Concrete class.
        class: String,
        /// Requested factory.
        factory: String,
    },
    /// The parent entity of a nested fixture does not exist.
    #[error("no '{entity_type}' with id '{id}' exists")]
    ParentNotFound {
        /// Parent logical type.
        entity_type: String,
        /// Requested identifier.
        id: String,
    },
    /// Alias lookup failed.
    #[error(transparent)]
    Alias(#[from] AliasError),
    /// Value coercion failed.
    #[error(transparent)]
    Hydration(#[from] HydrationError),
    /// Entity field access failed.
    #[error(transparent)]
    Entity(#[from] EntityError),
    /// The entity store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The step table was malformed.
    #[error(transparent)]
    Table(#[from] TableError),
}
