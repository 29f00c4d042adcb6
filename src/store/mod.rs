//! Persistence collaborator used by fixture and alias steps.
//!
//! The [`EntityStore`] trait is the seam between step logic and whatever
//! mapper backs the application under test. [`InMemoryStore`] is a complete
//! implementation used by the binary's dry runs and by the test suite.

mod memory;
mod metadata;

pub use memory::InMemoryStore;
pub use metadata::{AssociationMapping, ClassMetadata, Constructor, Factory, FieldType};

use crate::entity::{Entity, EntityError, FieldValue, SharedEntity};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by an [`EntityStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No metadata is registered for the class.
    #[error("no mapping registered for class '{class}'")]
    UnknownClass {
        /// Requested class name.
        class: String,
    },
    /// The store has been closed for this scenario.
    #[error("the entity store has been closed")]
    Closed,
    /// Writing a generated identifier failed.
    #[error(transparent)]
    Entity(#[from] EntityError),
}

/// Operations the step library needs from the persistence layer.
pub trait EntityStore: Send {
    /// Metadata for `class`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownClass`] when the class is not mapped.
    fn metadata(&self, class: &str) -> Result<Arc<ClassMetadata>, StoreError>;

    /// Metadata for every mapped class, in registration order.
    fn all_metadata(&self) -> Vec<Arc<ClassMetadata>>;

    /// Look up an entity by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the class is unknown or the store closed.
    fn find(&self, class: &str, id: &FieldValue) -> Result<Option<SharedEntity>, StoreError>;

    /// Look up the first entity whose `field` renders equal to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the class is unknown or the store closed.
    fn find_one_by(
        &self,
        class: &str,
        field: &str,
        value: &FieldValue,
    ) -> Result<Option<SharedEntity>, StoreError>;

    /// Schedule `entity` for insertion, assigning an identifier when unset.
    /// An entity whose identifier is already stored replaces the stored one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the class is unknown or the store closed.
    fn persist(&mut self, entity: Box<dyn Entity>) -> Result<SharedEntity, StoreError>;

    /// Write every scheduled entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after [`EntityStore::close`].
    fn flush(&mut self) -> Result<(), StoreError>;

    /// Discard scheduled but unflushed entities.
    fn clear(&mut self);

    /// Drop all stored data and recreate empty tables.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after [`EntityStore::close`].
    fn reset_schema(&mut self) -> Result<(), StoreError>;

    /// Release the underlying connection.
    ///
    /// # Errors
    ///
    /// Implementations may fail to release their connection.
    fn close(&mut self) -> Result<(), StoreError>;
}

/// Identifier value of `entity` according to `metadata`.
#[must_use]
pub fn identifier_of(metadata: &ClassMetadata, entity: &dyn Entity) -> FieldValue {
    entity
        .field(metadata.identifier())
        .unwrap_or(FieldValue::Null)
}
