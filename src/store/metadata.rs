//! Class metadata consumed by hydration, alias resolution and association
//! wiring.

use crate::entity::{Entity, EntityError, Record};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Creates a fresh, empty instance of an entity class.
pub type Constructor = Arc<dyn Fn() -> Box<dyn Entity> + Send + Sync>;

/// Builds an instance from a property map, like a named static constructor.
pub type Factory =
    Arc<dyn Fn(&Map<String, Value>) -> Result<Box<dyn Entity>, EntityError> + Send + Sync>;

/// Semantic type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Free text.
    Text,
    /// Signed integer.
    Integer,
    /// Floating point number.
    Float,
    /// Boolean flag.
    Boolean,
    /// Timestamp.
    DateTime,
    /// Comma separated list of strings.
    SimpleArray,
    /// Arbitrary JSON document.
    Json,
}

/// Relationship from one class to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationMapping {
    /// Field on the declaring class holding the reference.
    pub field: String,
    /// Class the association points at.
    pub target_class: String,
    /// Whether the declaring class owns the foreign key.
    pub owning_side: bool,
}

impl AssociationMapping {
    /// Owning-side association, the only kind that can be written directly.
    #[must_use]
    pub fn owning(field: impl Into<String>, target_class: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            target_class: target_class.into(),
            owning_side: true,
        }
    }

    /// Inverse-side association.
    #[must_use]
    pub fn inverse(field: impl Into<String>, target_class: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            target_class: target_class.into(),
            owning_side: false,
        }
    }
}

/// Mapping information for one persisted class.
#[derive(Clone)]
pub struct ClassMetadata {
    name: String,
    identifier: String,
    fields: IndexMap<String, FieldType>,
    associations: Vec<AssociationMapping>,
    parent_classes: Vec<String>,
    constructor: Constructor,
    factories: IndexMap<String, Factory>,
}

impl fmt::Debug for ClassMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassMetadata")
            .field("name", &self.name)
            .field("identifier", &self.identifier)
            .field("fields", &self.fields)
            .field("associations", &self.associations)
            .field("parent_classes", &self.parent_classes)
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ClassMetadata {
    /// Describe a class built by `constructor` with the given identifier
    /// field. The identifier is declared as an integer field.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        identifier: impl Into<String>,
        constructor: Constructor,
    ) -> Self {
        let identifier = identifier.into();
        let mut fields = IndexMap::new();
        fields.insert(identifier.clone(), FieldType::Integer);
        Self {
            name: name.into(),
            identifier,
            fields,
            associations: Vec::new(),
            parent_classes: Vec::new(),
            constructor,
            factories: IndexMap::new(),
        }
    }

    /// Describe a class whose instances are plain [`Record`]s.
    #[must_use]
    pub fn record(name: impl Into<String>, identifier: impl Into<String>) -> Self {
        let name = name.into();
        let class = name.clone();
        let constructor: Constructor = Arc::new(move || Box::new(Record::new(class.clone())));
        Self::new(name, identifier, constructor)
    }

    /// Declare a field with its semantic type.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    /// Declare an association to another class.
    #[must_use]
    pub fn with_association(mut self, mapping: AssociationMapping) -> Self {
        self.associations.push(mapping);
        self
    }

    /// Declare a parent class, nearest ancestor first.
    #[must_use]
    pub fn with_parent_class(mut self, class: impl Into<String>) -> Self {
        self.parent_classes.push(class.into());
        self
    }

    /// Register a named factory, the equivalent of a static constructor.
    #[must_use]
    pub fn with_factory(mut self, name: impl Into<String>, factory: Factory) -> Self {
        self.factories.insert(name.into(), factory);
        self
    }

    /// Class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the single identifier field.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Declared fields in declaration order.
    #[must_use]
    pub const fn fields(&self) -> &IndexMap<String, FieldType> {
        &self.fields
    }

    /// Semantic type of `field`, if declared.
    #[must_use]
    pub fn field_type(&self, field: &str) -> Option<FieldType> {
        self.fields.get(field).copied()
    }

    /// Returns `true` when `field` is declared.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// All association mappings.
    #[must_use]
    pub fn associations(&self) -> &[AssociationMapping] {
        &self.associations
    }

    /// Associations pointing at `target_class`.
    pub fn associations_targeting<'a>(
        &'a self,
        target_class: &'a str,
    ) -> impl Iterator<Item = &'a AssociationMapping> + 'a {
        self.associations
            .iter()
            .filter(move |mapping| mapping.target_class == target_class)
    }

    /// Ancestor classes, nearest first.
    #[must_use]
    pub fn parent_classes(&self) -> &[String] {
        &self.parent_classes
    }

    /// Build a fresh instance using the default constructor.
    #[must_use]
    pub fn instantiate(&self) -> Box<dyn Entity> {
        (self.constructor)()
    }

    /// Build an instance from `values` using the named factory.
    ///
    /// Returns `None` when no factory of that name is registered.
    #[must_use]
    pub fn instantiate_with(
        &self,
        factory: &str,
        values: &Map<String, Value>,
    ) -> Option<Result<Box<dyn Entity>, EntityError>> {
        self.factories.get(factory).map(|build| build(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_metadata_declares_identifier_and_builds_records() {
        let meta = ClassMetadata::record("Post", "id")
            .with_field("title", FieldType::Text)
            .with_association(AssociationMapping::owning("author", "User"))
            .with_association(AssociationMapping::inverse("comments", "Comment"));

        assert_eq!(meta.identifier(), "id");
        assert_eq!(meta.field_type("id"), Some(FieldType::Integer));
        assert_eq!(meta.field_type("title"), Some(FieldType::Text));
        assert!(!meta.has_field("body"));
        assert_eq!(meta.associations_targeting("User").count(), 1);
        assert_eq!(meta.instantiate().class_name(), "Post");
        assert!(meta.instantiate_with("draft", &Map::new()).is_none());
    }
}
