//! Steps that create fixture entities in the store.

use super::hydrate::{FieldHydrator, Hydrator, HydratorRegistry, ensure_timestamps};
use super::{FixtureConfig, FixtureError};
use crate::alias::{AliasError, AliasRegistry};
use crate::entity::{Entity, EntityKey, FieldValue, SharedEntity};
use crate::store::{ClassMetadata, EntityStore, identifier_of};
use crate::table::merge;
use serde_json::{Map, Value};
use std::iter;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

/// Borrowing facade over the scenario state used by fixture steps.
pub struct EntityFixtures<'a> {
    catalog: &'a FixtureConfig,
    hydrators: &'a HydratorRegistry,
    aliases: &'a mut AliasRegistry,
    store: &'a mut dyn EntityStore,
}

impl<'a> EntityFixtures<'a> {
    /// Wrap the scenario's fixture state.
    #[must_use]
    pub fn new(
        catalog: &'a FixtureConfig,
        hydrators: &'a HydratorRegistry,
        aliases: &'a mut AliasRegistry,
        store: &'a mut dyn EntityStore,
    ) -> Self {
        Self {
            catalog,
            hydrators,
            aliases,
            store,
        }
    }

    /// Given an existing `<type>`.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError`] when configuration, hydration or persistence
    /// fails.
    pub fn an_existing(&mut self, entity_type: &str) -> Result<SharedEntity, FixtureError> {
        self.an_existing_with_values(entity_type, &Map::new())
    }

    /// Given an existing `<type>` with values, merged over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError`] when configuration, hydration or persistence
    /// fails.
    pub fn an_existing_with_values(
        &mut self,
        entity_type: &str,
        values: &Map<String, Value>,
    ) -> Result<SharedEntity, FixtureError> {
        let (metadata, entity) = self.build(entity_type, values)?;
        self.save(entity_type, &metadata, entity)
    }

    /// Given an existing `<type>` as `<alias>` [with values].
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError`] when the fixture cannot be created.
    pub fn an_existing_as(
        &mut self,
        entity_type: &str,
        alias: &str,
        values: &Map<String, Value>,
    ) -> Result<SharedEntity, FixtureError> {
        let entity = self.an_existing_with_values(entity_type, values)?;
        self.aliases.register(alias, Arc::clone(&entity));
        Ok(entity)
    }

    /// Given an existing `<type>` in `<collection>` [with values].
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError`] when the fixture cannot be created.
    pub fn an_existing_in(
        &mut self,
        entity_type: &str,
        collection: &str,
        values: &Map<String, Value>,
    ) -> Result<SharedEntity, FixtureError> {
        let entity = self.an_existing_with_values(entity_type, values)?;
        self.aliases.register_in(collection, Arc::clone(&entity));
        Ok(entity)
    }

    /// Given an existing `<type>` created with static method `<factory>`,
    /// optionally registered as `alias`. The factory receives the type's
    /// default properties.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::UnknownFactory`] when the class has no such
    /// factory, or another [`FixtureError`] when creation fails.
    pub fn an_existing_created_with(
        &mut self,
        entity_type: &str,
        factory: &str,
        alias: Option<&str>,
    ) -> Result<SharedEntity, FixtureError> {
        let catalog = self.catalog;
        let class = catalog.class(entity_type)?;
        let defaults = catalog.default_properties(entity_type)?;
        let metadata = self.store.metadata(class)?;
        let entity = metadata
            .instantiate_with(factory, defaults)
            .ok_or_else(|| FixtureError::UnknownFactory {
                class: class.to_owned(),
                factory: factory.to_owned(),
            })??;
        let entity = self.persist(entity_type, entity)?;
        if let Some(alias) = alias {
            self.aliases.register(alias, Arc::clone(&entity));
        }
        Ok(entity)
    }

    /// Given an existing `<type>` on `<parentType>` with id `<id>` [and
    /// values]. Owning-side associations to the parent are set.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::ParentNotFound`] when no parent has that id.
    pub fn an_existing_with_parent(
        &mut self,
        entity_type: &str,
        parent_type: &str,
        parent_id: &str,
        values: &Map<String, Value>,
    ) -> Result<SharedEntity, FixtureError> {
        let parent_class = self.catalog.class(parent_type)?;
        let (metadata, mut entity) = self.build(entity_type, values)?;
        let parent = self
            .store
            .find(parent_class, &FieldValue::Text(parent_id.to_owned()))?
            .ok_or_else(|| FixtureError::ParentNotFound {
                entity_type: parent_type.to_owned(),
                id: parent_id.to_owned(),
            })?;
        self.associate(&metadata, entity.as_mut(), parent.as_ref())?;
        self.save(entity_type, &metadata, entity)
    }

    /// Given an existing `<type>` on alias `<alias>` [with values].
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Alias`] when the alias is unknown.
    pub fn an_existing_on_alias(
        &mut self,
        entity_type: &str,
        alias: &str,
        values: &Map<String, Value>,
    ) -> Result<SharedEntity, FixtureError> {
        let parent = Arc::clone(self.aliases.resolve(alias)?);
        let (metadata, mut entity) = self.build(entity_type, values)?;
        self.associate(&metadata, entity.as_mut(), parent.as_ref())?;
        self.save(entity_type, &metadata, entity)
    }

    /// Entity registered under `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`AliasError::NotFound`] when the alias is unknown.
    pub fn entity_from_alias(&self, alias: &str) -> Result<SharedEntity, AliasError> {
        self.aliases.resolve(alias).map(Arc::clone)
    }

    fn hydrator(&self, entity_type: &str) -> Result<Arc<dyn Hydrator>, FixtureError> {
        match self.catalog.descriptor(entity_type)?.hydrator.as_deref() {
            None => Ok(Arc::new(FieldHydrator)),
            Some(name) => self
                .hydrators
                .get(name)
                .ok_or_else(|| FixtureError::UnknownHydrator {
                    entity_type: entity_type.to_owned(),
                    name: name.to_owned(),
                }),
        }
    }

    fn build(
        &self,
        entity_type: &str,
        values: &Map<String, Value>,
    ) -> Result<(Arc<ClassMetadata>, Box<dyn Entity>), FixtureError> {
        let class = self.catalog.class(entity_type)?;
        let properties = merge(self.catalog.default_properties(entity_type)?, values);
        let metadata = self.store.metadata(class)?;
        let mut entity = metadata.instantiate();
        self.hydrator(entity_type)?
            .hydrate(&metadata, &properties, entity.as_mut())?;
        ensure_timestamps(&metadata, entity.as_mut(), OffsetDateTime::now_utc())?;
        Ok((metadata, entity))
    }

    fn associate(
        &self,
        metadata: &ClassMetadata,
        entity: &mut dyn Entity,
        parent: &dyn Entity,
    ) -> Result<(), FixtureError> {
        let parent_metadata = self.store.metadata(parent.class_name())?;
        let key = EntityKey::new(
            parent_metadata.name(),
            identifier_of(&parent_metadata, parent),
        );
        let lineage = iter::once(parent_metadata.name())
            .chain(parent_metadata.parent_classes().iter().map(String::as_str));
        for class in lineage {
            for mapping in metadata
                .associations_targeting(class)
                .filter(|mapping| mapping.owning_side)
            {
                entity.set_field(&mapping.field, FieldValue::Reference(key.clone()))?;
            }
        }
        Ok(())
    }

    fn save(
        &mut self,
        entity_type: &str,
        metadata: &ClassMetadata,
        entity: Box<dyn Entity>,
    ) -> Result<SharedEntity, FixtureError> {
        debug!(entity_type, class = metadata.name(), "creating fixture");
        self.persist(entity_type, entity)
    }

    fn persist(
        &mut self,
        entity_type: &str,
        entity: Box<dyn Entity>,
    ) -> Result<SharedEntity, FixtureError> {
        let entity = self.store.persist(entity)?;
        self.store.flush()?;
        debug!(entity_type, class = entity.class_name(), "fixture persisted");
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::EntityTypeDescriptor;
    use crate::fixture::hydrate::HydrationError;
    use crate::store::{AssociationMapping, FieldType, InMemoryStore};
    use anyhow::{Result, ensure};
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    struct State {
        catalog: FixtureConfig,
        hydrators: HydratorRegistry,
        aliases: AliasRegistry,
        store: InMemoryStore,
    }

    impl State {
        fn new() -> Self {
            let store = InMemoryStore::new()
                .with_class(
                    ClassMetadata::record("Content", "id")
                        .with_field("title", FieldType::Text)
                        .with_field("published", FieldType::Boolean)
                        .with_field("createdAt", FieldType::DateTime),
                )
                .with_class(
                    ClassMetadata::record("Post", "id")
                        .with_parent_class("Content")
                        .with_field("title", FieldType::Text)
                        .with_field("published", FieldType::Boolean)
                        .with_field("createdAt", FieldType::DateTime),
                )
                .with_class(
                    ClassMetadata::record("Comment", "id")
                        .with_field("body", FieldType::Text)
                        .with_association(AssociationMapping::owning("content", "Content"))
                        .with_association(AssociationMapping::inverse("replies", "Post")),
                );
            let catalog = FixtureConfig::new()
                .with_type(
                    "post",
                    EntityTypeDescriptor::new("Post")
                        .with_defaults(object(json!({"title": "Draft", "published": "0"}))),
                )
                .with_type(
                    "comment",
                    EntityTypeDescriptor::new("Comment")
                        .with_defaults(object(json!({"body": "Nice"}))),
                );
            Self {
                catalog,
                hydrators: HydratorRegistry::new(),
                aliases: AliasRegistry::new(),
                store,
            }
        }

        fn fixtures(&mut self) -> EntityFixtures<'_> {
            EntityFixtures::new(
                &self.catalog,
                &self.hydrators,
                &mut self.aliases,
                &mut self.store,
            )
        }
    }

    #[test]
    fn creates_entity_with_defaults_and_overrides() -> Result<()> {
        let mut state = State::new();
        let post = state
            .fixtures()
            .an_existing_as("post", "p1", &object(json!({"published": "true"})))?;
        ensure!(post.field("title") == Some(FieldValue::Text("Draft".into())));
        ensure!(post.field("published") == Some(FieldValue::Bool(true)));
        ensure!(matches!(post.field("createdAt"), Some(FieldValue::DateTime(_))));
        ensure!(state.aliases.contains("p1"));
        ensure!(state.store.count("Post") == 1);
        Ok(())
    }

    #[test]
    fn nested_fixture_sets_association_through_parent_classes() -> Result<()> {
        let mut state = State::new();
        let post = state.fixtures().an_existing_as("post", "p1", &Map::new())?;
        let comment = state.fixtures().an_existing_on_alias("comment", "p1", &Map::new())?;
        let expected = EntityKey::new("Post", post.field("id").unwrap_or(FieldValue::Null));
        ensure!(comment.field("content") == Some(FieldValue::Reference(expected)));
        ensure!(comment.field("replies").is_none());

        let by_id = state
            .fixtures()
            .an_existing_with_parent("comment", "post", "1", &Map::new())?;
        ensure!(by_id.field("content").is_some());
        Ok(())
    }

    #[test]
    fn missing_parent_is_reported() {
        let mut state = State::new();
        let result = state
            .fixtures()
            .an_existing_with_parent("comment", "post", "99", &Map::new());
        assert_eq!(
            result.err(),
            Some(FixtureError::ParentNotFound {
                entity_type: "post".into(),
                id: "99".into()
            })
        );
    }

    #[test]
    fn collections_accumulate() -> Result<()> {
        let mut state = State::new();
        state.fixtures().an_existing_in("post", "posts", &Map::new())?;
        state.fixtures().an_existing_in("post", "posts", &Map::new())?;
        ensure!(state.aliases.collection("posts").map(<[_]>::len) == Ok(2));
        Ok(())
    }

    #[test]
    fn malformed_boolean_fails_fast() {
        let mut state = State::new();
        let result = state
            .fixtures()
            .an_existing_with_values("post", &object(json!({"published": "perhaps"})));
        assert!(matches!(
            result,
            Err(FixtureError::Hydration(
                HydrationError::MalformedBooleanLiteral { .. }
            ))
        ));
    }

    #[test]
    fn unknown_factory_and_hydrator_are_reported() {
        let mut state = State::new();
        state.catalog = state.catalog.clone().with_type(
            "odd",
            EntityTypeDescriptor::new("Post")
                .with_hydrator("custom")
                .with_defaults(object(json!({"title": "x"}))),
        );
        let factory = state.fixtures().an_existing_created_with("post", "draft", None);
        assert!(matches!(factory, Err(FixtureError::UnknownFactory { .. })));
        let hydrator = state.fixtures().an_existing("odd");
        assert!(matches!(hydrator, Err(FixtureError::UnknownHydrator { .. })));
    }
}
