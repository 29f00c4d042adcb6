//! Map-backed [`EntityStore`] implementation.

use super::{ClassMetadata, EntityStore, StoreError, identifier_of};
use crate::entity::{Entity, FieldValue, SharedEntity};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type Table = IndexMap<String, SharedEntity>;

/// Entity store holding rows in memory, keyed by class and rendered id.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    classes: IndexMap<String, Arc<ClassMetadata>>,
    rows: HashMap<String, Table>,
    pending: HashMap<String, Table>,
    sequences: HashMap<String, i64>,
    closed: bool,
}

impl InMemoryStore {
    /// Create an empty store with no mapped classes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a class.
    #[must_use]
    pub fn with_class(mut self, metadata: ClassMetadata) -> Self {
        self.register(metadata);
        self
    }

    /// Map a class on an existing store.
    pub fn register(&mut self, metadata: ClassMetadata) {
        self.classes
            .insert(metadata.name().to_owned(), Arc::new(metadata));
    }

    /// Flushed entities of `class`, in insertion order.
    #[must_use]
    pub fn entities(&self, class: &str) -> Vec<SharedEntity> {
        self.rows
            .get(class)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of flushed entities of `class`.
    #[must_use]
    pub fn count(&self, class: &str) -> usize {
        self.rows.get(class).map_or(0, IndexMap::len)
    }

    /// Returns `true` once [`EntityStore::close`] has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    const fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn lookup(&self, class: &str, key: &str) -> Option<SharedEntity> {
        self.pending
            .get(class)
            .and_then(|table| table.get(key))
            .or_else(|| self.rows.get(class).and_then(|table| table.get(key)))
            .cloned()
    }

    fn candidates<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a SharedEntity> + 'a {
        self.rows
            .get(class)
            .into_iter()
            .chain(self.pending.get(class))
            .flat_map(IndexMap::values)
    }

    fn next_id(&mut self, class: &str) -> i64 {
        let counter = self.sequences.entry(class.to_owned()).or_insert(0);
        *counter += 1;
        *counter
    }

    fn observe_id(&mut self, class: &str, id: &FieldValue) {
        if let FieldValue::Integer(value) = id {
            let counter = self.sequences.entry(class.to_owned()).or_insert(0);
            *counter = (*counter).max(*value);
        }
    }
}

impl EntityStore for InMemoryStore {
    fn metadata(&self, class: &str) -> Result<Arc<ClassMetadata>, StoreError> {
        self.classes
            .get(class)
            .cloned()
            .ok_or_else(|| StoreError::UnknownClass {
                class: class.to_owned(),
            })
    }

    fn all_metadata(&self) -> Vec<Arc<ClassMetadata>> {
        self.classes.values().cloned().collect()
    }

    fn find(&self, class: &str, id: &FieldValue) -> Result<Option<SharedEntity>, StoreError> {
        self.ensure_open()?;
        self.metadata(class)?;
        Ok(self.lookup(class, &id.to_string()))
    }

    fn find_one_by(
        &self,
        class: &str,
        field: &str,
        value: &FieldValue,
    ) -> Result<Option<SharedEntity>, StoreError> {
        self.ensure_open()?;
        self.metadata(class)?;
        let wanted = value.to_string();
        Ok(self
            .candidates(class)
            .find(|entity| {
                entity
                    .field(field)
                    .is_some_and(|found| found.to_string() == wanted)
            })
            .cloned())
    }

    fn persist(&mut self, mut entity: Box<dyn Entity>) -> Result<SharedEntity, StoreError> {
        self.ensure_open()?;
        let class = entity.class_name().to_owned();
        let metadata = self.metadata(&class)?;
        let mut id = identifier_of(&metadata, entity.as_ref());
        if id.is_null() {
            id = FieldValue::Integer(self.next_id(&class));
            entity.set_field(metadata.identifier(), id.clone())?;
        } else {
            self.observe_id(&class, &id);
        }

        let shared: SharedEntity = Arc::from(entity);
        debug!(class = %class, id = %id, "entity scheduled for insert");
        self.pending
            .entry(class)
            .or_default()
            .insert(id.to_string(), Arc::clone(&shared));
        Ok(shared)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        for (class, table) in self.pending.drain() {
            let rows = self.rows.entry(class).or_default();
            for (key, entity) in table {
                rows.insert(key, entity);
            }
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.pending.clear();
    }

    fn reset_schema(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.rows.clear();
        self.pending.clear();
        self.sequences.clear();
        debug!(classes = self.classes.len(), "schema recreated");
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.closed = true;
        Ok(())
    }
}
