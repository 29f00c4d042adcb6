//! Database lifecycle steps.

use crate::store::{EntityStore, StoreError};
use tracing::info;

/// Borrowing facade for database steps.
pub struct DatabaseSteps<'a> {
    store: &'a mut dyn EntityStore,
}

impl<'a> DatabaseSteps<'a> {
    /// Wrap the scenario's store.
    #[must_use]
    pub fn new(store: &'a mut dyn EntityStore) -> Self {
        Self { store }
    }

    /// Given a clean database.
    ///
    /// Discards unflushed work, then drops and recreates the schema for
    /// every mapped class.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the schema cannot be recreated.
    pub fn clean_database(&mut self) -> Result<(), StoreError> {
        self.store.clear();
        self.store.reset_schema()?;
        info!(
            classes = self.store.all_metadata().len(),
            "database schema recreated"
        );
        Ok(())
    }

    /// Close the connection after a scenario.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the connection cannot be released.
    pub fn cleanup(&mut self) -> Result<(), StoreError> {
        self.store.close()
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "database step tests fail fast on setup errors")]
mod tests {
    use super::*;
    use crate::entity::Record;
    use crate::store::{ClassMetadata, InMemoryStore};

    #[test]
    fn clean_database_drops_rows_and_pending_work() {
        let mut store = InMemoryStore::new().with_class(ClassMetadata::record("Post", "id"));
        store.persist(Box::new(Record::new("Post"))).expect("persist");
        store.flush().expect("flush");
        store.persist(Box::new(Record::new("Post"))).expect("persist");

        DatabaseSteps::new(&mut store).clean_database().expect("clean");
        store.flush().expect("flush");
        assert_eq!(store.count("Post"), 0);
    }

    #[test]
    fn cleanup_closes_the_store() {
        let mut store = InMemoryStore::new();
        DatabaseSteps::new(&mut store).cleanup().expect("close");
        assert!(store.is_closed());
        assert_eq!(
            DatabaseSteps::new(&mut store).clean_database(),
            Err(StoreError::Closed)
        );
    }
}
