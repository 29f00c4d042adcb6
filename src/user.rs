//! Default user generation for authentication steps.

use crate::config::UserOptions;
use crate::entity::Entity;
use crate::fixture::FixtureError;
use crate::fixture::hydrate::{FieldHydrator, Hydrator, ensure_timestamps};
use crate::store::{EntityStore, identifier_of};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use time::OffsetDateTime;
use tracing::debug;

/// Turns a configured plain-text password into its stored form.
pub trait PasswordHasher: fmt::Debug + Send + Sync {
    /// Stored form of `plain`.
    fn hash(&self, plain: &str) -> String;
}

/// Stores passwords as lower-case hex SHA-256 digests.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256PasswordHasher;

impl PasswordHasher for Sha256PasswordHasher {
    fn hash(&self, plain: &str) -> String {
        hex(&Sha256::digest(plain.as_bytes()))
    }
}

/// Lower-case hex rendering of `bytes`.
pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Builds users from [`UserOptions`].
pub struct UserFixtures<'a> {
    options: &'a UserOptions,
    store: &'a dyn EntityStore,
    hasher: &'a dyn PasswordHasher,
}

impl<'a> UserFixtures<'a> {
    /// Wrap the user options and the store used to find existing users.
    #[must_use]
    pub fn new(
        options: &'a UserOptions,
        store: &'a dyn EntityStore,
        hasher: &'a dyn PasswordHasher,
    ) -> Self {
        Self {
            options,
            store,
            hasher,
        }
    }

    /// Build an unsaved user with `role` from the default properties.
    ///
    /// `identifier` overrides the step identifier field. A user already
    /// stored under the same identifier value keeps its primary key, so
    /// persisting the result updates that user instead of adding another.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError`] when the user class is unknown or a property
    /// cannot be coerced.
    pub fn generate_default_user(
        &self,
        role: &str,
        identifier: Option<&str>,
    ) -> Result<Box<dyn Entity>, FixtureError> {
        let options = self.options;
        let metadata = self.store.metadata(&options.entity)?;
        let mut properties = options.default_properties.clone();
        let hashed = properties
            .get("password")
            .and_then(Value::as_str)
            .map(|password| self.hasher.hash(password));
        if let Some(hashed) = hashed {
            properties.insert("password".to_owned(), Value::String(hashed));
        }
        properties.insert(
            options.roles_field.clone(),
            Value::Array(vec![Value::String(role.to_owned())]),
        );
        if let Some(identifier) = identifier.filter(|id| !id.is_empty()) {
            properties.insert(
                options.step_identifier.clone(),
                Value::String(identifier.to_owned()),
            );
        }

        let mut user = metadata.instantiate();
        FieldHydrator.hydrate(&metadata, &properties, user.as_mut())?;
        ensure_timestamps(&metadata, user.as_mut(), OffsetDateTime::now_utc())?;

        if let Some(lookup) = user.field(&options.step_identifier).filter(|v| !v.is_null()) {
            let existing =
                self.store
                    .find_one_by(&options.entity, &options.step_identifier, &lookup)?;
            if let Some(existing) = existing {
                let id = identifier_of(&metadata, existing.as_ref());
                debug!(class = %options.entity, id = %id, "reusing existing user");
                user.set_field(metadata.identifier(), id)?;
            }
        }
        Ok(user)
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "user fixture tests fail fast on setup errors")]
mod tests {
    use super::*;
    use crate::entity::{FieldValue, Record};
    use crate::store::{ClassMetadata, FieldType, InMemoryStore};
    use serde_json::json;

    fn store() -> InMemoryStore {
        InMemoryStore::new().with_class(
            ClassMetadata::record("User", "id")
                .with_field("email", FieldType::Text)
                .with_field("password", FieldType::Text)
                .with_field("roles", FieldType::SimpleArray),
        )
    }

    fn options() -> UserOptions {
        UserOptions::new("User").with_defaults(
            json!({"email": "default@example.com", "password": "secret"})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        )
    }

    #[test]
    fn builds_user_with_role_and_hashed_password() {
        let store = store();
        let options = options();
        let users = UserFixtures::new(&options, &store, &Sha256PasswordHasher);
        let user = users
            .generate_default_user("admin", Some("a@b.com"))
            .expect("user");
        assert_eq!(user.field("email"), Some(FieldValue::Text("a@b.com".into())));
        assert_eq!(user.field("roles"), Some(FieldValue::List(vec!["admin".into()])));
        assert_eq!(
            user.field("password"),
            Some(FieldValue::Text(
                "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b".into()
            ))
        );
        assert_eq!(user.field("id"), None);
    }

    #[test]
    fn existing_user_keeps_its_identifier() {
        let mut store = store();
        store
            .persist(Box::new(
                Record::new("User").with("id", 12).with("email", "default@example.com"),
            ))
            .expect("persist");
        store.flush().expect("flush");
        let options = options();
        let users = UserFixtures::new(&options, &store, &Sha256PasswordHasher);
        let user = users.generate_default_user("user", None).expect("user");
        assert_eq!(user.field("id"), Some(FieldValue::Integer(12)));
    }

    #[test]
    fn unknown_user_class_fails() {
        let store = InMemoryStore::new();
        let options = options();
        let users = UserFixtures::new(&options, &store, &Sha256PasswordHasher);
        assert!(matches!(
            users.generate_default_user("user", None),
            Err(FixtureError::Store(_))
        ));
    }
}
