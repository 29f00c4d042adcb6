//! A small blog domain shared by integration and behaviour tests.
//!
//! `User` is a hand-written [`Entity`] so tests cover typed entities as well
//! as the map-backed [`Record`] used for posts and comments.

use rest_steps::config::ExtensionConfig;
use rest_steps::entity::{Entity, EntityError, FieldValue, Record};
use rest_steps::store::{AssociationMapping, ClassMetadata, FieldType, InMemoryStore};
use std::sync::Arc;

/// Fixture catalogue and default user for the blog domain.
pub const CONFIG_YAML: &str = "\
api:
  base_uri: http://127.0.0.1:9
  headers:
    Accept: application/json
entities:
  user:
    entity: User
    default_properties:
      email: default@example.com
      name: Default User
  post:
    entity: Post
    aliases: [article]
    default_properties:
      title: Hello
      published: false
  comment:
    entity: Comment
    default_properties:
      body: Nice post
user:
  entity: User
  default_properties:
    email: default@example.com
    name: Default User
    password: secret
";

/// Parse [`CONFIG_YAML`] pointed at `base_uri`.
pub fn config(base_uri: &str) -> ExtensionConfig {
    ExtensionConfig::from_yaml_str(CONFIG_YAML, "blog.yml")
        .expect("blog configuration parses")
        .with_base_uri_override(Some(base_uri.to_owned()))
}

/// User with typed fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    id: Option<i64>,
    email: String,
    name: String,
    password: String,
    roles: Vec<String>,
}

impl User {
    /// Assigned identifier, once persisted.
    pub const fn id(&self) -> Option<i64> {
        self.id
    }

    /// Granted roles.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

fn text(class: &str, field: &str, value: FieldValue) -> Result<String, EntityError> {
    match value {
        FieldValue::Text(text) => Ok(text),
        other => Err(EntityError::TypeMismatch {
            class: class.to_owned(),
            field: field.to_owned(),
            expected: "text",
            found: other.to_string(),
        }),
    }
}

impl Entity for User {
    fn class_name(&self) -> &str {
        "User"
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(self.id.map_or(FieldValue::Null, FieldValue::Integer)),
            "email" => Some(FieldValue::Text(self.email.clone())),
            "name" => Some(FieldValue::Text(self.name.clone())),
            "password" => Some(FieldValue::Text(self.password.clone())),
            "roles" => Some(FieldValue::List(self.roles.clone())),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EntityError> {
        match (name, value) {
            ("id", FieldValue::Integer(id)) => self.id = Some(id),
            ("id", FieldValue::Null) => self.id = None,
            ("roles", FieldValue::List(roles)) => self.roles = roles,
            ("email", value) => self.email = text("User", name, value)?,
            ("name", value) => self.name = text("User", name, value)?,
            ("password", value) => self.password = text("User", name, value)?,
            (field, value) => {
                return Err(if self.field(field).is_some() {
                    EntityError::TypeMismatch {
                        class: "User".to_owned(),
                        field: field.to_owned(),
                        expected: "a value of the declared type",
                        found: value.to_string(),
                    }
                } else {
                    EntityError::UnknownField {
                        class: "User".to_owned(),
                        field: field.to_owned(),
                    }
                });
            }
        }
        Ok(())
    }
}

/// Store mapping `User`, `Post`, `Comment` and `AccessToken`.
pub fn store() -> InMemoryStore {
    InMemoryStore::new()
        .with_class(
            ClassMetadata::new("User", "id", Arc::new(|| Box::new(User::default()) as Box<dyn Entity>))
                .with_field("email", FieldType::Text)
                .with_field("name", FieldType::Text)
                .with_field("password", FieldType::Text)
                .with_field("roles", FieldType::SimpleArray),
        )
        .with_class(
            ClassMetadata::record("Post", "id")
                .with_field("title", FieldType::Text)
                .with_field("published", FieldType::Boolean)
                .with_field("createdAt", FieldType::DateTime)
                .with_association(AssociationMapping::inverse("comments", "Comment")),
        )
        .with_class(
            ClassMetadata::record("Comment", "id")
                .with_field("body", FieldType::Text)
                .with_association(AssociationMapping::owning("post", "Post")),
        )
        .with_class(
            ClassMetadata::record("AccessToken", "token")
                .with_field("token", FieldType::Text)
                .with_field("expiresAt", FieldType::DateTime),
        )
}

/// A post record with `id` and `title`, for alias tests.
pub fn post(id: i64, title: &str) -> Record {
    Record::new("Post").with("id", id).with("title", title)
}
