//! Domain entity capability model.
//!
//! Step implementations never reach into concrete entity types. Instead every
//! persisted type implements [`Entity`], which exposes named field access in
//! both directions. [`Record`] is a map-backed implementation suitable for
//! types that have no bespoke Rust representation.

use indexmap::IndexMap;
use serde_json::{Number, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Shared handle to a persisted entity.
pub type SharedEntity = Arc<dyn Entity>;

/// Errors raised when reading or writing entity fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    /// The entity type does not declare the requested field.
    #[error("class '{class}' has no field named '{field}'")]
    UnknownField {
        /// Concrete class name.
        class: String,
        /// Requested field.
        field: String,
    },
    /// The supplied value has the wrong shape for the field.
    #[error("field '{field}' of class '{class}' expects {expected}, got '{found}'")]
    TypeMismatch {
        /// Concrete class name.
        class: String,
        /// Field being written.
        field: String,
        /// Human readable description of the accepted type.
        expected: &'static str,
        /// Rendered rejected value.
        found: String,
    },
}

/// Identifies a persisted entity by class and identifier value.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityKey {
    /// Concrete class of the referenced entity.
    pub class: String,
    /// Identifier value of the referenced entity.
    pub id: Box<FieldValue>,
}

impl EntityKey {
    /// Build a key from a class name and identifier value.
    #[must_use]
    pub fn new(class: impl Into<String>, id: FieldValue) -> Self {
        Self {
            class: class.into(),
            id: Box::new(id),
        }
    }
}

/// A single field value held by an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Absent or unset value.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Free text.
    Text(String),
    /// Timestamp with offset.
    DateTime(OffsetDateTime),
    /// Simple list of strings.
    List(Vec<String>),
    /// Arbitrary structured value.
    Json(Value),
    /// Reference to another entity.
    Reference(EntityKey),
}

impl FieldValue {
    /// Returns `true` when the value is [`FieldValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert a JSON value into the closest field value.
    ///
    /// Integral numbers become [`FieldValue::Integer`]; arrays and objects
    /// are kept as [`FieldValue::Json`].
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or_else(|| Self::Text(n.to_string())),
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Json(value.clone()),
        }
    }

    /// Render the value as JSON, as it would appear in a request payload.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::Number((*i).into()),
            Self::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Text(s) => Value::String(s.clone()),
            Self::DateTime(_) => Value::String(self.to_string()),
            Self::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
            Self::Json(v) => v.clone(),
            Self::Reference(key) => key.id.to_json(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::DateTime(dt) => match dt.format(&Rfc3339) {
                Ok(text) => f.write_str(&text),
                Err(_) => write!(f, "{dt}"),
            },
            Self::List(items) => f.write_str(&items.join(",")),
            Self::Json(v) => write!(f, "{v}"),
            Self::Reference(key) => write!(f, "{}", key.id),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Named field access implemented by every persisted domain type.
///
/// Implementations must accept writes to any field their class metadata
/// declares, including the identifier and association fields, even when the
/// public API of the type keeps them read-only.
pub trait Entity: fmt::Debug + Send + Sync {
    /// Concrete class name used for metadata lookup.
    fn class_name(&self) -> &str;

    /// Read a field by name. Returns `None` for undeclared fields.
    fn field(&self, name: &str) -> Option<FieldValue>;

    /// Write a field by name.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError`] when the field is unknown or the value has an
    /// incompatible shape.
    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EntityError>;
}

/// Map-backed entity accepting any field name.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    class: String,
    fields: IndexMap<String, FieldValue>,
}

impl Record {
    /// Create an empty record of the given class.
    #[must_use]
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            fields: IndexMap::new(),
        }
    }

    /// Builder-style field assignment.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Borrow all fields in insertion order.
    #[must_use]
    pub const fn fields(&self) -> &IndexMap<String, FieldValue> {
        &self.fields
    }
}

impl Entity for Record {
    fn class_name(&self) -> &str {
        &self.class
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        self.fields.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EntityError> {
        self.fields.insert(name.to_owned(), value);
        Ok(())
    }
}
