//! Hydration of entities from flat property maps.
//!
//! Values arrive as JSON, usually strings lifted from a step table, and are
//! coerced according to the field types declared in [`ClassMetadata`].
//! Properties that are not declared fields are skipped.

use crate::entity::{Entity, EntityError, FieldValue};
use crate::store::{ClassMetadata, FieldType};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::warn;

/// Field names treated as creation and modification timestamps.
const TIMESTAMP_FIELDS: &[&str] = &["createdAt", "updatedAt", "created_at", "updated_at"];

/// Errors raised while coercing or applying property values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HydrationError {
    /// A boolean field received something that is not a boolean literal.
    #[error("field '{field}' expects a boolean literal (true/false/1/0/t/f), got '{value}'")]
    MalformedBooleanLiteral {
        /// Field being hydrated.
        field: String,
        /// Rendered rejected value.
        value: String,
    },
    /// A timestamp field received an unparseable value.
    #[error("field '{field}' expects a date or date-time, got '{value}'")]
    MalformedDateTime {
        /// Field being hydrated.
        field: String,
        /// Rendered rejected value.
        value: String,
    },
    /// A numeric field received a non-numeric value.
    #[error("field '{field}' expects {expected}, got '{value}'")]
    MalformedNumber {
        /// Field being hydrated.
        field: String,
        /// Expected numeric kind.
        expected: &'static str,
        /// Rendered rejected value.
        value: String,
    },
    /// A list field received a value that is neither text nor an array.
    #[error("field '{field}' expects a comma separated list, got '{value}'")]
    MalformedList {
        /// Field being hydrated.
        field: String,
        /// Rendered rejected value.
        value: String,
    },
    /// The entity rejected the coerced value.
    #[error(transparent)]
    Entity(#[from] EntityError),
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Interpret `value` as a boolean.
///
/// Booleans pass through, numbers and numeric strings are true when
/// non-zero, and the literals `t`/`true`/`f`/`false` are recognised.
#[must_use]
pub fn parse_boolean_literal(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|x| x != 0.0),
        Value::String(s) => match s.as_str() {
            "t" | "true" => Some(true),
            "f" | "false" => Some(false),
            other => other.trim().parse::<f64>().ok().map(|x| x != 0.0),
        },
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Parse a timestamp. Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC),
/// `YYYY-MM-DD` (midnight UTC) and `now`.
#[must_use]
pub fn parse_datetime(text: &str) -> Option<OffsetDateTime> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("now") {
        return Some(OffsetDateTime::now_utc());
    }
    let spaced = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let date_only = format_description!("[year]-[month]-[day]");
    OffsetDateTime::parse(text, &Rfc3339)
        .ok()
        .or_else(|| {
            PrimitiveDateTime::parse(text, spaced)
                .ok()
                .map(PrimitiveDateTime::assume_utc)
        })
        .or_else(|| {
            Date::parse(text, date_only)
                .ok()
                .map(|date| date.midnight().assume_utc())
        })
}

/// Coerce one JSON value into a field value of type `field_type`.
///
/// # Errors
///
/// Returns [`HydrationError`] when the value cannot represent the type.
pub fn coerce(field: &str, field_type: FieldType, value: &Value) -> Result<FieldValue, HydrationError> {
    if value.is_null() {
        return Ok(FieldValue::Null);
    }
    match field_type {
        FieldType::Boolean => parse_boolean_literal(value).map(FieldValue::Bool).ok_or_else(|| {
            HydrationError::MalformedBooleanLiteral {
                field: field.to_owned(),
                value: render(value),
            }
        }),
        FieldType::DateTime => value
            .as_str()
            .and_then(parse_datetime)
            .map(FieldValue::DateTime)
            .ok_or_else(|| HydrationError::MalformedDateTime {
                field: field.to_owned(),
                value: render(value),
            }),
        FieldType::SimpleArray => match value {
            Value::String(s) => Ok(FieldValue::List(s.split(',').map(str::to_owned).collect())),
            Value::Array(items) => Ok(FieldValue::List(items.iter().map(render).collect())),
            other => Err(HydrationError::MalformedList {
                field: field.to_owned(),
                value: render(other),
            }),
        },
        FieldType::Integer => value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .map(FieldValue::Integer)
            .ok_or_else(|| HydrationError::MalformedNumber {
                field: field.to_owned(),
                expected: "an integer",
                value: render(value),
            }),
        FieldType::Float => value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .map(FieldValue::Float)
            .ok_or_else(|| HydrationError::MalformedNumber {
                field: field.to_owned(),
                expected: "a number",
                value: render(value),
            }),
        FieldType::Text => Ok(FieldValue::Text(render(value))),
        FieldType::Json => Ok(FieldValue::Json(value.clone())),
    }
}

/// Coerce every declared property, in property order.
///
/// # Errors
///
/// Returns the first [`HydrationError`] encountered.
pub fn coerce_properties(
    metadata: &ClassMetadata,
    properties: &Map<String, Value>,
) -> Result<Vec<(String, FieldValue)>, HydrationError> {
    let mut coerced = Vec::with_capacity(properties.len());
    for (key, value) in properties {
        let Some(field_type) = metadata.field_type(key) else {
            warn!(class = metadata.name(), property = %key, "ignoring undeclared property");
            continue;
        };
        coerced.push((key.clone(), coerce(key, field_type, value)?));
    }
    Ok(coerced)
}

/// Strategy applying a property map to an entity.
pub trait Hydrator: fmt::Debug + Send + Sync {
    /// Write `properties` onto `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`HydrationError`] when coercion or the write fails.
    fn hydrate(
        &self,
        metadata: &ClassMetadata,
        properties: &Map<String, Value>,
        entity: &mut dyn Entity,
    ) -> Result<(), HydrationError>;
}

/// Default hydrator writing each coerced declared field directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldHydrator;

impl Hydrator for FieldHydrator {
    fn hydrate(
        &self,
        metadata: &ClassMetadata,
        properties: &Map<String, Value>,
        entity: &mut dyn Entity,
    ) -> Result<(), HydrationError> {
        for (field, value) in coerce_properties(metadata, properties)? {
            entity.set_field(&field, value)?;
        }
        Ok(())
    }
}

/// Named custom hydrators selectable from fixture configuration.
#[derive(Debug, Default, Clone)]
pub struct HydratorRegistry {
    hydrators: HashMap<String, Arc<dyn Hydrator>>,
}

impl HydratorRegistry {
    /// Registry with no custom hydrators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hydrator` under `name`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, hydrator: Arc<dyn Hydrator>) -> Self {
        self.hydrators.insert(name.into(), hydrator);
        self
    }

    /// Look up a custom hydrator.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Hydrator>> {
        self.hydrators.get(name).cloned()
    }
}

/// Set declared timestamp fields that are still empty to `now`.
///
/// # Errors
///
/// Returns [`HydrationError::Entity`] when the entity rejects the write.
pub fn ensure_timestamps(
    metadata: &ClassMetadata,
    entity: &mut dyn Entity,
    now: OffsetDateTime,
) -> Result<(), HydrationError> {
    for field in TIMESTAMP_FIELDS {
        if metadata.field_type(field) != Some(FieldType::DateTime) {
            continue;
        }
        if entity.field(field).is_none_or(|value| value.is_null()) {
            entity.set_field(field, FieldValue::DateTime(now))?;
        }
    }
    Ok(())
}
