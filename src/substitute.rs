//! Alias substitution inside request payloads, URLs and expected values.
//!
//! A string is split on `%`. Segments at odd positions are alias references
//! unless they are the final segment, so `"%user1%"` yields one reference
//! while `"50%"` or `"a%b"` stay literal. Segments are rejoined without the
//! delimiters that enclosed a reference. A reference may carry a field
//! selector after `:` (`%user1:email%`); without one the entity's identifier
//! is used.
//!
//! ```rust
//! use rest_steps::substitute::{Segment, tokenize};
//!
//! let segments = tokenize("/users/%owner:id%/posts");
//! assert_eq!(segments.len(), 3);
//! assert!(matches!(segments[1], Segment::Alias(_)));
//! ```

use crate::alias::{AliasError, AliasRegistry};
use crate::entity::FieldValue;
use crate::store::{EntityStore, StoreError};
use serde_json::Value;
use thiserror::Error;

const DELIMITER: char = '%';
const FIELD_SEPARATOR: char = ':';

/// Errors raised while substituting aliases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstitutionError {
    /// The referenced alias is not registered.
    #[error(transparent)]
    Alias(#[from] AliasError),
    /// Metadata for the aliased entity could not be loaded.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The aliased entity has no such field.
    #[error("alias '{alias}' has no field '{field}'")]
    UnknownField {
        /// Alias being resolved.
        alias: String,
        /// Selected field.
        field: String,
    },
}

/// Alias reference parsed from a `%...%` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasToken<'a> {
    /// Alias name.
    pub alias: &'a str,
    /// Explicit field selector, if any.
    pub field: Option<&'a str>,
}

impl<'a> AliasToken<'a> {
    /// Parse `alias[:field]`. An empty selector counts as absent, and
    /// anything after a second `:` is ignored.
    #[must_use]
    pub fn parse(segment: &'a str) -> Self {
        let mut pieces = segment.split(FIELD_SEPARATOR);
        let alias = pieces.next().unwrap_or(segment);
        let field = pieces.next().filter(|field| !field.is_empty());
        Self { alias, field }
    }
}

/// One piece of a tokenised string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Text copied verbatim.
    Literal(&'a str),
    /// Reference to substitute.
    Alias(AliasToken<'a>),
}

/// Split `input` into literal and alias segments.
///
/// Every delimiter is dropped. An unterminated trailing reference becomes
/// plain text, so `"id=%user1"` reassembles as `"id=user1"`.
#[must_use]
pub fn tokenize(input: &str) -> Vec<Segment<'_>> {
    let parts: Vec<&str> = input.split(DELIMITER).collect();
    let last = parts.len().saturating_sub(1);
    parts
        .into_iter()
        .enumerate()
        .map(|(index, part)| {
            if index % 2 == 0 || index == last {
                Segment::Literal(part)
            } else {
                Segment::Alias(AliasToken::parse(part))
            }
        })
        .collect()
}

/// Resolves alias references against a registry and store metadata.
#[derive(Clone, Copy)]
pub struct AliasSubstituter<'a> {
    aliases: &'a AliasRegistry,
    store: &'a dyn EntityStore,
}

impl<'a> AliasSubstituter<'a> {
    /// Create a substituter borrowing the scenario's registry and store.
    #[must_use]
    pub fn new(aliases: &'a AliasRegistry, store: &'a dyn EntityStore) -> Self {
        Self { aliases, store }
    }

    /// Substitute aliases anywhere inside `value`, preserving its shape.
    ///
    /// # Errors
    ///
    /// Returns [`SubstitutionError`] when a reference cannot be resolved.
    pub fn substitute(&self, value: &Value) -> Result<Value, SubstitutionError> {
        match value {
            Value::Object(map) => map
                .iter()
                .map(|(key, item)| Ok((key.clone(), self.substitute(item)?)))
                .collect::<Result<_, SubstitutionError>>()
                .map(Value::Object),
            Value::Array(items) => items
                .iter()
                .map(|item| self.substitute(item))
                .collect::<Result<_, SubstitutionError>>()
                .map(Value::Array),
            Value::String(text) => self.substitute_str(text),
            other => Ok(other.clone()),
        }
    }

    /// Substitute aliases in a single string.
    ///
    /// A string consisting of exactly one reference yields the field's typed
    /// JSON value; otherwise the result is text.
    ///
    /// # Errors
    ///
    /// Returns [`SubstitutionError`] when a reference cannot be resolved.
    pub fn substitute_str(&self, input: &str) -> Result<Value, SubstitutionError> {
        let segments = tokenize(input);
        if let [Segment::Literal(""), Segment::Alias(token), Segment::Literal("")] =
            segments.as_slice()
        {
            return Ok(self.resolve(token)?.to_json());
        }
        if segments.len() == 1 {
            return Ok(Value::String(input.to_owned()));
        }
        Ok(Value::String(self.join(&segments)?))
    }

    /// Substitute aliases in a string and always return text.
    ///
    /// # Errors
    ///
    /// Returns [`SubstitutionError`] when a reference cannot be resolved.
    pub fn substitute_to_string(&self, input: &str) -> Result<String, SubstitutionError> {
        self.join(&tokenize(input))
    }

    /// Resolve a single reference to the selected field value.
    ///
    /// # Errors
    ///
    /// Returns [`SubstitutionError`] when the alias, its metadata or the
    /// field is missing.
    pub fn resolve(&self, token: &AliasToken<'_>) -> Result<FieldValue, SubstitutionError> {
        let entity = self.aliases.resolve(token.alias)?;
        let field = match token.field {
            Some(field) => field.to_owned(),
            None => self
                .store
                .metadata(entity.class_name())?
                .identifier()
                .to_owned(),
        };
        entity
            .field(&field)
            .ok_or_else(|| SubstitutionError::UnknownField {
                alias: token.alias.to_owned(),
                field,
            })
    }

    /// Identifier of the entity registered under `alias`, as text.
    ///
    /// # Errors
    ///
    /// Returns [`SubstitutionError`] when the alias or its identifier is
    /// missing.
    pub fn identifier(&self, alias: &str) -> Result<String, SubstitutionError> {
        self.resolve(&AliasToken { alias, field: None })
            .map(|value| value.to_string())
    }

    fn join(&self, segments: &[Segment<'_>]) -> Result<String, SubstitutionError> {
        segments.iter().try_fold(String::new(), |mut out, segment| {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Alias(token) => out.push_str(&self.resolve(token)?.to_string()),
            }
            Ok(out)
        })
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "substitution tests fail fast on setup errors")]
mod tests {
    use super::*;
    use crate::entity::Record;
    use crate::store::{ClassMetadata, FieldType, InMemoryStore};
    use rstest::{fixture, rstest};
    use serde_json::json;

    struct Harness {
        aliases: AliasRegistry,
        store: InMemoryStore,
    }

    impl Harness {
        fn substituter(&self) -> AliasSubstituter<'_> {
            AliasSubstituter::new(&self.aliases, &self.store)
        }
    }

    #[fixture]
    fn harness() -> Harness {
        let mut store = InMemoryStore::new().with_class(
            ClassMetadata::record("User", "id").with_field("email", FieldType::Text),
        );
        let user = store
            .persist(Box::new(
                Record::new("User").with("id", 42).with("email", "a@b.com"),
            ))
            .expect("persist user");
        let mut aliases = AliasRegistry::new();
        aliases.register("user1", user);
        Harness { aliases, store }
    }

    #[rstest]
    #[case("hello world")]
    #[case("")]
    fn literals_are_unchanged(harness: Harness, #[case] input: &str) {
        let result = harness.substituter().substitute(&json!(input));
        assert_eq!(result, Ok(json!(input)));
    }

    #[rstest]
    #[case("id=%user1", "id=user1")]
    #[case("50%", "50")]
    #[case("a%user1%c%d", "a42cd")]
    fn delimiters_are_dropped_from_unterminated_tails(
        harness: Harness,
        #[case] input: &str,
        #[case] expected: &str,
    ) {
        let result = harness.substituter().substitute_to_string(input);
        assert_eq!(result, Ok(expected.to_owned()));
    }

    #[rstest]
    fn nested_structures_are_resolved(harness: Harness) {
        let input = json!({
            "owner": "%user1%",
            "contact": "%user1:email%",
            "tags": ["x", "%user1%"],
            "count": 3
        });
        let result = harness.substituter().substitute(&input);
        assert_eq!(
            result,
            Ok(json!({
                "owner": 42,
                "contact": "a@b.com",
                "tags": ["x", 42],
                "count": 3
            }))
        );
    }

    #[rstest]
    fn mixed_text_is_joined(harness: Harness) {
        let result = harness.substituter().substitute_str("/users/%user1%/mail/%user1:email%");
        assert_eq!(result, Ok(json!("/users/42/mail/a@b.com")));
    }

    #[rstest]
    fn extra_selector_parts_are_ignored(harness: Harness) {
        let result = harness.substituter().substitute_str("%user1:email:lower%");
        assert_eq!(result, Ok(json!("a@b.com")));
    }

    #[test]
    fn token_takes_only_the_first_selector() {
        assert_eq!(
            AliasToken::parse("a:b:c"),
            AliasToken {
                alias: "a",
                field: Some("b")
            }
        );
    }

    #[rstest]
    fn empty_selector_uses_identifier(harness: Harness) {
        let result = harness.substituter().substitute_str("%user1:%");
        assert_eq!(result, Ok(json!(42)));
    }

    #[rstest]
    fn unknown_alias_fails(harness: Harness) {
        let result = harness.substituter().substitute(&json!("%missing%"));
        assert_eq!(
            result,
            Err(SubstitutionError::Alias(AliasError::NotFound {
                alias: "missing".into()
            }))
        );
    }

    #[rstest]
    fn unknown_field_fails(harness: Harness) {
        let result = harness.substituter().substitute_str("%user1:phone%");
        assert!(matches!(
            result,
            Err(SubstitutionError::UnknownField { ref field, .. }) if field == "phone"
        ));
    }

    #[test]
    fn tokenize_marks_odd_segments() {
        assert_eq!(
            tokenize("a%b%c%d"),
            vec![
                Segment::Literal("a"),
                Segment::Alias(AliasToken {
                    alias: "b",
                    field: None
                }),
                Segment::Literal("c"),
                Segment::Literal("d"),
            ]
        );
    }

    #[test]
    fn entity_class_is_visible_through_registry() {
        let mut aliases = AliasRegistry::new();
        aliases.register("p", std::sync::Arc::new(Record::new("Post")));
        let class = aliases.resolve("p").map(|e| e.class_name().to_owned());
        assert_eq!(class, Ok("Post".to_owned()));
    }
}
