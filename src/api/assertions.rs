//! Comparison helpers behind the response assertion steps.

use crate::fixture::hydrate::parse_boolean_literal;
use serde_json::Value;
use thiserror::Error;

/// A failed expectation about the last exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssertionError {
    /// No request has produced a response yet.
    #[error("no response has been received")]
    NoResponse,
    /// The last request carried no JSON body to compare against.
    #[error("no request body is available")]
    NoRequestBody,
    /// The status code differs.
    #[error("expected status {expected}, received {actual}: {body}")]
    Status {
        /// Expected status.
        expected: u16,
        /// Received status.
        actual: u16,
        /// Received body, for debugging.
        body: String,
    },
    /// The body is not JSON.
    #[error("response body is not valid JSON: {body}")]
    InvalidJson {
        /// Received body.
        body: String,
    },
    /// A key or dotted path is absent from the body.
    #[error("response has no field '{path}': {body}")]
    MissingField {
        /// Key or dotted path.
        path: String,
        /// Received body.
        body: String,
    },
    /// A field holds a different value.
    #[error("field '{path}' is {actual}, expected {expected}")]
    Mismatch {
        /// Key or dotted path.
        path: String,
        /// Expected value as text.
        expected: String,
        /// Received value as text.
        actual: String,
    },
    /// A field holds the value it should not.
    #[error("field '{path}' should not be {value}")]
    UnexpectedValue {
        /// Key or dotted path.
        path: String,
        /// Offending value as text.
        value: String,
    },
    /// A field that should be a list is something else.
    #[error("field '{path}' is not a list")]
    NotAList {
        /// Key or dotted path.
        path: String,
    },
    /// A list has the wrong number of entries.
    #[error("field '{path}' has {actual} entries, expected {expected}")]
    Count {
        /// Key or dotted path.
        path: String,
        /// Expected length.
        expected: usize,
        /// Received length.
        actual: usize,
    },
    /// An integer expectation is not an integer.
    #[error("'{value}' is not an integer")]
    NotAnInteger {
        /// Expected value as written.
        value: String,
    },
}

/// Expected-value interpretation for typed field assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `bool` / `boolean`: `"false"` in any case is false, other text is
    /// read as a boolean literal and anything else non-empty is true.
    Boolean,
    /// `string`, and any unrecognised kind.
    String,
    /// `int` / `integer`.
    Integer,
    /// `nullable`: the field must be null.
    Nullable,
}

impl FieldKind {
    /// Interpret a kind name. Unknown names compare as strings.
    #[must_use]
    pub fn parse(kind: &str) -> Self {
        match kind {
            "bool" | "boolean" => Self::Boolean,
            "int" | "integer" => Self::Integer,
            "nullable" => Self::Nullable,
            _ => Self::String,
        }
    }

    /// Build the expected JSON value from its textual form.
    ///
    /// # Errors
    ///
    /// Returns [`AssertionError::NotAnInteger`] for integer kinds whose text
    /// does not parse.
    pub fn expected(self, raw: &str) -> Result<Value, AssertionError> {
        match self {
            Self::Boolean => Ok(Value::Bool(
                !raw.eq_ignore_ascii_case("false")
                    && parse_boolean_literal(&Value::String(raw.to_owned()))
                        .unwrap_or(!raw.is_empty()),
            )),
            Self::String => Ok(Value::String(raw.to_owned())),
            Self::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| AssertionError::NotAnInteger {
                    value: raw.to_owned(),
                }),
            Self::Nullable => Ok(Value::Null),
        }
    }
}

/// Walk a dotted path through objects and arrays.
///
/// Numeric segments index arrays; an empty path selects `value` itself.
#[must_use]
pub fn json_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Text form of a JSON value: strings unquoted, everything else as JSON.
#[must_use]
pub fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Loose scalar equality used by every value assertion.
///
/// Booleans on the actual side are matched against boolean literals, numbers
/// compare numerically, and remaining scalars compare by text, so `"42"`
/// equals `42`. Null only equals null.
#[must_use]
pub fn loose_eq(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        _ if expected == actual => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (_, Value::Bool(flag)) => parse_boolean_literal(expected) == Some(*flag),
        (Value::Number(left), Value::Number(right)) => left.as_f64() == right.as_f64(),
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
            false
        }
        _ => {
            let (left, right) = (render(expected), render(actual));
            left == right
                || matches!(
                    (left.trim().parse::<f64>(), right.trim().parse::<f64>()),
                    (Ok(l), Ok(r)) if (l - r).abs() <= f64::EPSILON
                )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!("42"), json!(42), true)]
    #[case(json!("1.50"), json!(1.5), true)]
    #[case(json!("true"), json!(true), true)]
    #[case(json!("0"), json!(false), true)]
    #[case(json!("yes"), json!(true), false)]
    #[case(json!(null), json!(""), false)]
    #[case(json!(null), json!(null), true)]
    #[case(json!("abc"), json!("abc"), true)]
    #[case(json!("[]"), json!([]), false)]
    fn loose_equality(#[case] expected: Value, #[case] actual: Value, #[case] equal: bool) {
        assert_eq!(loose_eq(&expected, &actual), equal);
    }

    #[test]
    fn walks_dotted_paths() {
        let body = json!({"data": [{"owner": {"id": 3}}]});
        assert_eq!(json_path(&body, "data.0.owner.id"), Some(&json!(3)));
        assert_eq!(json_path(&body, "data.1"), None);
        assert_eq!(json_path(&body, "data.x"), None);
        assert_eq!(json_path(&body, ""), Some(&body));
    }

    #[rstest]
    #[case("boolean", "FALSE", Ok(json!(false)))]
    #[case("bool", "true", Ok(json!(true)))]
    #[case("bool", "0", Ok(json!(false)))]
    #[case("bool", "anything", Ok(json!(true)))]
    #[case("int", "7", Ok(json!(7)))]
    #[case("integer", "x", Err(AssertionError::NotAnInteger { value: "x".into() }))]
    #[case("nullable", "whatever", Ok(json!(null)))]
    #[case("string", "7", Ok(json!("7")))]
    #[case("date", "2024", Ok(json!("2024")))]
    fn builds_typed_expectations(
        #[case] kind: &str,
        #[case] raw: &str,
        #[case] expected: Result<Value, AssertionError>,
    ) {
        assert_eq!(FieldKind::parse(kind).expected(raw), expected);
    }
}
