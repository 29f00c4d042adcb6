//! Response assertion steps.
//!
//! Every failure message carries the received status or body so a failing
//! scenario shows what the server actually said.

use super::assertions::{AssertionError, FieldKind, json_path, loose_eq, render};
use super::ApiSteps;
use crate::error::StepError;
use crate::http::HttpResponse;
use crate::table::key_values;
use serde_json::Value;
use tracing::info;

const UNAUTHORIZED: u16 = 401;
const UNPROCESSABLE: u16 = 422;

/// Request keys the server is expected to rewrite or hide.
const UNECHOED_KEYS: [&str; 3] = ["updatedAt", "password", "repeatPassword"];

impl ApiSteps<'_> {
    /// The captured response.
    ///
    /// # Errors
    ///
    /// Returns [`AssertionError::NoResponse`] before the first exchange or
    /// after a transport failure.
    pub fn last_response(&self) -> Result<&HttpResponse, AssertionError> {
        self.client
            .state()
            .response()
            .ok_or(AssertionError::NoResponse)
    }

    fn body_json(&self) -> Result<Value, AssertionError> {
        let response = self.last_response()?;
        response.json().map_err(|_| AssertionError::InvalidJson {
            body: response.body.clone(),
        })
    }

    /// Then I should receive a `<status>`.
    ///
    /// # Errors
    ///
    /// Returns [`AssertionError::Status`] with the received body when the
    /// status differs.
    pub fn should_receive(&self, expected: u16) -> Result<(), StepError> {
        let response = self.last_response()?;
        if response.status == expected {
            return Ok(());
        }
        Err(AssertionError::Status {
            expected,
            actual: response.status,
            body: response.body.clone(),
        }
        .into())
    }

    /// Then I should receive a `<status>` with valid json.
    ///
    /// # Errors
    ///
    /// Returns [`AssertionError`] when the status differs or the body is not
    /// JSON.
    pub fn should_receive_json(&self, expected: u16) -> Result<(), StepError> {
        self.should_receive(expected)?;
        self.body_json()?;
        Ok(())
    }

    /// Then I should receive an unauthorized error.
    ///
    /// # Errors
    ///
    /// Returns [`AssertionError::Status`] unless the status is 401.
    pub fn should_be_unauthorized(&self) -> Result<(), StepError> {
        self.should_receive(UNAUTHORIZED)
    }

    /// Then I should receive a validation error [with count `<n>`].
    ///
    /// The count is the number of entries under `errors`.
    ///
    /// # Errors
    ///
    /// Returns [`AssertionError`] unless the status is 422 and, when a count
    /// is given, `errors` has that many entries.
    pub fn should_receive_validation_error(&self, count: Option<usize>) -> Result<(), StepError> {
        let Some(expected) = count else {
            return self.should_receive(UNPROCESSABLE);
        };
        let body = self.body_json()?;
        self.should_receive(UNPROCESSABLE)?;
        let actual = match body.get("errors") {
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(fields)) => fields.len(),
            Some(_) => {
                return Err(AssertionError::NotAList {
                    path: "errors".into(),
                }
                .into());
            }
            None => return Err(missing("errors", &body).into()),
        };
        ensure_count("errors", expected, actual)
    }

    /// Then I should receive an error with statusCode `<status>` [and
    /// message `<message>`].
    ///
    /// # Errors
    ///
    /// Returns [`AssertionError`] when the status or the body's `message`
    /// differs.
    pub fn should_receive_error(&self, status: u16, message: Option<&str>) -> Result<(), StepError> {
        self.should_receive(status)?;
        let Some(expected) = message.filter(|message| !message.is_empty()) else {
            return Ok(());
        };
        let body = self.body_json()?;
        let actual = body.get("message").ok_or_else(|| missing("message", &body))?;
        ensure_equal("message", &Value::String(expected.to_owned()), actual)
    }

    /// Then the response should match the request properties.
    ///
    /// Every key of the last JSON request body must be echoed with a loosely
    /// equal value, except `updatedAt`, `password` and `repeatPassword`.
    ///
    /// # Errors
    ///
    /// Returns [`AssertionError::NoRequestBody`] when the last request had no
    /// JSON body, or another [`AssertionError`] for the first difference.
    pub fn should_match_request(&self) -> Result<(), StepError> {
        let Some(Value::Object(sent)) = self.client.state().request_body() else {
            return Err(AssertionError::NoRequestBody.into());
        };
        let body = self.body_json()?;
        for (key, expected) in sent {
            if UNECHOED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let actual = body.get(key).ok_or_else(|| missing(key, &body))?;
            ensure_equal(key, expected, actual)?;
        }
        Ok(())
    }

    /// Then it should contain `<n>` records, counted in the `data` list.
    ///
    /// # Errors
    ///
    /// Returns [`AssertionError`] when `data` is missing, not a list or has
    /// another length.
    pub fn should_contain_records(&self, expected: usize) -> Result<(), StepError> {
        let body = self.body_json()?;
        match body.get("data") {
            Some(Value::Array(items)) => ensure_count("data", expected, items.len()),
            Some(_) => Err(AssertionError::NotAList {
                path: "data".into(),
            }
            .into()),
            None => Err(missing("data", &body).into()),
        }
    }

    /// Then it should match the following properties.
    ///
    /// The literal `null` expects JSON null.
    ///
    /// # Errors
    ///
    /// Returns [`AssertionError`] for the first missing or differing key.
    pub fn should_match_properties(&self, rows: &[Vec<String>]) -> Result<(), StepError> {
        let body = self.body_json()?;
        for (key, value) in key_values(rows)? {
            let expected = match value {
                Value::String(text) if text == "null" => Value::Null,
                other => other,
            };
            let actual = body.get(&key).ok_or_else(|| missing(&key, &body))?;
            ensure_equal(&key, &expected, actual)?;
        }
        Ok(())
    }

    /// Then the `<kind>` field `<path>` should [not] be `<value>`.
    ///
    /// `direction` is `be` for equality; anything else asserts inequality.
    /// The expected value is alias-substituted before it is typed.
    ///
    /// # Errors
    ///
    /// Returns [`AssertionError`] when the path is missing or the comparison
    /// fails, or [`StepError::Substitution`] for unknown aliases.
    pub fn field_should(
        &self,
        kind: &str,
        path: &str,
        direction: &str,
        value: &str,
    ) -> Result<(), StepError> {
        let body = self.body_json()?;
        let actual = json_path(&body, path).ok_or_else(|| missing(path, &body))?;
        let raw = self.substituter().substitute_to_string(value)?;
        let expected = FieldKind::parse(kind).expected(&raw)?;
        if direction == "be" {
            return ensure_equal(path, &expected, actual);
        }
        if loose_eq(&expected, actual) {
            return Err(AssertionError::UnexpectedValue {
                path: path.to_owned(),
                value: render(actual),
            }
            .into());
        }
        Ok(())
    }

    /// Then it should dump the last response, logged at info level.
    ///
    /// # Errors
    ///
    /// Returns [`AssertionError::NoResponse`] when nothing was received.
    pub fn dump_response(&self) -> Result<(), StepError> {
        let response = self.last_response()?;
        info!(status = response.status, body = %response.body, "last response");
        Ok(())
    }
}

fn missing(path: &str, body: &Value) -> AssertionError {
    AssertionError::MissingField {
        path: path.to_owned(),
        body: body.to_string(),
    }
}

fn ensure_equal(path: &str, expected: &Value, actual: &Value) -> Result<(), StepError> {
    if loose_eq(expected, actual) {
        return Ok(());
    }
    Err(AssertionError::Mismatch {
        path: path.to_owned(),
        expected: render(expected),
        actual: render(actual),
    }
    .into())
}

fn ensure_count(path: &str, expected: usize, actual: usize) -> Result<(), StepError> {
    if expected == actual {
        return Ok(());
    }
    Err(AssertionError::Count {
        path: path.to_owned(),
        expected,
        actual,
    }
    .into())
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "assertion step tests fail fast on setup errors")]
mod tests {
    use super::*;
    use crate::alias::AliasRegistry;
    use crate::entity::Record;
    use crate::fixture::FixtureConfig;
    use crate::http::{ApiClient, MockHttpTransport};
    use crate::store::{ClassMetadata, EntityStore, InMemoryStore};
    use rstest::rstest;
    use serde_json::json;

    struct Harness {
        client: ApiClient,
        catalog: FixtureConfig,
        aliases: AliasRegistry,
        store: InMemoryStore,
    }

    impl Harness {
        /// Client whose only response is `status` with `body`, already
        /// received for a POST of `sent`.
        fn replying(status: u16, body: &str, sent: Value) -> Self {
            let body = body.to_owned();
            let mut transport = MockHttpTransport::new();
            transport.expect_send().returning(move |_| {
                Ok(HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: body.clone(),
                })
            });
            let mut client = ApiClient::new(Box::new(transport));
            client.post("/things", sent, Vec::new()).expect("post");
            let mut store = InMemoryStore::new().with_class(ClassMetadata::record("User", "id"));
            let user = store
                .persist(Box::new(Record::new("User").with("id", 5)))
                .expect("persist");
            let mut aliases = AliasRegistry::new();
            aliases.register("owner", user);
            Self {
                client,
                catalog: FixtureConfig::new(),
                aliases,
                store,
            }
        }

        fn steps(&mut self) -> ApiSteps<'_> {
            ApiSteps::new(&mut self.client, &self.catalog, &self.aliases, &self.store)
        }
    }

    fn rows(pairs: &[(&str, &str)]) -> Vec<Vec<String>> {
        pairs
            .iter()
            .map(|(key, value)| vec![(*key).to_owned(), (*value).to_owned()])
            .collect()
    }

    #[test]
    fn status_mismatch_reports_body() {
        let mut harness = Harness::replying(500, "boom", json!({}));
        let steps = harness.steps();
        assert!(steps.should_receive(500).is_ok());
        let err = steps.should_be_unauthorized().expect_err("not a 401");
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn validation_error_counts_entries() {
        let mut harness =
            Harness::replying(422, r#"{"errors": {"email": ["taken"], "name": []}}"#, json!({}));
        let steps = harness.steps();
        assert!(steps.should_receive_validation_error(None).is_ok());
        assert!(steps.should_receive_validation_error(Some(2)).is_ok());
        assert!(matches!(
            steps.should_receive_validation_error(Some(1)),
            Err(StepError::Assertion(AssertionError::Count { actual: 2, .. }))
        ));
    }

    #[test]
    fn error_message_is_compared() {
        let mut harness = Harness::replying(403, r#"{"message": "Forbidden"}"#, json!({}));
        let steps = harness.steps();
        assert!(steps.should_receive_error(403, Some("Forbidden")).is_ok());
        assert!(steps.should_receive_error(403, None).is_ok());
        assert!(steps.should_receive_error(403, Some("Nope")).is_err());
    }

    #[test]
    fn request_properties_are_echoed() {
        let sent = json!({"title": "T", "count": "3", "active": "1", "password": "x"});
        let mut harness = Harness::replying(
            201,
            r#"{"id": 1, "title": "T", "count": 3, "active": true}"#,
            sent,
        );
        assert!(harness.steps().should_match_request().is_ok());
    }

    #[test]
    fn request_properties_need_a_body() {
        let mut harness = Harness::replying(200, "{}", json!({}));
        harness.client.get("/things", Vec::new()).expect("get");
        assert!(matches!(
            harness.steps().should_match_request(),
            Err(StepError::Assertion(AssertionError::NoRequestBody))
        ));
    }

    #[test]
    fn counts_data_records() {
        let mut harness = Harness::replying(200, r#"{"data": [1, 2, 3]}"#, json!({}));
        let steps = harness.steps();
        assert!(steps.should_contain_records(3).is_ok());
        assert!(steps.should_contain_records(2).is_err());
    }

    #[test]
    fn following_properties_understand_null() {
        let mut harness =
            Harness::replying(200, r#"{"name": "A", "deletedAt": null, "admin": false}"#, json!({}));
        let table = rows(&[("name", "A"), ("deletedAt", "null"), ("admin", "0")]);
        assert!(harness.steps().should_match_properties(&table).is_ok());
    }

    #[rstest]
    #[case("boolean", "owner.active", "be", "true", true)]
    #[case("bool", "owner.active", "not be", "false", true)]
    #[case("int", "owner.id", "be", "%owner%", true)]
    #[case("string", "owner.name", "be", "Ada", true)]
    #[case("nullable", "owner.deletedAt", "be", "", true)]
    #[case("nullable", "owner.name", "be", "", false)]
    #[case("integer", "owner.id", "not be", "5", false)]
    fn typed_field_assertions(
        #[case] kind: &str,
        #[case] path: &str,
        #[case] direction: &str,
        #[case] value: &str,
        #[case] passes: bool,
    ) {
        let body = r#"{"owner": {"id": 5, "name": "Ada", "active": true, "deletedAt": null}}"#;
        let mut harness = Harness::replying(200, body, json!({}));
        let outcome = harness.steps().field_should(kind, path, direction, value);
        assert_eq!(outcome.is_ok(), passes, "{outcome:?}");
    }

    #[test]
    fn missing_path_fails() {
        let mut harness = Harness::replying(200, "{}", json!({}));
        assert!(matches!(
            harness.steps().field_should("string", "a.b", "be", "x"),
            Err(StepError::Assertion(AssertionError::MissingField { .. }))
        ));
    }
}
