//! HTTP API steps: sending requests and asserting on responses.
//!
//! [`ApiSteps`] borrows the scenario's client together with the fixture
//! catalogue and alias registry. Request steps substitute aliases in URLs,
//! identifiers, table values and JSON bodies before dispatching; response
//! steps read the captured [`PendingRequestState`](crate::http::PendingRequestState).

mod assertions;
mod requests;
mod responses;

pub use assertions::{AssertionError, FieldKind, json_path, loose_eq, render};

use crate::alias::AliasRegistry;
use crate::error::StepError;
use crate::fixture::FixtureConfig;
use crate::http::ApiClient;
use crate::route::resource_uri;
use crate::store::EntityStore;
use crate::substitute::AliasSubstituter;
use crate::table::{key_values, merge};
use serde_json::{Map, Value};
use url::form_urlencoded;

/// Borrowing facade for API request and response steps.
pub struct ApiSteps<'a> {
    client: &'a mut ApiClient,
    catalog: &'a FixtureConfig,
    aliases: &'a AliasRegistry,
    store: &'a dyn EntityStore,
}

impl<'a> ApiSteps<'a> {
    /// Wrap the scenario's client and lookup state.
    #[must_use]
    pub fn new(
        client: &'a mut ApiClient,
        catalog: &'a FixtureConfig,
        aliases: &'a AliasRegistry,
        store: &'a dyn EntityStore,
    ) -> Self {
        Self {
            client,
            catalog,
            aliases,
            store,
        }
    }

    /// The underlying client.
    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &*self.client
    }

    /// Set a header sent with every later request.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.client.set_header(name, value);
    }

    /// Stop sending a header.
    pub fn remove_header(&mut self, name: &str) {
        self.client.remove_header(name);
    }

    /// Drop every header set during the scenario.
    pub fn reset_headers(&mut self) {
        self.client.reset_headers();
    }

    fn substituter(&self) -> AliasSubstituter<'a> {
        AliasSubstituter::new(self.aliases, self.store)
    }

    fn substitute_map(&self, values: &Map<String, Value>) -> Result<Map<String, Value>, StepError> {
        let substituter = self.substituter();
        values
            .iter()
            .map(|(key, value)| Ok((key.clone(), substituter.substitute(value)?)))
            .collect()
    }

    /// Table rows as a substituted property map.
    fn table_values(&self, rows: &[Vec<String>]) -> Result<Map<String, Value>, StepError> {
        self.substitute_map(&key_values(rows)?)
    }

    /// Doc string as a substituted property map.
    fn json_values(&self, document: &str) -> Result<Map<String, Value>, StepError> {
        self.substitute_map(&StepError::parse_object(document)?)
    }

    /// Default properties of `entity_type` overlaid by `values`.
    fn with_defaults(
        &self,
        entity_type: &str,
        values: &Map<String, Value>,
    ) -> Result<Map<String, Value>, StepError> {
        let defaults = self.catalog.default_properties(entity_type)?;
        Ok(merge(defaults, values))
    }

    fn alias_id(&self, alias: &str) -> Result<String, StepError> {
        Ok(self.substituter().identifier(alias)?)
    }

    fn uri(
        &self,
        entity_type: &str,
        id: Option<&str>,
        sub_type: Option<&str>,
        sub_id: Option<&str>,
    ) -> Result<String, StepError> {
        let substituter = self.substituter();
        let id = id.map(|id| substituter.substitute_to_string(id)).transpose()?;
        let sub_id = sub_id
            .map(|id| substituter.substitute_to_string(id))
            .transpose()?;
        Ok(resource_uri(
            self.catalog,
            entity_type,
            id.as_deref(),
            sub_type,
            sub_id.as_deref(),
        )?)
    }

    /// Decode a query string, substituting aliases in the values.
    fn query(&self, query: &str) -> Result<Vec<(String, String)>, StepError> {
        let substituter = self.substituter();
        form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .map(|(key, value)| Ok((key.into_owned(), substituter.substitute_to_string(&value)?)))
            .collect()
    }
}
