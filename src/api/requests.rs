//! Request steps.
//!
//! Generic steps take a verb name and a URL; REST shorthands build the URL
//! from logical types. "Add" and "update" steps send the type's default
//! properties overlaid by the supplied values, "partially update" sends the
//! supplied values alone.

use super::ApiSteps;
use crate::error::StepError;
use crate::http::{Verb, split_query};
use serde_json::{Map, Value};

impl ApiSteps<'_> {
    /// Substitute aliases in the path of `url` and in its decoded query
    /// values. The raw query is never tokenized, so percent escapes survive.
    fn resolve_url(&self, url: &str) -> Result<(String, Vec<(String, String)>), StepError> {
        let substituter = self.substituter();
        let (path, query) = split_query(url);
        let path = substituter.substitute_to_string(path)?;
        let query = query
            .into_iter()
            .map(|(key, value)| Ok((key, substituter.substitute_to_string(&value)?)))
            .collect::<Result<Vec<_>, StepError>>()?;
        Ok((path, query))
    }

    fn send_to(&mut self, verb: &str, url: &str, body: Option<Value>) -> Result<(), StepError> {
        let (path, query) = self.resolve_url(url)?;
        self.client.dispatch_named(verb, &path, body, query)?;
        Ok(())
    }

    /// When I send a `<VERB>` to `<url>`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] for unknown verbs or aliases, or when no
    /// response arrives.
    pub fn send(&mut self, verb: &str, url: &str) -> Result<(), StepError> {
        self.send_to(verb, url, None)
    }

    /// When I send a `<VERB>` to `<url>` with json.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::InvalidJson`] when the document is not an
    /// object, or see [`ApiSteps::send`].
    pub fn send_json(&mut self, verb: &str, url: &str, document: &str) -> Result<(), StepError> {
        let body = self.json_values(document)?;
        self.send_to(verb, url, Some(Value::Object(body)))
    }

    /// When I send a `<VERB>` to `<url>` with json values.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Table`] for malformed rows, or see
    /// [`ApiSteps::send`].
    pub fn send_values(
        &mut self,
        verb: &str,
        url: &str,
        rows: &[Vec<String>],
    ) -> Result<(), StepError> {
        let body = self.table_values(rows)?;
        self.send_to(verb, url, Some(Value::Object(body)))
    }

    /// When I send a POST to `<url>` with form-data values.
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] for malformed rows, unknown aliases or when no
    /// response arrives.
    pub fn send_form(&mut self, url: &str, rows: &[Vec<String>]) -> Result<(), StepError> {
        let substituter = self.substituter();
        let url = match url.split_once('?') {
            Some((path, query)) => format!("{}?{query}", substituter.substitute_to_string(path)?),
            None => substituter.substitute_to_string(url)?,
        };
        let form = crate::table::key_values(rows)?
            .iter()
            .map(|(key, value)| {
                let text = super::render(value);
                Ok((key.clone(), substituter.substitute_to_string(&text)?))
            })
            .collect::<Result<Vec<_>, StepError>>()?;
        self.client.post_form(&url, form)?;
        Ok(())
    }

    /// When I retrieve all `<type>` [with `<query>`].
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] when the type is not configured, an alias is
    /// unknown or no response arrives.
    pub fn retrieve_all(&mut self, entity_type: &str, query: Option<&str>) -> Result<(), StepError> {
        let uri = self.uri(entity_type, None, None, None)?;
        self.get(&uri, query)
    }

    /// When I retrieve all `<type>` from `<parentType>` with id `<id>` [and
    /// query string `<query>`].
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::retrieve_all`].
    pub fn retrieve_all_from(
        &mut self,
        entity_type: &str,
        parent_type: &str,
        parent_id: &str,
        query: Option<&str>,
    ) -> Result<(), StepError> {
        let uri = self.uri(parent_type, Some(parent_id), Some(entity_type), None)?;
        self.get(&uri, query)
    }

    /// When I retrieve all `<type>` from `<parentType>` with alias `<alias>`
    /// [and query string `<query>`].
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::retrieve_all`].
    pub fn retrieve_all_from_alias(
        &mut self,
        entity_type: &str,
        parent_type: &str,
        alias: &str,
        query: Option<&str>,
    ) -> Result<(), StepError> {
        let id = self.alias_id(alias)?;
        self.retrieve_all_from(entity_type, parent_type, &id, query)
    }

    /// When I retrieve `<type>` with id `<id>` [and the query string
    /// `<query>`].
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::retrieve_all`].
    pub fn retrieve(
        &mut self,
        entity_type: &str,
        id: &str,
        query: Option<&str>,
    ) -> Result<(), StepError> {
        let uri = self.uri(entity_type, Some(id), None, None)?;
        self.get(&uri, query)
    }

    /// When I retrieve `<type>` with alias `<alias>` [and the query string
    /// `<query>`].
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::retrieve_all`].
    pub fn retrieve_alias(
        &mut self,
        entity_type: &str,
        alias: &str,
        query: Option<&str>,
    ) -> Result<(), StepError> {
        let id = self.alias_id(alias)?;
        self.retrieve(entity_type, &id, query)
    }

    /// When I add a new `<type>` [with values].
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] when the type has no defaults, a row is
    /// malformed or no response arrives.
    pub fn add(&mut self, entity_type: &str, rows: &[Vec<String>]) -> Result<(), StepError> {
        let values = self.table_values(rows)?;
        self.add_values(entity_type, &values)
    }

    /// When I add a new `<type>` with a JSON document.
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::add`].
    pub fn add_json(&mut self, entity_type: &str, document: &str) -> Result<(), StepError> {
        let values = self.json_values(document)?;
        self.add_values(entity_type, &values)
    }

    fn add_values(
        &mut self,
        entity_type: &str,
        values: &Map<String, Value>,
    ) -> Result<(), StepError> {
        let uri = self.uri(entity_type, None, None, None)?;
        let body = self.with_defaults(entity_type, values)?;
        self.client.post(&uri, Value::Object(body), Vec::new())?;
        Ok(())
    }

    /// When I add a new `<type>` to `<parentType>` with id `<id>` [and the
    /// values].
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::add`].
    pub fn add_to(
        &mut self,
        entity_type: &str,
        parent_type: &str,
        parent_id: &str,
        rows: &[Vec<String>],
    ) -> Result<(), StepError> {
        let uri = self.uri(parent_type, Some(parent_id), Some(entity_type), None)?;
        let values = self.table_values(rows)?;
        let body = self.with_defaults(entity_type, &values)?;
        self.client.post(&uri, Value::Object(body), Vec::new())?;
        Ok(())
    }

    /// When I add a new `<type>` to `<parentType>` with alias `<alias>` [and
    /// values].
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::add`].
    pub fn add_to_alias(
        &mut self,
        entity_type: &str,
        parent_type: &str,
        alias: &str,
        rows: &[Vec<String>],
    ) -> Result<(), StepError> {
        let id = self.alias_id(alias)?;
        self.add_to(entity_type, parent_type, &id, rows)
    }

    /// When I update a `<type>` with id `<id>` and the values.
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::add`].
    pub fn update(
        &mut self,
        entity_type: &str,
        id: &str,
        rows: &[Vec<String>],
    ) -> Result<(), StepError> {
        let values = self.table_values(rows)?;
        self.put_values(entity_type, id, &values)
    }

    /// When I update a `<type>` with alias `<alias>` and the values.
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::add`].
    pub fn update_alias(
        &mut self,
        entity_type: &str,
        alias: &str,
        rows: &[Vec<String>],
    ) -> Result<(), StepError> {
        let id = self.alias_id(alias)?;
        self.update(entity_type, &id, rows)
    }

    /// When I update a `<type>` with id `<id>` with a JSON document.
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::add`].
    pub fn update_json(
        &mut self,
        entity_type: &str,
        id: &str,
        document: &str,
    ) -> Result<(), StepError> {
        let values = self.json_values(document)?;
        self.put_values(entity_type, id, &values)
    }

    /// When I update a `<type>` with alias `<alias>` with a JSON document.
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::add`].
    pub fn update_alias_json(
        &mut self,
        entity_type: &str,
        alias: &str,
        document: &str,
    ) -> Result<(), StepError> {
        let id = self.alias_id(alias)?;
        self.update_json(entity_type, &id, document)
    }

    fn put_values(
        &mut self,
        entity_type: &str,
        id: &str,
        values: &Map<String, Value>,
    ) -> Result<(), StepError> {
        let uri = self.uri(entity_type, Some(id), None, None)?;
        let body = self.with_defaults(entity_type, values)?;
        self.client.put(&uri, Value::Object(body))?;
        Ok(())
    }

    /// When I update a `<type>` with id `<id>` from relation `<parentType>`
    /// with id `<parentId>` with values.
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::add`].
    pub fn update_in_relation(
        &mut self,
        entity_type: &str,
        id: &str,
        parent_type: &str,
        parent_id: &str,
        rows: &[Vec<String>],
    ) -> Result<(), StepError> {
        let uri = self.uri(parent_type, Some(parent_id), Some(entity_type), Some(id))?;
        let values = self.table_values(rows)?;
        let body = self.with_defaults(entity_type, &values)?;
        self.client.put(&uri, Value::Object(body))?;
        Ok(())
    }

    /// When I partially update a `<type>` with id `<id>` and the values.
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] for unknown types or aliases, malformed rows or
    /// when no response arrives.
    pub fn partially_update(
        &mut self,
        entity_type: &str,
        id: &str,
        rows: &[Vec<String>],
    ) -> Result<(), StepError> {
        let uri = self.uri(entity_type, Some(id), None, None)?;
        let body = self.table_values(rows)?;
        self.client.patch(&uri, Value::Object(body))?;
        Ok(())
    }

    /// When I partially update a `<type>` with alias `<alias>` and the
    /// values.
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::partially_update`].
    pub fn partially_update_alias(
        &mut self,
        entity_type: &str,
        alias: &str,
        rows: &[Vec<String>],
    ) -> Result<(), StepError> {
        let id = self.alias_id(alias)?;
        self.partially_update(entity_type, &id, rows)
    }

    /// When I delete a `<type>` with id `<id>`.
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::retrieve_all`].
    pub fn delete(&mut self, entity_type: &str, id: &str) -> Result<(), StepError> {
        let uri = self.uri(entity_type, Some(id), None, None)?;
        self.client.delete(&uri)?;
        Ok(())
    }

    /// When I delete a `<type>` with alias `<alias>`.
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::retrieve_all`].
    pub fn delete_alias(&mut self, entity_type: &str, alias: &str) -> Result<(), StepError> {
        let id = self.alias_id(alias)?;
        self.delete(entity_type, &id)
    }

    /// When I remove a `<type>` with id `<id>` from relation `<parentType>`
    /// with id `<parentId>`.
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::retrieve_all`].
    pub fn remove_from_relation(
        &mut self,
        entity_type: &str,
        id: &str,
        parent_type: &str,
        parent_id: &str,
    ) -> Result<(), StepError> {
        let uri = self.uri(parent_type, Some(parent_id), Some(entity_type), Some(id))?;
        self.client.delete(&uri)?;
        Ok(())
    }

    /// When I send a `<action>` action with method `<method>` [and values].
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Dispatch`] for methods that are not HTTP verbs,
    /// before anything is sent.
    pub fn rpc(&mut self, action: &str, method: &str, rows: &[Vec<String>]) -> Result<(), StepError> {
        let body = self.table_values(rows)?;
        self.send_rpc(&format!("/{action}"), method, body)
    }

    /// When I send a `<action>` action with method `<method>` and body.
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::rpc`].
    pub fn rpc_json(&mut self, action: &str, method: &str, document: &str) -> Result<(), StepError> {
        let body = self.json_values(document)?;
        self.send_rpc(&format!("/{action}"), method, body)
    }

    /// When I send a `<action>` action to resource `<type>` with id `<id>`
    /// and method `<method>` [with values].
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::rpc`].
    pub fn rpc_on(
        &mut self,
        action: &str,
        entity_type: &str,
        id: &str,
        method: &str,
        rows: &[Vec<String>],
    ) -> Result<(), StepError> {
        let uri = self.uri(entity_type, Some(id), None, None)?;
        let body = self.table_values(rows)?;
        self.send_rpc(&format!("{uri}/{action}"), method, body)
    }

    /// When I send a `<action>` action to resource `<type>` with id `<id>`
    /// and method `<method>` with a JSON document, merged over the type's
    /// default properties.
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::rpc`].
    pub fn rpc_on_json(
        &mut self,
        action: &str,
        entity_type: &str,
        id: &str,
        method: &str,
        document: &str,
    ) -> Result<(), StepError> {
        let uri = self.uri(entity_type, Some(id), None, None)?;
        let values = self.json_values(document)?;
        let body = self.with_defaults(entity_type, &values)?;
        self.send_rpc(&format!("{uri}/{action}"), method, body)
    }

    /// When I send a `<action>` action to resource `<type>` with alias
    /// `<alias>` and method `<method>` [with values].
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::rpc`].
    pub fn rpc_on_alias(
        &mut self,
        action: &str,
        entity_type: &str,
        alias: &str,
        method: &str,
        rows: &[Vec<String>],
    ) -> Result<(), StepError> {
        let id = self.alias_id(alias)?;
        self.rpc_on(action, entity_type, &id, method, rows)
    }

    /// When I send a `<action>` action to resource `<type>` with alias
    /// `<alias>` and method `<method>` with a JSON document.
    ///
    /// # Errors
    ///
    /// See [`ApiSteps::rpc`].
    pub fn rpc_on_alias_json(
        &mut self,
        action: &str,
        entity_type: &str,
        alias: &str,
        method: &str,
        document: &str,
    ) -> Result<(), StepError> {
        let id = self.alias_id(alias)?;
        self.rpc_on_json(action, entity_type, &id, method, document)
    }

    fn send_rpc(
        &mut self,
        uri: &str,
        method: &str,
        body: Map<String, Value>,
    ) -> Result<(), StepError> {
        let verb: Verb = method.parse()?;
        let body = (!body.is_empty()).then_some(Value::Object(body));
        self.client.dispatch(verb, uri, body, Vec::new())?;
        Ok(())
    }

    fn get(&mut self, uri: &str, query: Option<&str>) -> Result<(), StepError> {
        let query = query.map(|query| self.query(query)).transpose()?;
        self.client.get(uri, query.unwrap_or_default())?;
        Ok(())
    }
}
