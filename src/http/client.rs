//! Stateful API client recording the last exchange.

use super::{
    DispatchError, HttpRequest, HttpResponse, HttpTransport, MultipartPart, RequestBody, Verb,
};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;
use url::form_urlencoded;

/// The last request body and response seen by an [`ApiClient`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingRequestState {
    request_body: Option<Value>,
    response: Option<HttpResponse>,
}

impl PendingRequestState {
    /// JSON body of the last request; `None` for bodyless and form requests.
    #[must_use]
    pub const fn request_body(&self) -> Option<&Value> {
        self.request_body.as_ref()
    }

    /// Last response, if a request completed.
    #[must_use]
    pub const fn response(&self) -> Option<&HttpResponse> {
        self.response.as_ref()
    }

    /// Status of the last response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|response| response.status)
    }

    /// Raw body of the last response.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.response.as_ref().map(|response| response.body.as_str())
    }
}

/// Split `url` at `?` into a path and decoded query pairs.
#[must_use]
pub fn split_query(url: &str) -> (&str, Vec<(String, String)>) {
    match url.split_once('?') {
        Some((path, query)) => (
            path,
            form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        ),
        None => (url, Vec::new()),
    }
}

/// HTTP client with mutable headers and captured exchange state.
pub struct ApiClient {
    transport: Box<dyn HttpTransport>,
    default_headers: IndexMap<String, String>,
    headers: IndexMap<String, String>,
    state: PendingRequestState,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("default_headers", &self.default_headers)
            .field("headers", &self.headers)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Client sending through `transport`.
    #[must_use]
    pub fn new(transport: Box<dyn HttpTransport>) -> Self {
        Self {
            transport,
            default_headers: IndexMap::new(),
            headers: IndexMap::new(),
            state: PendingRequestState::default(),
        }
    }

    /// Headers sent with every request and kept across
    /// [`ApiClient::reset_headers`].
    #[must_use]
    pub fn with_default_headers(mut self, headers: IndexMap<String, String>) -> Self {
        self.default_headers = headers;
        self
    }

    /// Set a header for subsequent requests.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Stop sending a previously set header.
    pub fn remove_header(&mut self, name: &str) {
        self.headers.shift_remove(name);
    }

    /// Forget every header set since construction.
    pub fn reset_headers(&mut self) {
        self.headers.clear();
    }

    /// Effective headers: defaults overlaid by set headers.
    #[must_use]
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut merged = self.default_headers.clone();
        for (name, value) in &self.headers {
            merged.insert(name.clone(), value.clone());
        }
        merged.into_iter().collect()
    }

    /// Captured state of the last exchange.
    #[must_use]
    pub const fn state(&self) -> &PendingRequestState {
        &self.state
    }

    /// Dispatch by verb name. The name is validated before anything is sent
    /// or recorded.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidVerb`] for unsupported verbs, leaving
    /// the captured state untouched, or [`DispatchError::Transport`] when no
    /// response arrives.
    pub fn dispatch_named(
        &mut self,
        verb: &str,
        uri: &str,
        body: Option<Value>,
        query: Vec<(String, String)>,
    ) -> Result<&HttpResponse, DispatchError> {
        let verb: Verb = verb.parse()?;
        self.dispatch(verb, uri, body, query)
    }

    /// Send one request and capture the outcome.
    ///
    /// Bodied verbs send `body` or `{}`; GET and DELETE send no body and
    /// record none.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Transport`] when no response arrives. The
    /// previous response is cleared in that case.
    pub fn dispatch(
        &mut self,
        verb: Verb,
        uri: &str,
        body: Option<Value>,
        query: Vec<(String, String)>,
    ) -> Result<&HttpResponse, DispatchError> {
        let request_body = verb
            .has_body()
            .then(|| body.unwrap_or_else(|| Value::Object(Map::new())));
        let wire_body = request_body
            .clone()
            .map_or(RequestBody::Empty, RequestBody::Json);
        self.state.request_body = request_body;
        self.send(verb, uri, query, wire_body)
    }

    /// `GET uri` with query parameters.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::dispatch`].
    pub fn get(
        &mut self,
        uri: &str,
        query: Vec<(String, String)>,
    ) -> Result<&HttpResponse, DispatchError> {
        self.dispatch(Verb::Get, uri, None, query)
    }

    /// `POST uri` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::dispatch`].
    pub fn post(
        &mut self,
        uri: &str,
        body: Value,
        query: Vec<(String, String)>,
    ) -> Result<&HttpResponse, DispatchError> {
        self.dispatch(Verb::Post, uri, Some(body), query)
    }

    /// `PUT uri` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::dispatch`].
    pub fn put(&mut self, uri: &str, body: Value) -> Result<&HttpResponse, DispatchError> {
        self.dispatch(Verb::Put, uri, Some(body), Vec::new())
    }

    /// `PATCH uri` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::dispatch`].
    pub fn patch(&mut self, uri: &str, body: Value) -> Result<&HttpResponse, DispatchError> {
        self.dispatch(Verb::Patch, uri, Some(body), Vec::new())
    }

    /// `DELETE uri`.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::dispatch`].
    pub fn delete(&mut self, uri: &str) -> Result<&HttpResponse, DispatchError> {
        self.dispatch(Verb::Delete, uri, None, Vec::new())
    }

    /// `POST uri` with a form-encoded body. No JSON body is recorded.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::dispatch`].
    pub fn post_form(
        &mut self,
        uri: &str,
        form: Vec<(String, String)>,
    ) -> Result<&HttpResponse, DispatchError> {
        self.state.request_body = None;
        self.send(Verb::Post, uri, Vec::new(), RequestBody::Form(form))
    }

    /// `POST uri` with a `multipart/form-data` body and query parameters.
    /// The recorded request body lists each part's name, file name and
    /// contents.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::dispatch`].
    pub fn upload(
        &mut self,
        uri: &str,
        parts: Vec<MultipartPart>,
        query: Vec<(String, String)>,
    ) -> Result<&HttpResponse, DispatchError> {
        self.state.request_body = Some(Value::Array(
            parts.iter().map(MultipartPart::to_json).collect(),
        ));
        self.send(Verb::Post, uri, query, RequestBody::Multipart(parts))
    }

    fn send(
        &mut self,
        verb: Verb,
        uri: &str,
        query: Vec<(String, String)>,
        body: RequestBody,
    ) -> Result<&HttpResponse, DispatchError> {
        let request = HttpRequest {
            verb,
            uri: uri.to_owned(),
            query,
            headers: self.headers(),
            body,
        };
        match self.transport.send(&request) {
            Ok(response) => {
                debug!(verb = %verb, uri, status = response.status, "request dispatched");
                Ok(&*self.state.response.insert(response))
            }
            Err(err) => {
                debug!(verb = %verb, uri, error = %err, "request failed without response");
                self.state.response = None;
                Err(err.into())
            }
        }
    }
}
