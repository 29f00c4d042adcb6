//! Wire-level request execution.
//!
//! [`HttpTransport`] is the seam between dispatch bookkeeping and the network.
//! [`UreqTransport`] resolves request paths against a base URL and returns
//! error statuses as ordinary responses.

use super::Verb;
use serde_json::{Value, json};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use url::Url;

/// Body encodings a request may carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// JSON document.
    Json(Value),
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
    /// `multipart/form-data` parts, in order.
    Multipart(Vec<MultipartPart>),
}

/// One part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    /// Form field name.
    pub name: String,
    /// File name, for file parts.
    pub filename: Option<String>,
    /// Part content type. Unset parts are sent without one.
    pub content_type: Option<String>,
    /// Raw contents.
    pub contents: Vec<u8>,
}

impl MultipartPart {
    /// Plain text field.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: None,
            contents: value.into().into_bytes(),
        }
    }

    /// File field with `filename` and `content_type`.
    #[must_use]
    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        contents: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: Some(content_type.into()),
            contents,
        }
    }

    /// JSON summary recorded as the request body. Contents are decoded
    /// lossily as UTF-8.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "filename": self.filename,
            "contents": String::from_utf8_lossy(&self.contents),
        })
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Pick a boundary that occurs in none of the parts.
fn boundary_for(parts: &[MultipartPart]) -> String {
    let mut seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    loop {
        let boundary = format!("rest-steps-{seed:032x}");
        if !parts
            .iter()
            .any(|part| contains(&part.contents, boundary.as_bytes()))
        {
            return boundary;
        }
        seed = seed.wrapping_add(1);
    }
}

/// Encode `parts` as a `multipart/form-data` body delimited by `boundary`.
#[must_use]
pub fn encode_multipart(parts: &[MultipartPart], boundary: &str) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        let disposition = match &part.filename {
            Some(filename) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{filename}\"\r\n",
                part.name
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name),
        };
        body.extend_from_slice(disposition.as_bytes());
        if let Some(content_type) = &part.content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.contents);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

/// A request ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Verb to use.
    pub verb: Verb,
    /// Path, or absolute URL, resolved against the transport base.
    pub uri: String,
    /// Query parameters appended to the URL.
    pub query: Vec<(String, String)>,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: RequestBody,
}

/// A received response, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Header name/value pairs as received.
    pub headers: Vec<(String, String)>,
    /// Raw body text.
    pub body: String,
}

impl HttpResponse {
    /// First value of header `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parse the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the parser error when the body is not valid JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Failures that produce no HTTP response at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request path could not be resolved to a URL.
    #[error("cannot resolve '{uri}' against the base URL: {reason}")]
    InvalidUrl {
        /// Requested path.
        uri: String,
        /// Parser message.
        reason: String,
    },
    /// Connecting, writing or reading failed.
    #[error("request to '{url}' failed: {reason}")]
    Connection {
        /// Resolved URL.
        url: String,
        /// Underlying error message.
        reason: String,
    },
}

/// Executes requests.
#[cfg_attr(test, mockall::automock)]
pub trait HttpTransport: Send {
    /// Send `request` once and return whatever response arrives.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] only when no response was received.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    base: Url,
}

impl UreqTransport {
    /// Create a transport resolving paths against `base`. Without a timeout a
    /// hung server blocks the calling step.
    #[must_use]
    pub fn new(base: Url, timeout: Option<Duration>) -> Self {
        let builder = ureq::AgentBuilder::new();
        let builder = match timeout {
            Some(limit) => builder.timeout(limit),
            None => builder,
        };
        Self {
            agent: builder.build(),
            base,
        }
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base(&self) -> &Url {
        &self.base
    }

    fn resolve(&self, uri: &str) -> Result<Url, TransportError> {
        self.base
            .join(uri)
            .map_err(|err| TransportError::InvalidUrl {
                uri: uri.to_owned(),
                reason: err.to_string(),
            })
    }
}

fn capture(url: &Url, response: ureq::Response) -> Result<HttpResponse, TransportError> {
    let status = response.status();
    let headers = response
        .headers_names()
        .into_iter()
        .filter_map(|name| {
            let value = response.header(&name)?.to_owned();
            Some((name, value))
        })
        .collect();
    let body = response
        .into_string()
        .map_err(|err| TransportError::Connection {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

impl HttpTransport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.resolve(&request.uri)?;
        let mut call = self.agent.request_url(request.verb.as_str(), &url);
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }
        for (name, value) in &request.query {
            call = call.query(name, value);
        }
        let outcome = match &request.body {
            RequestBody::Empty => call.call(),
            RequestBody::Json(body) => call.send_json(body),
            RequestBody::Form(pairs) => {
                let pairs: Vec<(&str, &str)> = pairs
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str()))
                    .collect();
                call.send_form(&pairs)
            }
            RequestBody::Multipart(parts) => {
                let boundary = boundary_for(parts);
                call.set(
                    "Content-Type",
                    &format!("multipart/form-data; boundary={boundary}"),
                )
                .send_bytes(&encode_multipart(parts, &boundary))
            }
        };
        match outcome {
            Ok(response) | Err(ureq::Error::Status(_, response)) => capture(&url, response),
            Err(ureq::Error::Transport(err)) => Err(TransportError::Connection {
                url: url.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}
