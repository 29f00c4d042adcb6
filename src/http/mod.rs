//! Generic HTTP dispatch with captured request and response state.
//!
//! Error statuses are data: a 404 or 422 is captured like a 200 so later
//! assertion steps can inspect it. Only failures that yield no response at
//! all surface as [`DispatchError::Transport`].

mod client;
mod transport;
mod verb;

pub use client::{ApiClient, PendingRequestState, split_query};
#[cfg(test)]
pub use transport::MockHttpTransport;
pub use transport::{
    HttpRequest, HttpResponse, HttpTransport, MultipartPart, RequestBody, TransportError,
    UreqTransport, encode_multipart,
};
pub use verb::Verb;

use thiserror::Error;

/// Errors raised by [`ApiClient`] dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The verb is not one of GET, POST, PUT, PATCH or DELETE.
    #[error("unsupported HTTP verb '{verb}'")]
    InvalidVerb {
        /// Verb as supplied.
        verb: String,
    },
    /// No response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
