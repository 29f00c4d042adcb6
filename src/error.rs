//! Error type returned by step facades.
//!
//! Module errors stay small and comparable; [`StepError`] gathers them for
//! callers that report a failed step and attaches a stable diagnostic code
//! with a hint.

// Scoped suppression for version-dependent lint false positives from
// miette/thiserror derive macros. The unused_assignments lint fires in some
// Rust versions but not others, so `#[expect]` cannot be used here.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use crate::alias::AliasError;
use crate::api::AssertionError;
use crate::auth::AuthError;
use crate::fixture::FixtureError;
use crate::http::DispatchError;
use crate::mail::MailError;
use crate::queue::QueueError;
use crate::store::StoreError;
use crate::substitute::SubstitutionError;
use crate::table::TableError;
use miette::Diagnostic;
use thiserror::Error;

/// Failure of a single step.
#[derive(Debug, Error, Diagnostic)]
pub enum StepError {
    /// An alias was never registered in this scenario.
    #[error(transparent)]
    #[diagnostic(
        code(rest_steps::alias),
        help("create the entity with an `as \"<alias>\"` fixture step earlier in the scenario")
    )]
    Alias(#[from] AliasError),
    /// An alias reference could not be substituted.
    #[error(transparent)]
    #[diagnostic(
        code(rest_steps::substitution),
        help("references look like %alias% or %alias:field%")
    )]
    Substitution(#[from] SubstitutionError),
    /// Fixture configuration or creation failed.
    #[error(transparent)]
    #[diagnostic(
        code(rest_steps::fixture),
        help("check the `entities` section of the configuration")
    )]
    Fixture(#[from] FixtureError),
    /// The request was not sent or got no response.
    #[error(transparent)]
    #[diagnostic(
        code(rest_steps::dispatch),
        help("supported verbs are GET, POST, PUT, PATCH and DELETE")
    )]
    Dispatch(#[from] DispatchError),
    /// An expectation about the response failed.
    #[error(transparent)]
    #[diagnostic(code(rest_steps::assertion))]
    Assertion(#[from] AssertionError),
    /// A data table had the wrong shape.
    #[error(transparent)]
    #[diagnostic(
        code(rest_steps::table),
        help("tables take one `| key | value |` pair per row")
    )]
    Table(#[from] TableError),
    /// The entity store failed.
    #[error(transparent)]
    #[diagnostic(code(rest_steps::store))]
    Store(#[from] StoreError),
    /// Obtaining or applying credentials failed.
    #[error(transparent)]
    #[diagnostic(code(rest_steps::auth))]
    Auth(#[from] AuthError),
    /// A mail expectation failed.
    #[error(transparent)]
    #[diagnostic(code(rest_steps::mail))]
    Mail(#[from] MailError),
    /// A queue expectation failed.
    #[error(transparent)]
    #[diagnostic(code(rest_steps::queue))]
    Queue(#[from] QueueError),
    /// A JSON document in a step was invalid.
    #[error("step JSON is invalid: {reason}")]
    #[diagnostic(
        code(rest_steps::json),
        help("doc strings passed as request bodies must be JSON objects")
    )]
    InvalidJson {
        /// Document as written.
        document: String,
        /// Parser message.
        reason: String,
    },
}

impl StepError {
    /// Parse a step doc string that must hold a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::InvalidJson`] when the text is not a JSON object.
    pub fn parse_object(
        document: &str,
    ) -> Result<serde_json::Map<String, serde_json::Value>, Self> {
        match serde_json::from_str(document) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(_) => Err(Self::InvalidJson {
                document: document.to_owned(),
                reason: "expected a JSON object".to_owned(),
            }),
            Err(err) => Err(Self::InvalidJson {
                document: document.to_owned(),
                reason: err.to_string(),
            }),
        }
    }
}
