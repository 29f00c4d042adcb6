//! Mail expectations against a catching SMTP server.
//!
//! [`MailCatcher`] abstracts the inbox; [`HttpMailCatcher`] talks to the
//! MailCatcher web API (`/messages`, `/messages/<id>.json`,
//! `/messages/<id>.plain`).

use crate::http::{HttpRequest, HttpResponse, HttpTransport, RequestBody, TransportError, Verb};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// Errors raised by mail steps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailError {
    /// No mail catcher is configured for this scenario.
    #[error("no mail catcher is configured")]
    NotConfigured,
    /// The inbox is empty.
    #[error("no email was sent")]
    NoMessages,
    /// The plain text body lacks the text.
    #[error("email body does not contain '{text}'")]
    TextNotFound {
        /// Expected fragment.
        text: String,
    },
    /// No recipient matches.
    #[error("no recipient matches {expected}; recipients: {}", .recipients.join(", "))]
    ReceiverMismatch {
        /// Expected address in `<addr>` form.
        expected: String,
        /// Actual recipients.
        recipients: Vec<String>,
    },
    /// The sender does not match.
    #[error("sender {sender} does not match {expected}")]
    SenderMismatch {
        /// Expected address in `<addr>` form.
        expected: String,
        /// Actual sender.
        sender: String,
    },
    /// The subject lacks the text.
    #[error("subject '{subject}' does not contain '{expected}'")]
    SubjectMismatch {
        /// Expected fragment.
        expected: String,
        /// Actual subject.
        subject: String,
    },
    /// The catcher answered with an error status.
    #[error("mail catcher answered {status} for {uri}")]
    Status {
        /// Requested path.
        uri: String,
        /// Received status.
        status: u16,
    },
    /// The catcher answered with something other than the expected JSON.
    #[error("mail catcher sent invalid JSON for {uri}: {reason}")]
    InvalidJson {
        /// Requested path.
        uri: String,
        /// Parser message.
        reason: String,
    },
    /// The catcher could not be reached.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// One caught message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Message {
    /// Catcher-assigned id, increasing with arrival.
    pub id: u64,
    /// Envelope sender, e.g. `<noreply@example.com>`.
    #[serde(default)]
    pub sender: String,
    /// Envelope recipients.
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Subject line.
    #[serde(default)]
    pub subject: String,
}

/// Read and reset access to caught mail.
#[cfg_attr(test, mockall::automock)]
pub trait MailCatcher: Send {
    /// Every caught message.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] when the inbox cannot be read.
    fn messages(&self) -> Result<Vec<Message>, MailError>;

    /// Full details of message `id`.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] when the message cannot be read.
    fn message(&self, id: u64) -> Result<Message, MailError>;

    /// Plain text body of message `id`.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] when the body cannot be read.
    fn plain_body(&self, id: u64) -> Result<String, MailError>;

    /// Delete every caught message.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] when the inbox cannot be emptied.
    fn clear(&self) -> Result<(), MailError>;
}

/// [`MailCatcher`] over the MailCatcher HTTP API.
pub struct HttpMailCatcher {
    transport: Box<dyn HttpTransport>,
}

impl HttpMailCatcher {
    /// Use `transport`, resolving paths against the catcher's base URL.
    #[must_use]
    pub fn new(transport: Box<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn call(&self, verb: Verb, uri: &str) -> Result<HttpResponse, MailError> {
        let request = HttpRequest {
            verb,
            uri: uri.to_owned(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        };
        let response = self.transport.send(&request)?;
        if (200..300).contains(&response.status) {
            Ok(response)
        } else {
            Err(MailError::Status {
                uri: uri.to_owned(),
                status: response.status,
            })
        }
    }

    fn json<T: DeserializeOwned>(&self, uri: &str) -> Result<T, MailError> {
        let response = self.call(Verb::Get, uri)?;
        serde_json::from_str(&response.body).map_err(|err| MailError::InvalidJson {
            uri: uri.to_owned(),
            reason: err.to_string(),
        })
    }
}

impl MailCatcher for HttpMailCatcher {
    fn messages(&self) -> Result<Vec<Message>, MailError> {
        self.json("/messages")
    }

    fn message(&self, id: u64) -> Result<Message, MailError> {
        self.json(&format!("/messages/{id}.json"))
    }

    fn plain_body(&self, id: u64) -> Result<String, MailError> {
        Ok(self.call(Verb::Get, &format!("/messages/{id}.plain"))?.body)
    }

    fn clear(&self) -> Result<(), MailError> {
        self.call(Verb::Delete, "/messages").map(drop)
    }
}

/// Borrowing facade for mail steps.
pub struct MailSteps<'a> {
    catcher: Option<&'a dyn MailCatcher>,
}

impl<'a> MailSteps<'a> {
    /// Wrap the scenario's catcher, if any.
    #[must_use]
    pub const fn new(catcher: Option<&'a dyn MailCatcher>) -> Self {
        Self { catcher }
    }

    fn catcher(&self) -> Result<&'a dyn MailCatcher, MailError> {
        self.catcher.ok_or(MailError::NotConfigured)
    }

    /// The most recently caught message.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::NoMessages`] when the inbox is empty.
    pub fn last_message(&self) -> Result<Message, MailError> {
        self.catcher()?
            .messages()?
            .into_iter()
            .max_by_key(|message| message.id)
            .ok_or(MailError::NoMessages)
    }

    fn last_message_details(&self) -> Result<Message, MailError> {
        let id = self.last_message()?.id;
        self.catcher()?.message(id)
    }

    /// Given an empty mailcatcher.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] when the inbox cannot be emptied.
    pub fn empty_catcher(&self) -> Result<(), MailError> {
        debug!("emptying mail catcher");
        self.catcher()?.clear()
    }

    /// Then an email should be sent.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::NoMessages`] when nothing was caught.
    pub fn email_should_be_sent(&self) -> Result<(), MailError> {
        self.last_message().map(drop)
    }

    /// Then the email should contain `text`.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::TextNotFound`] when the plain body lacks `text`.
    pub fn email_should_contain(&self, text: &str) -> Result<(), MailError> {
        let id = self.last_message()?.id;
        let body = self.catcher()?.plain_body(id)?;
        if body.contains(text) {
            Ok(())
        } else {
            Err(MailError::TextNotFound {
                text: text.to_owned(),
            })
        }
    }

    /// Then the receiver should match `email`.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::ReceiverMismatch`] when no recipient is
    /// `<email>`.
    pub fn receiver_should_match(&self, email: &str) -> Result<(), MailError> {
        let expected = format!("<{email}>");
        let message = self.last_message_details()?;
        if message
            .recipients
            .iter()
            .any(|recipient| recipient.contains(&expected))
        {
            Ok(())
        } else {
            Err(MailError::ReceiverMismatch {
                expected,
                recipients: message.recipients,
            })
        }
    }

    /// Then the sender should match `email`.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::SenderMismatch`] when the sender is not
    /// `<email>`.
    pub fn sender_should_match(&self, email: &str) -> Result<(), MailError> {
        let expected = format!("<{email}>");
        let message = self.last_message_details()?;
        if message.sender.contains(&expected) {
            Ok(())
        } else {
            Err(MailError::SenderMismatch {
                expected,
                sender: message.sender,
            })
        }
    }

    /// Then the subject should contain `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::SubjectMismatch`] otherwise.
    pub fn subject_should_contain(&self, subject: &str) -> Result<(), MailError> {
        let message = self.last_message()?;
        if message.subject.contains(subject) {
            Ok(())
        } else {
            Err(MailError::SubjectMismatch {
                expected: subject.to_owned(),
                subject: message.subject,
            })
        }
    }
}
