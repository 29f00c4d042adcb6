//! Authentication steps and access token issuing.
//!
//! Tokens are either issued directly through a [`TokenIssuer`] for a stored
//! user, or obtained from the API's password grant endpoint. Either way the
//! client's `Authorization` header is replaced with `Bearer <token>`.

use crate::config::{OAuthOptions, UserOptions};
use crate::entity::{Entity, EntityKey, FieldValue, Record};
use crate::error::StepError;
use crate::fixture::FixtureError;
use crate::http::{ApiClient, DispatchError};
use crate::store::{EntityStore, StoreError, identifier_of};
use crate::user::{PasswordHasher, UserFixtures, hex};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

const AUTHORIZATION: &str = "Authorization";

/// Errors raised by authentication steps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No `user` section is configured.
    #[error("no default user is configured")]
    UserNotConfigured,
    /// No stored user matches.
    #[error("no user with {field} '{value}' was found")]
    UserNotFound {
        /// Field searched.
        field: String,
        /// Value searched for.
        value: String,
    },
    /// The token endpoint replied without an access token.
    #[error("token response has no access_token: {body}")]
    MissingAccessToken {
        /// Received body.
        body: String,
    },
    /// Building or saving the user failed.
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    /// The token could not be stored.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The token request failed without a response.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Issues access tokens for stored users.
pub trait TokenIssuer: fmt::Debug + Send + Sync {
    /// Issue a token for `owner`, recording it in `store` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the token cannot be recorded.
    fn issue(&self, store: &mut dyn EntityStore, owner: &dyn Entity) -> Result<String, AuthError>;
}

/// Issues random-looking tokens and, when configured, persists each one as
/// an access token record owned by the user.
#[derive(Debug)]
pub struct RecordTokenIssuer {
    class: Option<String>,
    ttl: Duration,
    issued: AtomicU64,
}

impl RecordTokenIssuer {
    /// Issuer persisting `class` records that expire after `ttl`.
    #[must_use]
    pub const fn new(class: Option<String>, ttl: Duration) -> Self {
        Self {
            class,
            ttl,
            issued: AtomicU64::new(0),
        }
    }

    /// Issuer configured from the `oauth` section.
    #[must_use]
    pub fn from_options(options: &OAuthOptions) -> Self {
        Self::new(
            options.access_token_class.clone(),
            Duration::from_secs(options.token_ttl_secs),
        )
    }
}

impl TokenIssuer for RecordTokenIssuer {
    fn issue(&self, store: &mut dyn EntityStore, owner: &dyn Entity) -> Result<String, AuthError> {
        let owner_metadata = store.metadata(owner.class_name())?;
        let owner_id = identifier_of(&owner_metadata, owner);
        let now = OffsetDateTime::now_utc();
        let sequence = self.issued.fetch_add(1, Ordering::Relaxed);
        let mut digest = Sha256::new();
        digest.update(owner.class_name().as_bytes());
        digest.update(owner_id.to_string().as_bytes());
        digest.update(sequence.to_le_bytes());
        digest.update(now.unix_timestamp_nanos().to_le_bytes());
        let token = hex(&digest.finalize());

        if let Some(class) = &self.class {
            let record = Record::new(class.clone())
                .with("token", token.as_str())
                .with(
                    "owner",
                    FieldValue::Reference(EntityKey::new(owner_metadata.name(), owner_id)),
                )
                .with("expiresAt", FieldValue::DateTime(now + self.ttl));
            store.persist(Box::new(record))?;
            store.flush()?;
        }
        debug!(owner = owner.class_name(), "access token issued");
        Ok(token)
    }
}

/// Borrowing facade for authentication steps.
pub struct AuthSteps<'a> {
    client: &'a mut ApiClient,
    store: &'a mut dyn EntityStore,
    user: Option<&'a UserOptions>,
    oauth: &'a OAuthOptions,
    issuer: &'a dyn TokenIssuer,
    hasher: &'a dyn PasswordHasher,
}

impl<'a> AuthSteps<'a> {
    /// Wrap the scenario's client, store and token settings.
    #[must_use]
    pub fn new(
        client: &'a mut ApiClient,
        store: &'a mut dyn EntityStore,
        user: Option<&'a UserOptions>,
        oauth: &'a OAuthOptions,
        issuer: &'a dyn TokenIssuer,
        hasher: &'a dyn PasswordHasher,
    ) -> Self {
        Self {
            client,
            store,
            user,
            oauth,
            issuer,
            hasher,
        }
    }

    fn set_bearer(&mut self, token: &str) {
        self.client.remove_header(AUTHORIZATION);
        self.client.set_header(AUTHORIZATION, format!("Bearer {token}"));
    }

    /// Given I have a valid access token as `<role>` [with `<identifier>`].
    ///
    /// Generates the default user, saves it and authorizes as that user.
    /// Returns the issued token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when no user is configured or the user or token
    /// cannot be saved.
    pub fn have_valid_access_token(
        &mut self,
        role: &str,
        identifier: Option<&str>,
    ) -> Result<String, StepError> {
        let options = self.user.ok_or(AuthError::UserNotConfigured)?;
        let user = UserFixtures::new(options, &*self.store, self.hasher)
            .generate_default_user(role, identifier)
            .map_err(AuthError::from)?;
        let user = self.store.persist(user).map_err(AuthError::from)?;
        self.store.flush().map_err(AuthError::from)?;
        let token = self.issuer.issue(&mut *self.store, user.as_ref())?;
        self.set_bearer(&token);
        Ok(token)
    }

    /// Given I am unauthorized.
    pub fn unauthorized(&mut self) {
        self.client.remove_header(AUTHORIZATION);
    }

    /// Given I am authorized with email `<email>`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UserNotFound`] when no user has that email.
    pub fn authorized_with_email(&mut self, email: &str) -> Result<String, StepError> {
        self.authorized_by("email", email)
    }

    /// Given I am authorized with username `<username>`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UserNotFound`] when no user has that username.
    pub fn authorized_with_username(&mut self, username: &str) -> Result<String, StepError> {
        self.authorized_by("username", username)
    }

    fn authorized_by(&mut self, field: &str, value: &str) -> Result<String, StepError> {
        let options = self.user.ok_or(AuthError::UserNotConfigured)?;
        let user = self
            .store
            .find_one_by(&options.entity, field, &FieldValue::Text(value.to_owned()))
            .map_err(AuthError::from)?
            .ok_or_else(|| AuthError::UserNotFound {
                field: field.to_owned(),
                value: value.to_owned(),
            })?;
        let token = self.issuer.issue(&mut *self.store, user.as_ref())?;
        self.set_bearer(&token);
        Ok(token)
    }

    /// Given I login using password grant with `<username>` and
    /// `<password>`.
    ///
    /// Any existing `Authorization` header is dropped before the form POST
    /// to the token endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingAccessToken`] when the reply carries no
    /// `access_token`, or [`AuthError::Dispatch`] when no reply arrives.
    pub fn login_with_password_grant(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<String, StepError> {
        self.unauthorized();
        let form = vec![
            ("grant_type".to_owned(), "password".to_owned()),
            ("username".to_owned(), username.to_owned()),
            ("password".to_owned(), password.to_owned()),
        ];
        let response = self
            .client
            .post_form(&self.oauth.token_endpoint, form)
            .map_err(AuthError::from)?;
        let token = response
            .json()
            .ok()
            .as_ref()
            .and_then(|body| body.get("access_token"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| AuthError::MissingAccessToken {
                body: response.body.clone(),
            })?;
        self.set_bearer(&token);
        Ok(token)
    }
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "auth step tests fail fast on setup errors")]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockHttpTransport, RequestBody};
    use crate::store::{ClassMetadata, FieldType, InMemoryStore};
    use crate::user::Sha256PasswordHasher;
    use serde_json::json;

    fn store() -> InMemoryStore {
        InMemoryStore::new()
            .with_class(
                ClassMetadata::record("User", "id")
                    .with_field("email", FieldType::Text)
                    .with_field("username", FieldType::Text)
                    .with_field("roles", FieldType::SimpleArray),
            )
            .with_class(
                ClassMetadata::record("AccessToken", "token")
                    .with_field("token", FieldType::Text)
                    .with_field("expiresAt", FieldType::DateTime),
            )
    }

    fn bearer(client: &ApiClient) -> Option<String> {
        client
            .headers()
            .into_iter()
            .find(|(name, _)| name == AUTHORIZATION)
            .map(|(_, value)| value)
    }

    #[test]
    fn valid_access_token_saves_user_and_token() {
        let mut store = store();
        let mut client = ApiClient::new(Box::new(MockHttpTransport::new()));
        let user = UserOptions::new("User").with_defaults(
            json!({"email": "d@x.io"}).as_object().cloned().unwrap_or_default(),
        );
        let oauth = OAuthOptions {
            access_token_class: Some("AccessToken".into()),
            ..OAuthOptions::default()
        };
        let issuer = RecordTokenIssuer::from_options(&oauth);
        let token = AuthSteps::new(
            &mut client,
            &mut store,
            Some(&user),
            &oauth,
            &issuer,
            &Sha256PasswordHasher,
        )
        .have_valid_access_token("admin", Some("a@x.io"))
        .expect("token");
        assert_eq!(token.len(), 64);
        assert_eq!(bearer(&client), Some(format!("Bearer {token}")));
        assert_eq!(store.count("User"), 1);
        assert_eq!(store.count("AccessToken"), 1);
    }

    #[test]
    fn missing_user_is_reported() {
        let mut store = store();
        let mut client = ApiClient::new(Box::new(MockHttpTransport::new()));
        let user = UserOptions::new("User");
        let oauth = OAuthOptions::default();
        let issuer = RecordTokenIssuer::from_options(&oauth);
        let mut steps = AuthSteps::new(
            &mut client,
            &mut store,
            Some(&user),
            &oauth,
            &issuer,
            &Sha256PasswordHasher,
        );
        assert!(matches!(
            steps.authorized_with_username("ghost"),
            Err(StepError::Auth(AuthError::UserNotFound { .. }))
        ));
    }

    #[test]
    fn password_grant_posts_form_and_sets_bearer() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .withf(|request| {
                request.uri == "/oauth/token"
                    && request.headers.is_empty()
                    && matches!(&request.body, RequestBody::Form(pairs)
                        if pairs.first().is_some_and(|(k, v)| k == "grant_type" && v == "password"))
            })
            .times(1)
            .returning(|_| {
                Ok(HttpResponse {
                    status: 200,
                    headers: Vec::new(),
                    body: r#"{"access_token": "abc", "token_type": "Bearer"}"#.into(),
                })
            });
        let mut client = ApiClient::new(Box::new(transport));
        client.set_header(AUTHORIZATION, "Bearer stale");
        let mut store = store();
        let oauth = OAuthOptions::default();
        let issuer = RecordTokenIssuer::from_options(&oauth);
        let token = AuthSteps::new(&mut client, &mut store, None, &oauth, &issuer, &Sha256PasswordHasher)
            .login_with_password_grant("ada", "pw")
            .expect("login");
        assert_eq!(token, "abc");
        assert_eq!(bearer(&client), Some("Bearer abc".to_owned()));
    }
}
