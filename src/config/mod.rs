//! Extension configuration.
//!
//! One YAML document configures the API client, the fixture catalogue, the
//! default user and the OAuth token settings:
//!
//! ```yaml
//! api:
//!   base_uri: http://localhost:8080
//!   headers:
//!     Accept: application/json
//! entities:
//!   user:
//!     entity: User
//!     default_properties:
//!       email: user@example.com
//! user:
//!   entity: User
//!   default_properties:
//!     email: user@example.com
//!     password: secret
//! mailcatcher:
//!   base_uri: http://localhost:1080
//! ```
//!
//! Configuration is handed to [`Scenario::builder`](crate::Scenario::builder)
//! explicitly; nothing is looked up ambiently. The only environment input is
//! [`BASE_URI_ENV`], which replaces `api.base_uri`.

// Scoped suppression for version-dependent lint false positives from
// miette/thiserror derive macros.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

mod yaml;

use crate::fixture::FixtureConfig;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use miette::Diagnostic;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub use yaml::map_yaml_error;

/// Environment variable replacing `api.base_uri`.
pub const BASE_URI_ENV: &str = "REST_STEPS_BASE_URI";

/// Root configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionConfig {
    /// HTTP client settings.
    pub api: ApiOptions,
    /// Logical entity types available to fixture and API steps.
    #[serde(default)]
    pub entities: FixtureConfig,
    /// Default user used by authentication steps.
    #[serde(default)]
    pub user: Option<UserOptions>,
    /// Token issuing settings.
    #[serde(default)]
    pub oauth: OAuthOptions,
    /// MailCatcher web interface used by mail steps.
    #[serde(default)]
    pub mailcatcher: Option<MailCatcherOptions>,
}

/// MailCatcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MailCatcherOptions {
    /// Base URL of the MailCatcher HTTP API, e.g. `http://localhost:1080`.
    pub base_uri: String,
}

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiOptions {
    /// Base URL request paths are resolved against.
    pub base_uri: String,
    /// Headers sent with every request.
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    /// Per-request timeout. Requests never time out when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Default user settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserOptions {
    /// Concrete user class.
    pub entity: String,
    /// Field identifying a user in steps.
    #[serde(default = "default_step_identifier")]
    pub step_identifier: String,
    /// Field receiving the role list.
    #[serde(default = "default_roles_field")]
    pub roles_field: String,
    /// Properties of a freshly generated user.
    #[serde(default)]
    pub default_properties: Map<String, Value>,
}

fn default_step_identifier() -> String {
    "email".to_owned()
}

fn default_roles_field() -> String {
    "roles".to_owned()
}

impl UserOptions {
    /// Options for `entity` with the default identifier and roles fields.
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            step_identifier: default_step_identifier(),
            roles_field: default_roles_field(),
            default_properties: Map::new(),
        }
    }

    /// Replace the default properties.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.default_properties = defaults;
        self
    }
}

/// Token issuing settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OAuthOptions {
    /// Path of the password grant endpoint.
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    /// Class persisted for issued access tokens, when the store has one.
    #[serde(default)]
    pub access_token_class: Option<String>,
    /// Lifetime of issued tokens.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

fn default_token_endpoint() -> String {
    "/oauth/token".to_owned()
}

const fn default_token_ttl() -> u64 {
    10_000
}

impl Default for OAuthOptions {
    fn default() -> Self {
        Self {
            token_endpoint: default_token_endpoint(),
            access_token_class: None,
            token_ttl_secs: default_token_ttl(),
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read configuration file '{path}'")]
    #[diagnostic(code(rest_steps::config::read))]
    Read {
        /// File path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The YAML did not match the configuration schema.
    #[error("configuration parse error")]
    #[diagnostic(code(rest_steps::config::parse))]
    Parse {
        /// Located YAML diagnostic.
        #[source]
        #[diagnostic_source]
        source: Box<dyn Diagnostic + Send + Sync + 'static>,
    },
    /// The configuration parsed but is inconsistent.
    #[error("configuration has {} problem(s)", .problems.len())]
    #[diagnostic(code(rest_steps::config::invalid))]
    Invalid {
        /// Every problem found.
        #[related]
        problems: Vec<ConfigProblem>,
    },
}

/// One consistency problem in a parsed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ConfigProblem {
    /// `api.base_uri` is not an absolute URL.
    #[error("base URI '{uri}' is invalid: {reason}")]
    #[diagnostic(
        code(rest_steps::config::base_uri),
        help("use an absolute URL such as http://localhost:8080, or set REST_STEPS_BASE_URI")
    )]
    InvalidBaseUri {
        /// Configured value.
        uri: String,
        /// Parser message.
        reason: String,
    },
    /// A descriptor names no class.
    #[error("entity type '{entity_type}' has an empty `entity` class")]
    #[diagnostic(code(rest_steps::config::empty_entity))]
    EmptyEntityClass {
        /// Logical type.
        entity_type: String,
    },
    /// A logical name is claimed by two descriptors.
    #[error("'{name}' names both entity type '{first}' and entity type '{second}'")]
    #[diagnostic(
        code(rest_steps::config::alias_collision),
        help("each type key and alias must be unique across `entities`")
    )]
    AliasCollision {
        /// Contested name.
        name: String,
        /// Type that claimed it first.
        first: String,
        /// Type claiming it again.
        second: String,
    },
    /// The user section names no class.
    #[error("`user.entity` is empty")]
    #[diagnostic(code(rest_steps::config::empty_user_entity))]
    EmptyUserEntity,
    /// `mailcatcher.base_uri` is not an absolute URL.
    #[error("mailcatcher URI '{uri}' is invalid: {reason}")]
    #[diagnostic(code(rest_steps::config::mailcatcher_uri))]
    InvalidMailCatcherUri {
        /// Configured value.
        uri: String,
        /// Parser message.
        reason: String,
    },
}

impl ExtensionConfig {
    /// Configuration pointing at `base_uri` with no entity types.
    #[must_use]
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            api: ApiOptions {
                base_uri: base_uri.into(),
                headers: IndexMap::new(),
                timeout_secs: None,
            },
            entities: FixtureConfig::new(),
            user: None,
            oauth: OAuthOptions::default(),
            mailcatcher: None,
        }
    }

    /// Replace the entity catalogue.
    #[must_use]
    pub fn with_entities(mut self, entities: FixtureConfig) -> Self {
        self.entities = entities;
        self
    }

    /// Set the default user options.
    #[must_use]
    pub fn with_user(mut self, user: UserOptions) -> Self {
        self.user = Some(user);
        self
    }

    /// Parse a YAML document. `name` labels diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the YAML is malformed or does not
    /// match the schema.
    pub fn from_yaml_str(yaml: &str, name: &str) -> Result<Self, ConfigError> {
        serde_saphyr::from_str(yaml).map_err(|err| ConfigError::Parse {
            source: map_yaml_error(err, yaml, name),
        })
    }

    /// Read and parse a YAML file, then apply [`BASE_URI_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, or
    /// [`ConfigError::Parse`] when it does not parse.
    pub fn from_path(path: &Utf8Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let config = Self::from_yaml_str(&yaml, path.as_str())?;
        Ok(config.with_base_uri_override(std::env::var(BASE_URI_ENV).ok()))
    }

    /// Replace `api.base_uri` when `value` is set and non-empty.
    #[must_use]
    pub fn with_base_uri_override(mut self, value: Option<String>) -> Self {
        if let Some(uri) = value.filter(|uri| !uri.trim().is_empty()) {
            self.api.base_uri = uri;
        }
        self
    }

    /// Parsed `api.base_uri`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigProblem::InvalidBaseUri`] when it is not an absolute
    /// URL.
    pub fn base_url(&self) -> Result<Url, ConfigProblem> {
        Url::parse(&self.api.base_uri).map_err(|err| ConfigProblem::InvalidBaseUri {
            uri: self.api.base_uri.clone(),
            reason: err.to_string(),
        })
    }

    /// Parsed `mailcatcher.base_uri`, when a mail catcher is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigProblem::InvalidMailCatcherUri`] when it is not an
    /// absolute URL.
    pub fn mailcatcher_url(&self) -> Result<Option<Url>, ConfigProblem> {
        self.mailcatcher
            .as_ref()
            .map(|options| {
                Url::parse(&options.base_uri).map_err(|err| ConfigProblem::InvalidMailCatcherUri {
                    uri: options.base_uri.clone(),
                    reason: err.to_string(),
                })
            })
            .transpose()
    }

    /// Request timeout, if configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.api.timeout_secs.map(Duration::from_secs)
    }

    /// Every consistency problem, in document order.
    #[must_use]
    pub fn problems(&self) -> Vec<ConfigProblem> {
        let mut problems = Vec::new();
        if let Err(problem) = self.base_url() {
            problems.push(problem);
        }
        let mut claimed: HashMap<&str, &str> = HashMap::new();
        for (entity_type, descriptor) in self.entities.iter() {
            if descriptor.entity.trim().is_empty() {
                problems.push(ConfigProblem::EmptyEntityClass {
                    entity_type: entity_type.clone(),
                });
            }
            let names = std::iter::once(entity_type.as_str())
                .chain(descriptor.aliases.iter().map(String::as_str));
            for name in names {
                if let Some(first) = claimed.insert(name, entity_type) {
                    problems.push(ConfigProblem::AliasCollision {
                        name: name.to_owned(),
                        first: first.to_owned(),
                        second: entity_type.clone(),
                    });
                }
            }
        }
        if self.user.as_ref().is_some_and(|user| user.entity.trim().is_empty()) {
            problems.push(ConfigProblem::EmptyUserEntity);
        }
        if let Err(problem) = self.mailcatcher_url() {
            problems.push(problem);
        }
        problems
    }

    /// Check the configuration for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] listing every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { problems })
        }
    }
}
