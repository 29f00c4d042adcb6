//! Per-scenario state and the step facades borrowing it.
//!
//! A [`Scenario`] is built fresh for every test scenario from an
//! [`ExtensionConfig`]. It owns everything steps share: the alias registry,
//! the API client and its captured request state, the entity store, and the
//! optional mail, queue and token collaborators. Step facades such as
//! [`Scenario::api`] borrow the pieces they need for one step.

use crate::alias::AliasRegistry;
use crate::api::ApiSteps;
use crate::auth::{AuthSteps, RecordTokenIssuer, TokenIssuer};
use crate::config::{ConfigError, ExtensionConfig};
use crate::database::DatabaseSteps;
use crate::fixture::EntityFixtures;
use crate::fixture::hydrate::HydratorRegistry;
use crate::http::{ApiClient, HttpTransport, UreqTransport};
use crate::mail::{HttpMailCatcher, MailCatcher, MailSteps};
use crate::queue::{QueueInspector, QueueSteps};
use crate::store::{EntityStore, InMemoryStore};
use crate::user::{PasswordHasher, Sha256PasswordHasher, UserFixtures};
use std::fmt;
use tracing::debug;

/// State shared by the steps of one scenario.
pub struct Scenario {
    config: ExtensionConfig,
    aliases: AliasRegistry,
    client: ApiClient,
    store: Box<dyn EntityStore>,
    hydrators: HydratorRegistry,
    hasher: Box<dyn PasswordHasher>,
    issuer: Box<dyn TokenIssuer>,
    mail: Option<Box<dyn MailCatcher>>,
    queues: Option<Box<dyn QueueInspector>>,
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("base_uri", &self.config.api.base_uri)
            .field("aliases", &self.aliases.len())
            .field("client", &self.client)
            .field("mail", &self.mail.is_some())
            .field("queues", &self.queues.is_some())
            .finish_non_exhaustive()
    }
}

impl Scenario {
    /// Start building a scenario from `config`.
    #[must_use]
    pub fn builder(config: ExtensionConfig) -> ScenarioBuilder {
        ScenarioBuilder::new(config)
    }

    /// Configuration the scenario was built from.
    #[must_use]
    pub const fn config(&self) -> &ExtensionConfig {
        &self.config
    }

    /// Aliases registered so far.
    #[must_use]
    pub const fn aliases(&self) -> &AliasRegistry {
        &self.aliases
    }

    /// The API client and its captured state.
    #[must_use]
    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    /// The entity store.
    #[must_use]
    pub fn store(&self) -> &dyn EntityStore {
        &*self.store
    }

    /// Request and response steps.
    pub fn api(&mut self) -> ApiSteps<'_> {
        ApiSteps::new(
            &mut self.client,
            &self.config.entities,
            &self.aliases,
            &*self.store,
        )
    }

    /// Entity fixture steps.
    pub fn fixtures(&mut self) -> EntityFixtures<'_> {
        EntityFixtures::new(
            &self.config.entities,
            &self.hydrators,
            &mut self.aliases,
            &mut *self.store,
        )
    }

    /// Default user generation, when a `user` section is configured.
    #[must_use]
    pub fn users(&self) -> Option<UserFixtures<'_>> {
        let options = self.config.user.as_ref()?;
        Some(UserFixtures::new(options, &*self.store, &*self.hasher))
    }

    /// Authentication steps.
    pub fn auth(&mut self) -> AuthSteps<'_> {
        AuthSteps::new(
            &mut self.client,
            &mut *self.store,
            self.config.user.as_ref(),
            &self.config.oauth,
            &*self.issuer,
            &*self.hasher,
        )
    }

    /// Database lifecycle steps.
    pub fn database(&mut self) -> DatabaseSteps<'_> {
        DatabaseSteps::new(&mut *self.store)
    }

    /// Mail steps.
    #[must_use]
    pub fn mail(&self) -> MailSteps<'_> {
        MailSteps::new(self.mail.as_deref())
    }

    /// Queue steps.
    pub fn queues(&mut self) -> QueueSteps<'_> {
        let inspector = self
            .queues
            .as_mut()
            .map(|queues| -> &mut dyn QueueInspector { queues.as_mut() });
        QueueSteps::new(inspector, &self.aliases, &*self.store)
    }
}

/// Assembles a [`Scenario`], defaulting every collaborator not supplied.
pub struct ScenarioBuilder {
    config: ExtensionConfig,
    transport: Option<Box<dyn HttpTransport>>,
    store: Option<Box<dyn EntityStore>>,
    hydrators: HydratorRegistry,
    hasher: Option<Box<dyn PasswordHasher>>,
    issuer: Option<Box<dyn TokenIssuer>>,
    mail: Option<Box<dyn MailCatcher>>,
    queues: Option<Box<dyn QueueInspector>>,
}

impl ScenarioBuilder {
    fn new(config: ExtensionConfig) -> Self {
        Self {
            config,
            transport: None,
            store: None,
            hydrators: HydratorRegistry::new(),
            hasher: None,
            issuer: None,
            mail: None,
            queues: None,
        }
    }

    /// Send API requests through `transport` instead of the network.
    #[must_use]
    pub fn with_transport(mut self, transport: Box<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use `store` for fixtures. Defaults to an empty [`InMemoryStore`].
    #[must_use]
    pub fn with_store(mut self, store: Box<dyn EntityStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Custom hydrators named by fixture configuration.
    #[must_use]
    pub fn with_hydrators(mut self, hydrators: HydratorRegistry) -> Self {
        self.hydrators = hydrators;
        self
    }

    /// Hash default user passwords with `hasher`.
    #[must_use]
    pub fn with_password_hasher(mut self, hasher: Box<dyn PasswordHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Issue access tokens with `issuer`.
    #[must_use]
    pub fn with_token_issuer(mut self, issuer: Box<dyn TokenIssuer>) -> Self {
        self.issuer = Some(issuer);
        self
    }

    /// Read caught mail from `catcher` instead of the configured
    /// MailCatcher.
    #[must_use]
    pub fn with_mail_catcher(mut self, catcher: Box<dyn MailCatcher>) -> Self {
        self.mail = Some(catcher);
        self
    }

    /// Inspect queues through `inspector`.
    #[must_use]
    pub fn with_queue_inspector(mut self, inspector: Box<dyn QueueInspector>) -> Self {
        self.queues = Some(inspector);
        self
    }

    /// Validate the configuration and build the scenario.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the configuration has problems.
    pub fn build(self) -> Result<Scenario, ConfigError> {
        let Self {
            config,
            transport,
            store,
            hydrators,
            hasher,
            issuer,
            mail,
            queues,
        } = self;
        config.validate()?;
        let invalid = |problem| ConfigError::Invalid {
            problems: vec![problem],
        };

        let transport = match transport {
            Some(transport) => transport,
            None => Box::new(UreqTransport::new(
                config.base_url().map_err(invalid)?,
                config.timeout(),
            )),
        };
        let mail = match mail {
            Some(mail) => Some(mail),
            None => config.mailcatcher_url().map_err(invalid)?.map(|url| {
                let transport = UreqTransport::new(url, config.timeout());
                Box::new(HttpMailCatcher::new(Box::new(transport))) as Box<dyn MailCatcher>
            }),
        };
        let client = ApiClient::new(transport).with_default_headers(config.api.headers.clone());
        let issuer =
            issuer.unwrap_or_else(|| Box::new(RecordTokenIssuer::from_options(&config.oauth)));
        debug!(
            base_uri = %config.api.base_uri,
            entity_types = config.entities.len(),
            "scenario created"
        );
        Ok(Scenario {
            aliases: AliasRegistry::new(),
            client,
            store: store.unwrap_or_else(|| Box::new(InMemoryStore::new())),
            hydrators,
            hasher: hasher.unwrap_or_else(|| Box::new(Sha256PasswordHasher)),
            issuer,
            mail,
            queues,
            config,
        })
    }
}
