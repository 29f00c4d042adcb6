//! Given/When/Then steps for exercising HTTP APIs against entity fixtures.
//!
//! A [`Scenario`] is created per test scenario from an
//! [`ExtensionConfig`](config::ExtensionConfig). Fixture steps create
//! entities in an [`EntityStore`](store::EntityStore) and register them
//! under aliases; API steps build REST paths from logical type names,
//! substitute `%alias%` references and capture every response for later
//! assertions.
//!
//! ```no_run
//! use rest_steps::Scenario;
//! use rest_steps::config::ExtensionConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExtensionConfig::from_yaml_str(
//!     "api:\n  base_uri: http://localhost:8080\nentities:\n  post:\n    entity: Post\n    default_properties:\n      title: Hello\n",
//!     "rest-steps.yml",
//! )?;
//! let mut scenario = Scenario::builder(config).build()?;
//! scenario.fixtures().an_existing_as("post", "first", &serde_json::Map::new())?;
//! scenario.api().retrieve_alias("post", "first", None)?;
//! scenario.api().should_receive_json(200)?;
//! # Ok(())
//! # }
//! ```

pub mod alias;
pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod fixture;
pub mod http;
pub mod logging;
pub mod mail;
pub mod pluralize;
pub mod queue;
pub mod route;
pub mod runner;
pub mod scenario;
pub mod store;
pub mod substitute;
pub mod table;
pub mod user;

pub use error::StepError;
pub use scenario::{Scenario, ScenarioBuilder};
