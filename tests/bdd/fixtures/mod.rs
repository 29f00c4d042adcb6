//! Fixture modules for BDD scenarios.
//!
//! The `TestWorld` struct holds all state for one scenario: the stub API
//! server, the [`Scenario`] under test built against it, and the outcome of
//! steps expected to fail. Both the server and the scenario are created
//! lazily on first use so `Given` steps can run in any order.

// The `#[fixture]` macro generates types that cannot have doc comments attached
#![allow(
    missing_docs,
    reason = "Generated fixture types cannot have doc comments attached"
)]

use anyhow::{Context, Result};
use rest_steps::Scenario;
use rstest::fixture;
use rstest_bdd::Slot;
use std::cell::RefCell;
use test_support::domain;
use test_support::{RecordedRequest, StubServer, spawn_stub_server};

/// Combined test world for all BDD scenarios.
#[derive(Default)]
pub struct TestWorld {
    /// Stub API answering scripted replies (non-Clone).
    pub server: RefCell<Option<StubServer>>,
    /// Step library state for the running scenario (non-Clone).
    pub scenario: RefCell<Option<Scenario>>,
    /// Message of the last step expected to fail.
    pub step_error: Slot<String>,
}

impl TestWorld {
    /// Run `f` against the stub server, starting it if needed.
    pub fn with_server<R>(&self, f: impl FnOnce(&StubServer) -> R) -> R {
        let mut slot = self.server.borrow_mut();
        let server = slot.get_or_insert_with(|| spawn_stub_server(Vec::new()));
        f(server)
    }

    /// Run `f` against the scenario, building it against the stub server
    /// on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the blog configuration does not build.
    pub fn with_scenario<R>(&self, f: impl FnOnce(&mut Scenario) -> R) -> Result<R> {
        let mut slot = self.scenario.borrow_mut();
        if slot.is_none() {
            let url = self.with_server(StubServer::url);
            let scenario = Scenario::builder(domain::config(&url))
                .with_store(Box::new(domain::store()))
                .build()
                .context("build scenario")?;
            *slot = Some(scenario);
        }
        let scenario = slot.as_mut().context("scenario missing")?;
        Ok(f(scenario))
    }

    /// Requests the stub has received, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.with_server(StubServer::requests)
    }
}

/// Fixture providing a fresh `TestWorld` for each scenario.
#[fixture]
pub fn world() -> TestWorld {
    rest_steps::logging::init_for_tests();
    TestWorld::default()
}

/// Strip surrounding double quotes from a string parameter.
///
/// Depending on the placeholder, rstest-bdd may capture quoted strings
/// including the quotes, so steps strip them before use.
#[must_use]
pub fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|stripped| stripped.strip_suffix('"'))
        .unwrap_or(s)
}
