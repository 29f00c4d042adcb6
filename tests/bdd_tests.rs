//! BDD test entry point using rstest-bdd.
//!
//! This file serves as the main test binary that discovers and runs all BDD
//! scenarios from the feature files. The scenarios! macro generates test
//! functions for each scenario found in the feature directory.

mod bdd;

// Re-export fixtures for scenario functions
pub use bdd::fixtures::*;

use rstest_bdd_macros::scenarios;

// The fixtures parameter ensures TestWorld is injected into each generated test
scenarios!("tests/features", fixtures = [world: TestWorld]);
