//! Tracing subscriber setup.
//!
//! Steps log through `tracing`; nothing is printed unless a subscriber is
//! installed. The binary installs one with [`init`], test harnesses with
//! [`init_for_tests`].

use std::io;
use tracing::Level;
use tracing_subscriber::fmt;

/// Most verbose level emitted for the given verbosity flag.
#[must_use]
pub const fn max_level(verbose: bool) -> Level {
    if verbose { Level::DEBUG } else { Level::ERROR }
}

/// Install the global subscriber writing to stderr.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init(verbose: bool) {
    fmt()
        .with_max_level(max_level(verbose))
        .with_writer(io::stderr)
        .init();
}

/// Install a debug-level subscriber captured by the test harness. Later
/// calls leave the first subscriber in place.
pub fn init_for_tests() {
    if fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init()
        .is_err()
    {
        tracing::trace!("test subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(true, Level::DEBUG)]
    #[case(false, Level::ERROR)]
    fn verbosity_selects_level(#[case] verbose: bool, #[case] expected: Level) {
        assert_eq!(max_level(verbose), expected);
    }

    #[test]
    fn test_subscriber_installs_once() {
        init_for_tests();
        init_for_tests();
        tracing::debug!("still logging");
    }
}
