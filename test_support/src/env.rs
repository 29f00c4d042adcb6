//! Scoped environment variable changes for tests.
//!
//! `std::env::set_var` and `remove_var` are `unsafe` in Rust 2024 because they
//! mutate process-global state. [`EnvVarGuard`] holds a process-wide lock for
//! its whole lifetime, so tests touching variables such as
//! `REST_STEPS_BASE_URI` run one at a time, and restores the previous value
//! on drop.
//!
//! ```rust,ignore
//! use test_support::env::EnvVarGuard;
//!
//! let _guard = EnvVarGuard::set("REST_STEPS_BASE_URI", "http://b.test");
//! // `_guard` is dropped here and restores the previous value.
//! ```

use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// RAII guard resetting an environment variable to its previous value.
#[derive(Debug)]
pub struct EnvVarGuard {
    name: &'static str,
    prev: Option<OsString>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvVarGuard {
    fn acquire(name: &'static str) -> (MutexGuard<'static, ()>, Option<OsString>) {
        let lock = ENV_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        (lock, std::env::var_os(name))
    }

    /// Set `name` to `val` until the guard drops.
    #[must_use]
    pub fn set(name: &'static str, val: &str) -> Self {
        let (lock, prev) = Self::acquire(name);
        // SAFETY: `ENV_LOCK` serialises mutations of the process environment.
        unsafe { std::env::set_var(name, val) };
        Self {
            name,
            prev,
            _lock: lock,
        }
    }

    /// Remove `name` until the guard drops.
    #[must_use]
    pub fn remove(name: &'static str) -> Self {
        let (lock, prev) = Self::acquire(name);
        // SAFETY: `ENV_LOCK` serialises mutations of the process environment.
        unsafe { std::env::remove_var(name) };
        Self {
            name,
            prev,
            _lock: lock,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        // SAFETY: the lock is still held while the prior value is restored.
        unsafe {
            match &self.prev {
                Some(value) => std::env::set_var(self.name, value),
                None => std::env::remove_var(self.name),
            }
        }
    }
}
