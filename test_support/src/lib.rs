//! Shared fixtures for the integration and behaviour tests.
//!
//! Provides a scripted HTTP stub server, a small blog domain with its
//! configuration, and scoped environment variable changes.

pub mod domain;
pub mod env;
pub mod http;

pub use http::{RecordedRequest, StubResponse, StubServer, spawn_stub_server};

use camino::Utf8PathBuf;
use std::fs;
use tempfile::TempDir;

/// Write `yaml` to `rest-steps.yml` in a fresh temporary directory.
///
/// Returns the directory, which must outlive the file, and the file path.
pub fn write_config(yaml: &str) -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("rest-steps.yml"))
        .expect("temp dir path is UTF-8");
    fs::write(&path, yaml).expect("write configuration");
    (dir, path)
}
