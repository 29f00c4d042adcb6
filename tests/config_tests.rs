//! Tests for loading extension configuration from disk.

#![allow(
    clippy::expect_used,
    reason = "configuration tests use expect for descriptive failures"
)]

use rest_steps::config::{BASE_URI_ENV, ConfigError, ConfigProblem, ExtensionConfig};
use rstest::rstest;
use test_support::domain::CONFIG_YAML;
use test_support::env::EnvVarGuard;
use test_support::write_config;

#[test]
fn loads_blog_configuration_from_disk() {
    let _env = EnvVarGuard::remove(BASE_URI_ENV);
    let (_dir, path) = write_config(CONFIG_YAML);
    let config = ExtensionConfig::from_path(&path).expect("configuration loads");
    assert_eq!(config.api.base_uri, "http://127.0.0.1:9");
    assert_eq!(config.entities.len(), 3);
    assert_eq!(config.entities.class("article").expect("alias resolves"), "Post");
    assert_eq!(config.entities.route("comment").expect("route"), "comments");
    assert!(config.validate().is_ok());
}

#[rstest]
#[case::overrides("http://api.test:8080", "http://api.test:8080")]
#[case::blank_is_ignored("  ", "http://127.0.0.1:9")]
fn environment_overrides_base_uri(#[case] value: &str, #[case] expected: &str) {
    let _env = EnvVarGuard::set(BASE_URI_ENV, value);
    let (_dir, path) = write_config(CONFIG_YAML);
    let config = ExtensionConfig::from_path(&path).expect("configuration loads");
    assert_eq!(config.api.base_uri, expected);
}

#[test]
fn missing_file_reports_path() {
    let (dir, _path) = write_config(CONFIG_YAML);
    let missing = camino::Utf8PathBuf::from_path_buf(dir.path().join("absent.yml"))
        .expect("temp dir path is UTF-8");
    let err = ExtensionConfig::from_path(&missing).expect_err("file is absent");
    assert!(matches!(err, ConfigError::Read { ref path, .. } if *path == missing));
    assert!(err.to_string().contains("absent.yml"));
}

#[test]
fn unknown_keys_are_parse_errors() {
    let err = ExtensionConfig::from_yaml_str("api:\n  base_uri: http://x.test\n  retries: 3\n", "bad.yml")
        .expect_err("unknown key rejected");
    match err {
        ConfigError::Parse { source } => {
            assert!(source.to_string().contains("retries"), "{source}");
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn validation_collects_every_problem() {
    let yaml = "\
api:
  base_uri: not a url
entities:
  post:
    entity: Post
    aliases: [article]
  story:
    entity: Story
    aliases: [article]
";
    let config = ExtensionConfig::from_yaml_str(yaml, "bad.yml").expect("parses");
    let problems = config.problems();
    assert_eq!(problems.len(), 2, "{problems:?}");
    assert!(matches!(problems.first(), Some(ConfigProblem::InvalidBaseUri { .. })));
    assert!(matches!(
        problems.get(1),
        Some(ConfigProblem::AliasCollision { name, .. }) if name == "article"
    ));
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { problems }) if problems.len() == 2));
}
