//! Unit tests for configuration loading and graceful degradation
//!
//! Covers:
//! - Missing TOML file → warning + defaults
//! - Malformed TOML file → configuration error
//! - Backend URL priority: CLI → DUO_BACKEND_URL → TOML → default
//! - Config file priority: explicit path → DUO_CONFIG
//!
//! Note: Uses serial_test to prevent ENV variable race conditions. Tests that
//! touch DUO_BACKEND_URL or DUO_CONFIG are marked #[serial].

use duo_common::config::{
    config_file_path, load_toml, load_toml_or_default, resolve, resolve_backend_url, TomlConfig,
    BACKEND_URL_ENV, CONFIG_PATH_ENV, DEFAULT_BACKEND_URL,
};
use duo_common::feedback::MissingFeedbackPolicy;
use duo_common::sample::{LayoutKind, SampleLayout};
use duo_common::Error;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).expect("Failed to write config");
    path
}

#[test]
fn test_defaults() {
    let config = TomlConfig::default();
    assert!(config.backend_url.is_none());
    assert_eq!(config.done_unlocks_after, 8);
    assert_eq!(config.total_scenarios, 5);
    assert_eq!(config.logging.level, "info");

    let settings = config.session_settings();
    assert_eq!(settings.layout.kind, LayoutKind::Interact);
    assert!(settings.layout.id_in_feedback);
    assert_eq!(settings.layout, SampleLayout::interact());
    assert_eq!(settings.missing_feedback, MissingFeedbackPolicy::Strict);
}

#[test]
fn test_load_full_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
backend_url = "http://study.example.org/duo/api"
done_unlocks_after = 3
total_scenarios = 4

[sample]
layout = "clean"
id_in_feedback = false
missing_feedback = "lenient"

[logging]
level = "debug"
"#,
    );

    let config = load_toml(&path).unwrap();
    assert_eq!(
        config.backend_url.as_deref(),
        Some("http://study.example.org/duo/api")
    );
    let settings = config.session_settings();
    assert_eq!(settings.done_unlocks_after, 3);
    assert_eq!(settings.total_scenarios, 4);
    assert_eq!(settings.layout.kind, LayoutKind::Clean);
    assert!(!settings.layout.id_in_feedback);
    assert_eq!(settings.missing_feedback, MissingFeedbackPolicy::Lenient);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_partial_file_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[logging]\nlevel = \"warn\"\n");

    let config = load_toml(&path).unwrap();
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.done_unlocks_after, 8);
    assert_eq!(config.sample.layout, LayoutKind::Interact);
}

#[test]
fn test_malformed_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "done_unlocks_after = \"many\"\n");

    let err = load_toml(&path).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "got {:?}", err);
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let config = load_toml_or_default(Some(&path)).unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(load_toml_or_default(None).unwrap(), TomlConfig::default());
}

#[test]
#[serial]
fn test_backend_url_priority() {
    env::remove_var(BACKEND_URL_ENV);
    let toml = TomlConfig {
        backend_url: Some("http://toml.example.org/api/".to_string()),
        ..TomlConfig::default()
    };

    assert_eq!(resolve_backend_url(None, &TomlConfig::default()), DEFAULT_BACKEND_URL);
    assert_eq!(resolve_backend_url(None, &toml), "http://toml.example.org/api");

    env::set_var(BACKEND_URL_ENV, "http://env.example.org/api");
    assert_eq!(resolve_backend_url(None, &toml), "http://env.example.org/api");
    assert_eq!(
        resolve_backend_url(Some("http://cli.example.org/api"), &toml),
        "http://cli.example.org/api"
    );

    // Cleanup
    env::remove_var(BACKEND_URL_ENV);
}

#[test]
#[serial]
fn test_config_path_from_env() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "total_scenarios = 2\n");
    env::set_var(CONFIG_PATH_ENV, &path);

    assert_eq!(config_file_path(None), Some(path.clone()));

    let explicit = dir.path().join("other.toml");
    assert_eq!(config_file_path(Some(&explicit)), Some(explicit));

    // Cleanup
    env::remove_var(CONFIG_PATH_ENV);
}

#[test]
#[serial]
fn test_resolve_rejects_non_http_url() {
    env::remove_var(BACKEND_URL_ENV);
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    let err = resolve(Some("ftp://study.example.org"), Some(&path)).unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let config = resolve(Some("https://study.example.org/api"), Some(&path)).unwrap();
    assert_eq!(config.backend_url, "https://study.example.org/api");
    assert_eq!(config.log_level, "info");
}
