// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Config Integration Tests
//!
//! Loading configuration files from disk:
//!
//! - YAML, TOML and JSON formats
//! - Placeholder resolution and environment overrides
//! - Validation failures
//!
//! ## Test Categories
//!
//! - `test_config_load_*`: Successful loading
//! - `test_config_env_*`: Environment handling
//! - `test_config_invalid_*`: Rejected configurations

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use warden_config::{
    load_config, ConfigError, ConfigFormat, ConfigLoader, FailurePolicy, KeyBy, LogFormat,
    LogLevel, RateLimitBackend, SigningAlgorithm,
};
use warden_tests::common::*;

fn write_config(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

/// A loader whose environment prefix no other test uses.
fn isolated_loader() -> (ConfigLoader, String) {
    let prefix = unique_test_id().to_uppercase();
    (ConfigLoader::new().with_env_prefix(prefix.clone()), prefix)
}

fn load_isolated(path: &Path) -> Result<warden_config::WardenConfig, ConfigError> {
    isolated_loader().0.load(path)
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_config_load_yaml() {
    init_test_logging();
    let file = write_config(".yaml", sample_yaml());
    let config = load_isolated(file.path()).expect("load yaml");

    assert_eq!(config.token.issuer, "warden-test");
    assert_eq!(config.token.algorithm, SigningAlgorithm::HS256);
    assert_eq!(config.token.refresh_ttl_secs, 86_400);
    assert!(config.token.rotate_refresh_tokens);
    assert_eq!(config.permissions.failure_policy, FailurePolicy::FailClosed);
    assert_eq!(config.rate_limit.backend, RateLimitBackend::Memory);
    assert_eq!(config.rate_limit.source.map(|rule| rule.limit), Some(300));

    let login = config.rate_limit.routes.get("login").expect("login route");
    assert_eq!(login.limit, 5);
    assert_eq!(login.key, KeyBy::Source);

    assert_eq!(config.store.timeout_ms, 1500);
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_config_load_toml() {
    let file = write_config(
        ".toml",
        r#"
[token]
secret = "test-secret-key-that-is-long-enough-for-testing"
algorithm = "HS384"
revocation_enabled = true

[rate_limit]
backend = "shared"
failure_policy = "fail_open"

[rate_limit.default]
limit = 50
window_secs = 10

[store]
redis_url = "redis://127.0.0.1:6379"
"#,
    );
    let config = load_isolated(file.path()).expect("load toml");

    assert_eq!(config.token.algorithm, SigningAlgorithm::HS384);
    assert!(config.token.needs_kv_store());
    assert_eq!(config.rate_limit.backend, RateLimitBackend::Shared);
    assert_eq!(config.rate_limit.failure_policy, Some(FailurePolicy::FailOpen));
    assert_eq!(config.rate_limit.default.limit, 50);
    assert_eq!(config.rate_limit.default.window_secs, 10);
    assert_eq!(config.store.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));
}

#[test]
fn test_config_load_json_with_defaults() {
    let file = write_config(
        ".json",
        r#"{ "token": { "secret": "test-secret-key-that-is-long-enough-for-testing" } }"#,
    );
    let config = load_isolated(file.path()).expect("load json");

    assert_eq!(config.token.issuer, "warden");
    assert_eq!(config.token.access_ttl_secs, 900);
    assert!(!config.token.rotate_refresh_tokens);
    assert_eq!(config.permissions.cache_ttl_secs, 30);
    assert!(config.rate_limit.enabled);
    assert_eq!(config.rate_limit.default.limit, 100);
    assert_eq!(config.store.timeout_ms, 3000);
}

#[test]
fn test_config_load_from_str() {
    let (loader, _) = isolated_loader();
    let config = loader
        .load_from_str(
            r#"{ "token": { "secret": "test-secret-key-that-is-long-enough-for-testing" } }"#,
            ConfigFormat::Json,
        )
        .expect("parse");
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_secret_is_redacted() {
    let file = write_config(".yaml", sample_yaml());
    let config = load_isolated(file.path()).expect("load yaml");

    let debug = format!("{config:?}");
    assert!(!debug.contains(TEST_SECRET));
}

// =============================================================================
// Environment
// =============================================================================

#[test]
fn test_config_env_placeholders() {
    let var = format!("{}_SECRET", unique_test_id().to_uppercase());
    std::env::set_var(&var, "placeholder-secret-that-is-long-enough-ok");

    let file = write_config(
        ".yaml",
        &format!(
            r#"
token:
  secret: "${{{var}}}"
  issuer: "${{{var}_MISSING:fallback-issuer}}"
"#
        ),
    );
    let config = load_isolated(file.path()).expect("load");

    assert_eq!(
        config.token.secret.as_ref().map(|s| s.expose()),
        Some("placeholder-secret-that-is-long-enough-ok")
    );
    assert_eq!(config.token.issuer, "fallback-issuer");
    std::env::remove_var(&var);
}

#[test]
fn test_config_env_overrides() {
    let (loader, prefix) = isolated_loader();
    std::env::set_var(format!("{prefix}_TOKEN_ISSUER"), "auth.example.com");
    std::env::set_var(format!("{prefix}_RATE_LIMIT_BACKEND"), "shared");
    std::env::set_var(format!("{prefix}_RATE_LIMIT_FAILURE_POLICY"), "fail-closed");
    std::env::set_var(format!("{prefix}_LOG_LEVEL"), "warning");

    let file = write_config(".yaml", sample_yaml());
    let config = loader.load(file.path()).expect("load");

    assert_eq!(config.token.issuer, "auth.example.com");
    assert_eq!(config.rate_limit.backend, RateLimitBackend::Shared);
    assert_eq!(config.rate_limit.failure_policy, Some(FailurePolicy::FailClosed));
    assert_eq!(config.logging.level, LogLevel::Warn);

    for suffix in ["TOKEN_ISSUER", "RATE_LIMIT_BACKEND", "RATE_LIMIT_FAILURE_POLICY", "LOG_LEVEL"] {
        std::env::remove_var(format!("{prefix}_{suffix}"));
    }
}

#[test]
fn test_config_env_invalid_override() {
    let (loader, prefix) = isolated_loader();
    let name = format!("{prefix}_STORE_TIMEOUT_MS");
    std::env::set_var(&name, "soon");

    let file = write_config(".yaml", sample_yaml());
    let err = loader.load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { .. }), "{err}");
    std::env::remove_var(&name);
}

#[test]
fn test_config_env_disabled() {
    let var = format!("{}_SECRET", unique_test_id().to_uppercase());
    let file = write_config(
        ".yaml",
        &format!("token:\n  secret: \"${{{var}:this-default-is-never-substituted-in}}\"\n"),
    );

    let config = ConfigLoader::new()
        .with_env_vars(false)
        .load(file.path())
        .expect("literal secret is long enough");
    assert!(config
        .token
        .secret
        .as_ref()
        .map(|s| s.expose().starts_with("${"))
        .unwrap_or(false));
}

// =============================================================================
// Invalid
// =============================================================================

#[test]
fn test_config_invalid_short_secret() {
    let file = write_config(".yaml", "token:\n  secret: \"too-short\"\n");
    let err = load_isolated(file.path()).unwrap_err();
    assert_eq!(err.field(), Some("token.secret"));
}

#[test]
fn test_config_invalid_missing_secret() {
    let file = write_config(".json", "{}");
    let err = load_isolated(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingField { .. }), "{err}");
}

#[test]
fn test_config_invalid_shared_without_policy() {
    let file = write_config(
        ".yaml",
        &format!("token:\n  secret: \"{TEST_SECRET}\"\nrate_limit:\n  backend: shared\n"),
    );
    let err = load_isolated(file.path()).unwrap_err();
    assert_eq!(err.field(), Some("rate_limit.failure_policy"));
}

#[test]
fn test_config_invalid_timeout_bounds() {
    for timeout in [50, 6000] {
        let file = write_config(
            ".yaml",
            &format!("token:\n  secret: \"{TEST_SECRET}\"\nstore:\n  timeout_ms: {timeout}\n"),
        );
        let err = load_isolated(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }), "{err}");
        assert_eq!(err.field(), Some("store.timeout_ms"));
    }
}

#[test]
fn test_config_invalid_route_rule() {
    let file = write_config(
        ".yaml",
        &format!(
            "token:\n  secret: \"{TEST_SECRET}\"\nrate_limit:\n  routes:\n    login:\n      limit: 0\n"
        ),
    );
    let err = load_isolated(file.path()).unwrap_err();
    assert_eq!(err.field(), Some("rate_limit.routes.login.limit"));
}

#[test]
fn test_config_invalid_unknown_field() {
    let file = write_config(
        ".json",
        &format!(r#"{{ "token": {{ "secret": "{TEST_SECRET}", "audience": "x" }} }}"#),
    );
    assert!(matches!(
        load_isolated(file.path()),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_config_invalid_path_and_format() {
    assert!(matches!(
        load_config("/nonexistent/warden.yaml"),
        Err(ConfigError::FileNotFound { .. })
    ));

    let file = write_config(".ini", "token=1");
    assert!(matches!(
        load_isolated(file.path()),
        Err(ConfigError::UnsupportedFormat { .. })
    ));
}
