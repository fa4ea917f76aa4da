// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading for warden.
//!
//! # Loading Pipeline
//!
//! 1. Read the file (YAML, TOML or JSON by extension)
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw text
//! 3. Parse into [`WardenConfig`]
//! 4. Apply `WARDEN_*` environment overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! WARDEN_TOKEN_SECRET=...
//! WARDEN_TOKEN_ISSUER=auth.example.com
//! WARDEN_STORE_REDIS_URL=redis://cache:6379
//! WARDEN_RATE_LIMIT_BACKEND=shared
//! WARDEN_RATE_LIMIT_FAILURE_POLICY=fail_closed
//! WARDEN_LOG_LEVEL=debug
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{
    FailurePolicy, LogLevel, RateLimitBackend, SecretValue, WardenConfig,
};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for warden.
///
/// # Examples
///
/// ```no_run
/// use warden_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("warden.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a loader with the `WARDEN` prefix and env resolution on.
    pub fn new() -> Self {
        Self {
            env_prefix: "WARDEN".to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables placeholder resolution and env overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads and validates configuration from a file.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<WardenConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let format = ConfigFormat::from_path(path)?;

        let config = self
            .load_from_str(&content, format)
            .map_err(|e| match e {
                ConfigError::Serialization { message } => ConfigError::parse(path, message),
                other => other,
            })?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads and validates configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<WardenConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut config: WardenConfig = parse_str(&content, format)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;
        debug!(
            backend = ?config.rate_limit.backend,
            route_classes = config.rate_limit.routes.len(),
            rotation = config.token.rotate_refresh_tokens,
            "Configuration validated"
        );
        Ok(config)
    }

    /// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
    ///
    /// Unknown variables without a default are left in place.
    fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut rest = content;

        while let Some(start) = rest.find("${") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                result.push_str(&rest[start..]);
                return result;
            };

            let body = &after[..end];
            let (name, default) = match body.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (body, None),
            };

            match (env::var(name), default) {
                (Ok(value), _) => result.push_str(&value),
                (Err(_), Some(default)) => result.push_str(default),
                (Err(_), None) => {
                    warn!("Environment variable '{}' not found", name);
                    result.push_str(&rest[start..start + 2 + end + 1]);
                }
            }
            rest = &after[end + 1..];
        }

        result.push_str(rest);
        result
    }

    /// Applies `<PREFIX>_*` environment overrides.
    fn apply_env_overrides(&self, config: &mut WardenConfig) -> ConfigResult<()> {
        let var = |suffix: &str| {
            let name = format!("{}_{}", self.env_prefix, suffix);
            env::var(&name).ok().map(|value| (name, value))
        };

        if let Some((_, value)) = var("TOKEN_SECRET") {
            config.token.secret = Some(SecretValue::new(value));
        }
        if let Some((_, value)) = var("TOKEN_ISSUER") {
            config.token.issuer = value;
        }
        if let Some((_, value)) = var("TOKEN_ROTATE_REFRESH") {
            config.token.rotate_refresh_tokens = parse_bool(&value);
        }
        if let Some((_, value)) = var("STORE_REDIS_URL") {
            config.store.redis_url = Some(value);
        }
        if let Some((name, value)) = var("STORE_TIMEOUT_MS") {
            config.store.timeout_ms = value
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(name, "expected milliseconds"))?;
        }
        if let Some((name, value)) = var("RATE_LIMIT_BACKEND") {
            config.rate_limit.backend = match value.to_lowercase().as_str() {
                "memory" => RateLimitBackend::Memory,
                "shared" => RateLimitBackend::Shared,
                _ => return Err(ConfigError::invalid_env_var(name, "expected memory or shared")),
            };
        }
        if let Some((name, value)) = var("RATE_LIMIT_FAILURE_POLICY") {
            config.rate_limit.failure_policy = Some(parse_policy(&value).ok_or_else(|| {
                ConfigError::invalid_env_var(name, "expected fail_open or fail_closed")
            })?);
        }
        if let Some((_, value)) = var("LOG_LEVEL") {
            if let Some(level) = parse_log_level(&value) {
                config.logging.level = level;
            }
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => yaml_parse(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

/// YAML parsing through the `config` crate.
fn yaml_parse<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enabled"
    )
}

fn parse_policy(value: &str) -> Option<FailurePolicy> {
    match value.to_lowercase().replace('-', "_").as_str() {
        "fail_open" | "open" => Some(FailurePolicy::FailOpen),
        "fail_closed" | "closed" => Some(FailurePolicy::FailClosed),
        _ => None,
    }
}

fn parse_log_level(value: &str) -> Option<LogLevel> {
    match value.to_lowercase().as_str() {
        "trace" => Some(LogLevel::Trace),
        "debug" => Some(LogLevel::Debug),
        "info" => Some(LogLevel::Info),
        "warn" | "warning" => Some(LogLevel::Warn),
        "error" => Some(LogLevel::Error),
        _ => None,
    }
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<WardenConfig> {
    ConfigLoader::new().load(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::KeyBy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const YAML: &str = r#"
token:
  secret: test-secret-key-that-is-long-enough-for-testing
  issuer: auth.test
  access_ttl_secs: 600

rate_limit:
  backend: shared
  failure_policy: fail_open
  default:
    limit: 50
    window_secs: 60
  routes:
    login:
      limit: 5
      window_secs: 60
      key: source

logging:
  level: debug
"#;

    fn loader() -> ConfigLoader {
        // Isolated prefix so ambient WARDEN_* variables cannot leak in.
        ConfigLoader::new().with_env_prefix("WARDEN_LOADER_TEST")
    }

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = loader().load(file.path()).unwrap();
        assert_eq!(config.token.issuer, "auth.test");
        assert_eq!(config.token.access_ttl_secs, 600);
        assert_eq!(config.rate_limit.backend, RateLimitBackend::Shared);
        assert_eq!(config.rate_limit.failure_policy, Some(FailurePolicy::FailOpen));
        assert_eq!(config.rate_limit.default.limit, 50);

        let login = config.rate_limit.routes.get("login").unwrap();
        assert_eq!(login.limit, 5);
        assert_eq!(login.key, KeyBy::Source);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[token]
secret = "test-secret-key-that-is-long-enough-for-testing"
rotate_refresh_tokens = true

[permissions]
cache_ttl_secs = 10
"#;
        let config = loader().load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert!(config.token.rotate_refresh_tokens);
        assert_eq!(config.permissions.cache_ttl_secs, 10);
    }

    #[test]
    fn test_load_json() {
        let json = r#"{"token": {"secret": "test-secret-key-that-is-long-enough-for-testing"}}"#;
        let config = loader().load_from_str(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.token.issuer, "warden");
    }

    #[test]
    fn test_short_secret_rejected_at_load() {
        let json = r#"{"token": {"secret": "too-short"}}"#;
        let err = loader().load_from_str(json, ConfigFormat::Json).unwrap_err();
        assert_eq!(err.field(), Some("token.secret"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = r#"{"token": {"secret": "test-secret-key-that-is-long-enough-for-testing", "sekret": 1}}"#;
        assert!(loader().load_from_str(json, ConfigFormat::Json).is_err());
    }

    #[test]
    fn test_placeholder_default() {
        let resolved = loader()
            .resolve_env_placeholders("url: ${WARDEN_LOADER_TEST_UNSET_VAR:redis://localhost}");
        assert_eq!(resolved, "url: redis://localhost");
    }

    #[test]
    fn test_placeholder_without_default_kept() {
        let resolved = loader().resolve_env_placeholders("a: ${WARDEN_LOADER_TEST_MISSING} b");
        assert_eq!(resolved, "a: ${WARDEN_LOADER_TEST_MISSING} b");
    }

    #[test]
    fn test_placeholder_unterminated() {
        let resolved = loader().resolve_env_placeholders("a: ${OOPS");
        assert_eq!(resolved, "a: ${OOPS");
    }

    #[test]
    fn test_env_override_secret() {
        env::set_var(
            "WARDEN_LOADER_ENV_TOKEN_SECRET",
            "an-override-secret-that-is-long-enough-to-pass",
        );
        let json = r#"{"token": {"secret": "too-short"}}"#;
        let config = ConfigLoader::new()
            .with_env_prefix("WARDEN_LOADER_ENV")
            .load_from_str(json, ConfigFormat::Json)
            .unwrap();
        env::remove_var("WARDEN_LOADER_ENV_TOKEN_SECRET");
        assert_eq!(
            config.token.secret.unwrap().expose(),
            "an-override-secret-that-is-long-enough-to-pass"
        );
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("warden.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("warden.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert!(ConfigFormat::from_path(Path::new("warden.ini")).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = loader().load("/nonexistent/warden.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!(parse_policy("fail-open"), Some(FailurePolicy::FailOpen));
        assert_eq!(parse_policy("FAIL_CLOSED"), Some(FailurePolicy::FailClosed));
        assert_eq!(parse_policy("maybe"), None);
    }
}
