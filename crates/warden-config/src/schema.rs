// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for warden.
//!
//! # Schema Structure
//!
//! ```text
//! WardenConfig
//! ├── token: TokenConfig
//! ├── permissions: PermissionConfig
//! ├── rate_limit: RateLimitConfig
//! │   ├── default: LimitRule
//! │   ├── source: Option<LimitRule>
//! │   └── routes: HashMap<String, RouteRule>
//! ├── store: StoreConfig
//! └── logging: LoggingConfig
//! ```
//!
//! The configuration is validated once when loaded and is immutable
//! afterwards; services take the sections they need by value.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

// =============================================================================
// Constants
// =============================================================================

/// Minimum signing secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Default access token lifetime (15 minutes).
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 900;

/// Default refresh token lifetime (7 days).
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 7 * 24 * 3600;

/// Upper bound on access token lifetime (1 day).
pub const DEFAULT_MAX_ACCESS_TTL_SECS: u64 = 24 * 3600;

/// Upper bound on refresh token lifetime (30 days).
pub const DEFAULT_MAX_REFRESH_TTL_SECS: u64 = 30 * 24 * 3600;

/// Largest accepted clock-skew leeway.
pub const MAX_LEEWAY_SECS: u64 = 300;

/// Default permission cache TTL.
pub const DEFAULT_PERMISSION_CACHE_TTL_SECS: u64 = 30;

/// Largest permission cache TTL.
pub const MAX_PERMISSION_CACHE_TTL_SECS: u64 = 300;

/// Default store call timeout.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 3000;

/// Accepted store call timeout range.
pub const STORE_TIMEOUT_RANGE_MS: (u64, u64) = (100, 5000);

/// Default per-principal request limit.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Default rate-limit window.
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 60;

/// Upper bound on how many idle windows a bucket may outlive before sweeping.
pub const MAX_IDLE_WINDOWS: u32 = 1000;

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure for warden.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WardenConfig {
    /// Token signing and lifetime settings.
    #[serde(default)]
    pub token: TokenConfig,

    /// Permission resolution settings.
    #[serde(default)]
    pub permissions: PermissionConfig,

    /// Rate limiting settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// External store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WardenConfig {
    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.token.validate()?;
        self.permissions.validate()?;
        self.rate_limit.validate()?;
        self.store.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

// =============================================================================
// Token Configuration
// =============================================================================

/// Token signing and lifetime settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    /// HMAC signing secret. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub secret: Option<SecretValue>,

    /// `iss` claim written and required.
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Signing algorithm.
    #[serde(default)]
    pub algorithm: SigningAlgorithm,

    /// Access token lifetime.
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: u64,

    /// Refresh token lifetime.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,

    /// Longest access lifetime a token may claim.
    #[serde(default = "default_max_access_ttl")]
    pub max_access_ttl_secs: u64,

    /// Longest refresh lifetime a token may claim.
    #[serde(default = "default_max_refresh_ttl")]
    pub max_refresh_ttl_secs: u64,

    /// Clock-skew tolerance on `nbf`/`exp`.
    #[serde(default)]
    pub leeway_secs: u64,

    /// Make refresh tokens single-use.
    #[serde(default)]
    pub rotate_refresh_tokens: bool,

    /// Track revoked token ids until they expire.
    #[serde(default)]
    pub revocation_enabled: bool,
}

fn default_issuer() -> String {
    "warden".to_string()
}

fn default_access_ttl() -> u64 {
    DEFAULT_ACCESS_TTL_SECS
}

fn default_refresh_ttl() -> u64 {
    DEFAULT_REFRESH_TTL_SECS
}

fn default_max_access_ttl() -> u64 {
    DEFAULT_MAX_ACCESS_TTL_SECS
}

fn default_max_refresh_ttl() -> u64 {
    DEFAULT_MAX_REFRESH_TTL_SECS
}

impl TokenConfig {
    /// Creates a configuration with the given secret and default lifetimes.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(SecretValue::new(secret)),
            ..Default::default()
        }
    }

    /// Sets the issuer.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Sets the access token lifetime.
    pub fn access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl_secs = ttl.as_secs();
        self
    }

    /// Sets the refresh token lifetime.
    pub fn refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl_secs = ttl.as_secs();
        self
    }

    /// Enables or disables refresh rotation.
    pub fn rotate_refresh_tokens(mut self, enabled: bool) -> Self {
        self.rotate_refresh_tokens = enabled;
        self
    }

    /// Enables or disables the revocation denylist.
    pub fn revocation(mut self, enabled: bool) -> Self {
        self.revocation_enabled = enabled;
        self
    }

    /// Validates the token configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let secret = self
            .secret
            .as_ref()
            .ok_or_else(|| ConfigError::missing_field("token.secret"))?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::validation(
                "token.secret",
                format!("must be at least {MIN_SECRET_LEN} bytes"),
            ));
        }
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::validation("token.issuer", "cannot be empty"));
        }
        if self.access_ttl_secs == 0 || self.access_ttl_secs > self.max_access_ttl_secs {
            return Err(ConfigError::out_of_range(
                "token.access_ttl_secs",
                self.access_ttl_secs,
                1,
                self.max_access_ttl_secs,
            ));
        }
        if self.refresh_ttl_secs == 0 || self.refresh_ttl_secs > self.max_refresh_ttl_secs {
            return Err(ConfigError::out_of_range(
                "token.refresh_ttl_secs",
                self.refresh_ttl_secs,
                1,
                self.max_refresh_ttl_secs,
            ));
        }
        if self.leeway_secs > MAX_LEEWAY_SECS {
            return Err(ConfigError::out_of_range(
                "token.leeway_secs",
                self.leeway_secs,
                0,
                MAX_LEEWAY_SECS,
            ));
        }
        Ok(())
    }

    /// Access token lifetime.
    pub fn access_ttl_duration(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    /// Refresh token lifetime.
    pub fn refresh_ttl_duration(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }

    /// Whether any feature needs the shared key-value store.
    pub fn needs_kv_store(&self) -> bool {
        self.rotate_refresh_tokens || self.revocation_enabled
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: None,
            issuer: default_issuer(),
            algorithm: SigningAlgorithm::default(),
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            max_access_ttl_secs: DEFAULT_MAX_ACCESS_TTL_SECS,
            max_refresh_ttl_secs: DEFAULT_MAX_REFRESH_TTL_SECS,
            leeway_secs: 0,
            rotate_refresh_tokens: false,
            revocation_enabled: false,
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("issuer", &self.issuer)
            .field("algorithm", &self.algorithm)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("leeway_secs", &self.leeway_secs)
            .field("rotate_refresh_tokens", &self.rotate_refresh_tokens)
            .field("revocation_enabled", &self.revocation_enabled)
            .finish()
    }
}

/// Symmetric signing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// HMAC using SHA-256.
    #[default]
    HS256,
    /// HMAC using SHA-384.
    HS384,
    /// HMAC using SHA-512.
    HS512,
}

impl SigningAlgorithm {
    /// The JOSE `alg` header value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Permission Configuration
// =============================================================================

/// What to do when a dependency is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Admit and log.
    FailOpen,
    /// Deny.
    #[default]
    FailClosed,
}

impl FailurePolicy {
    /// Returns `true` for [`FailurePolicy::FailOpen`].
    pub fn admits(&self) -> bool {
        matches!(self, Self::FailOpen)
    }
}

/// Permission resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionConfig {
    /// How long an expansion stays cached.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Gate behaviour when resolution fails.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Retry transient read failures once.
    #[serde(default = "default_true")]
    pub retry_reads: bool,

    /// Pause before the retry.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_cache_ttl() -> u64 {
    DEFAULT_PERMISSION_CACHE_TTL_SECS
}

fn default_true() -> bool {
    true
}

fn default_retry_backoff() -> u64 {
    50
}

impl PermissionConfig {
    /// Validates the permission configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=MAX_PERMISSION_CACHE_TTL_SECS).contains(&self.cache_ttl_secs) {
            return Err(ConfigError::out_of_range(
                "permissions.cache_ttl_secs",
                self.cache_ttl_secs,
                1,
                MAX_PERMISSION_CACHE_TTL_SECS,
            ));
        }
        if self.retry_backoff_ms > 1000 {
            return Err(ConfigError::out_of_range(
                "permissions.retry_backoff_ms",
                self.retry_backoff_ms,
                0,
                1000,
            ));
        }
        Ok(())
    }

    /// Cache TTL as a duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Retry backoff as a duration.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_PERMISSION_CACHE_TTL_SECS,
            failure_policy: FailurePolicy::FailClosed,
            retry_reads: true,
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

// =============================================================================
// Rate Limit Configuration
// =============================================================================

/// Where rate-limit counters live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitBackend {
    /// In-process bucket map; per instance.
    #[default]
    Memory,
    /// Shared key-value store; one counter per key across instances.
    Shared,
}

/// What identifies a caller for a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyBy {
    /// The authenticated principal.
    #[default]
    Principal,
    /// The source network address.
    Source,
}

/// A quota: `limit` admissions per `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitRule {
    /// Admissions per window.
    pub limit: u32,
    /// Window length.
    #[serde(default = "default_window")]
    pub window_secs: u64,
}

fn default_window() -> u64 {
    DEFAULT_RATE_WINDOW_SECS
}

impl LimitRule {
    /// Creates a rule.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window_secs: window.as_secs(),
        }
    }

    /// Window as a duration.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Validates the rule; `field` prefixes error messages.
    pub fn validate(&self, field: &str) -> ConfigResult<()> {
        if self.limit == 0 {
            return Err(ConfigError::validation(
                format!("{field}.limit"),
                "cannot be zero",
            ));
        }
        if !(1..=86_400).contains(&self.window_secs) {
            return Err(ConfigError::out_of_range(
                format!("{field}.window_secs"),
                self.window_secs,
                1,
                86_400,
            ));
        }
        Ok(())
    }
}

impl Default for LimitRule {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RATE_LIMIT,
            window_secs: DEFAULT_RATE_WINDOW_SECS,
        }
    }
}

/// A named route class with its own quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteRule {
    /// Admissions per window.
    pub limit: u32,
    /// Window length.
    #[serde(default = "default_window")]
    pub window_secs: u64,
    /// What the quota is keyed by.
    #[serde(default)]
    pub key: KeyBy,
}

impl RouteRule {
    /// Creates a route rule.
    pub fn new(rule: LimitRule, key: KeyBy) -> Self {
        Self {
            limit: rule.limit,
            window_secs: rule.window_secs,
            key,
        }
    }

    /// The quota part of the rule.
    pub fn rule(&self) -> LimitRule {
        LimitRule {
            limit: self.limit,
            window_secs: self.window_secs,
        }
    }
}

/// Rate limiting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Whether rate limiting is applied at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Counter storage.
    #[serde(default)]
    pub backend: RateLimitBackend,

    /// Behaviour when the shared store is unreachable. Required for the
    /// shared backend.
    #[serde(default)]
    pub failure_policy: Option<FailurePolicy>,

    /// Per-principal quota for routes without their own class.
    #[serde(default)]
    pub default: LimitRule,

    /// Coarse per-address quota applied before authentication.
    #[serde(default = "default_source_rule")]
    pub source: Option<LimitRule>,

    /// Named route classes.
    #[serde(default)]
    pub routes: HashMap<String, RouteRule>,

    /// How often idle in-process buckets are swept.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Buckets untouched for this many windows are swept.
    #[serde(default = "default_idle_windows")]
    pub idle_windows: u32,

    /// Key namespace for counters.
    #[serde(default = "default_rate_key_prefix")]
    pub key_prefix: String,
}

fn default_source_rule() -> Option<LimitRule> {
    Some(LimitRule {
        limit: 300,
        window_secs: DEFAULT_RATE_WINDOW_SECS,
    })
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_idle_windows() -> u32 {
    3
}

fn default_rate_key_prefix() -> String {
    "rl".to_string()
}

impl RateLimitConfig {
    /// Validates the rate limit configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.backend == RateLimitBackend::Shared && self.failure_policy.is_none() {
            return Err(ConfigError::validation(
                "rate_limit.failure_policy",
                "must be set to fail_open or fail_closed when backend is shared",
            ));
        }
        self.default.validate("rate_limit.default")?;
        if let Some(source) = &self.source {
            source.validate("rate_limit.source")?;
        }
        for (name, route) in &self.routes {
            if name.trim().is_empty() {
                return Err(ConfigError::validation(
                    "rate_limit.routes",
                    "route class names cannot be empty",
                ));
            }
            route.rule().validate(&format!("rate_limit.routes.{name}"))?;
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::validation(
                "rate_limit.sweep_interval_secs",
                "cannot be zero",
            ));
        }
        if self.idle_windows == 0 || self.idle_windows > MAX_IDLE_WINDOWS {
            return Err(ConfigError::out_of_range(
                "rate_limit.idle_windows",
                self.idle_windows,
                1,
                MAX_IDLE_WINDOWS,
            ));
        }
        Ok(())
    }

    /// Effective failure policy; fail-closed unless configured otherwise.
    pub fn effective_failure_policy(&self) -> FailurePolicy {
        self.failure_policy.unwrap_or_default()
    }

    /// Sweep interval as a duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: RateLimitBackend::Memory,
            failure_policy: None,
            default: LimitRule::default(),
            source: default_source_rule(),
            routes: HashMap::new(),
            sweep_interval_secs: default_sweep_interval(),
            idle_windows: default_idle_windows(),
            key_prefix: default_rate_key_prefix(),
        }
    }
}

// =============================================================================
// Store Configuration
// =============================================================================

/// External store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Bound on every directory or key-value call.
    #[serde(default = "default_store_timeout")]
    pub timeout_ms: u64,

    /// Redis URL for the shared key-value store.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Namespace for every shared key.
    #[serde(default = "default_store_prefix")]
    pub key_prefix: String,
}

fn default_store_timeout() -> u64 {
    DEFAULT_STORE_TIMEOUT_MS
}

fn default_store_prefix() -> String {
    "warden".to_string()
}

impl StoreConfig {
    /// Validates the store configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let (min, max) = STORE_TIMEOUT_RANGE_MS;
        if !(min..=max).contains(&self.timeout_ms) {
            return Err(ConfigError::out_of_range(
                "store.timeout_ms",
                self.timeout_ms,
                min,
                max,
            ));
        }
        if let Some(url) = &self.redis_url {
            if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
                return Err(ConfigError::validation(
                    "store.redis_url",
                    "must start with redis:// or rediss://",
                ));
            }
        }
        Ok(())
    }

    /// Call timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            redis_url: None,
            key_prefix: default_store_prefix(),
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Validates the logging configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// The filter directive for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Single-line compact text.
    Compact,
    /// JSON for log aggregation.
    Json,
}

// =============================================================================
// Secret Value
// =============================================================================

/// A secret that never prints.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretValue(String);

impl SecretValue {
    /// Wraps a secret.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-that-is-long-enough-for-testing";

    fn valid() -> WardenConfig {
        WardenConfig {
            token: TokenConfig::with_secret(SECRET),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_validate_with_secret() {
        let config = valid();
        assert!(config.validate().is_ok());
        assert_eq!(config.token.access_ttl_secs, 900);
        assert_eq!(config.permissions.failure_policy, FailurePolicy::FailClosed);
        assert_eq!(config.rate_limit.backend, RateLimitBackend::Memory);
        assert!(!config.token.rotate_refresh_tokens);
    }

    #[test]
    fn test_missing_secret() {
        let err = WardenConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }

    #[test]
    fn test_short_secret() {
        let mut config = valid();
        config.token.secret = Some(SecretValue::new("short"));
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), Some("token.secret"));
    }

    #[test]
    fn test_access_ttl_bounded_by_max() {
        let mut config = valid();
        config.token.access_ttl_secs = config.token.max_access_ttl_secs + 1;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::OutOfRange { .. }
        ));
    }

    #[test]
    fn test_shared_backend_requires_policy() {
        let mut config = valid();
        config.rate_limit.backend = RateLimitBackend::Shared;
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), Some("rate_limit.failure_policy"));

        config.rate_limit.failure_policy = Some(FailurePolicy::FailOpen);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_store_timeout_bounds() {
        let mut config = valid();
        config.store.timeout_ms = 10_000;
        assert!(config.validate().is_err());
        config.store.timeout_ms = 2_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_idle_windows_bounds() {
        let mut config = valid();
        config.rate_limit.idle_windows = 0;
        assert_eq!(config.validate().unwrap_err().field(), Some("rate_limit.idle_windows"));
        config.rate_limit.idle_windows = u32::MAX;
        assert_eq!(config.validate().unwrap_err().field(), Some("rate_limit.idle_windows"));
        config.rate_limit.idle_windows = MAX_IDLE_WINDOWS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_route_rule_validation() {
        let mut config = valid();
        config.rate_limit.routes.insert(
            "login".to_string(),
            RouteRule::new(LimitRule::new(0, Duration::from_secs(60)), KeyBy::Source),
        );
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), Some("rate_limit.routes.login.limit"));
    }

    #[test]
    fn test_secret_redacted() {
        let config = TokenConfig::with_secret(SECRET);
        let debug = format!("{config:?}");
        assert!(!debug.contains(SECRET));
        assert!(debug.contains("REDACTED"));

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains(SECRET));
    }
}
