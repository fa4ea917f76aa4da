// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Fixed-window rate limiting.
//!
//! At most `limit` admissions per `window` per key. The window is fixed,
//! not sliding, so a caller can get up to `2 * limit` requests through
//! around a window boundary.
//!
//! The backend is chosen once at construction:
//!
//! - [`LocalRateLimiter`]: counters in this process only
//! - [`SharedRateLimiter`]: counters in a shared key-value store

pub mod local;
pub mod shared;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_config::{ConfigError, ConfigResult, LimitRule, RateLimitBackend, RateLimitConfig};
use warden_core::{CallContext, SharedClock, SharedKv};

pub use local::LocalRateLimiter;
pub use shared::SharedRateLimiter;

use crate::error::RateLimitError;
use crate::store_access::StoreAccess;

// =============================================================================
// RateLimitDecision
// =============================================================================

/// Outcome of one [`RateLimiter::allow`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// Admissions per window.
    pub limit: u32,
    /// Admissions left in the current window.
    pub remaining: u32,
    /// When the current window ends.
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// An admitting decision.
    pub fn allowed(limit: u32, remaining: u32, reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_at,
        }
    }

    /// A denying decision.
    pub fn denied(limit: u32, reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_at,
        }
    }

    /// `X-RateLimit-*` response header pairs.
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
            ("X-RateLimit-Reset", self.reset_at.timestamp().to_string()),
        ]
    }
}

// =============================================================================
// RateLimiter
// =============================================================================

/// A limiter on either backend.
#[derive(Debug, Clone)]
pub enum RateLimiter {
    /// Per-instance counters.
    Local(LocalRateLimiter),
    /// Shared counters.
    Shared(SharedRateLimiter),
}

impl RateLimiter {
    /// Builds a limiter for `rule` on the backend named in `config`.
    ///
    /// `class` namespaces shared counters so route classes never share a
    /// key.
    pub fn from_rule(
        rule: LimitRule,
        class: &str,
        config: &RateLimitConfig,
        kv: Option<SharedKv>,
        clock: SharedClock,
        access: StoreAccess,
    ) -> ConfigResult<Self> {
        match config.backend {
            RateLimitBackend::Memory => Ok(Self::Local(LocalRateLimiter::new(rule, clock))),
            RateLimitBackend::Shared => {
                let kv = kv.ok_or_else(|| {
                    ConfigError::validation(
                        "rate_limit.backend",
                        "shared backend requires a key-value store",
                    )
                })?;
                let policy = config.failure_policy.ok_or_else(|| {
                    ConfigError::missing_field("rate_limit.failure_policy")
                })?;
                let namespace = format!("{}:{}", config.key_prefix, class);
                Ok(Self::Shared(
                    SharedRateLimiter::new(kv, rule, policy, namespace, clock)
                        .with_store_access(access),
                ))
            }
        }
    }

    /// Counts one request against `key`.
    pub async fn allow(
        &self,
        cx: &CallContext,
        key: &str,
    ) -> Result<RateLimitDecision, RateLimitError> {
        match self {
            RateLimiter::Local(limiter) => Ok(limiter.allow(key)),
            RateLimiter::Shared(limiter) => limiter.allow(cx, key).await,
        }
    }

    /// The enforced rule.
    pub fn rule(&self) -> LimitRule {
        match self {
            RateLimiter::Local(limiter) => limiter.rule(),
            RateLimiter::Shared(limiter) => limiter.rule(),
        }
    }

    /// The in-process limiter, if that is the backend.
    pub fn as_local(&self) -> Option<&LocalRateLimiter> {
        match self {
            RateLimiter::Local(limiter) => Some(limiter),
            RateLimiter::Shared(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use warden_config::FailurePolicy;
    use warden_core::{ManualClock, MemoryKvStore};

    #[test]
    fn test_headers() {
        let reset_at = DateTime::from_timestamp(1_700_000_060, 0).unwrap();
        let decision = RateLimitDecision::allowed(5, 3, reset_at);
        let headers = decision.headers();
        assert_eq!(headers[0], ("X-RateLimit-Limit", "5".to_string()));
        assert_eq!(headers[1], ("X-RateLimit-Remaining", "3".to_string()));
        assert_eq!(headers[2], ("X-RateLimit-Reset", "1700000060".to_string()));
    }

    #[test]
    fn test_from_rule_backends() {
        let rule = LimitRule::new(5, Duration::from_secs(60));
        let clock = Arc::new(ManualClock::default());

        let local = RateLimiter::from_rule(
            rule,
            "default",
            &RateLimitConfig::default(),
            None,
            clock.clone(),
            StoreAccess::default(),
        )
        .unwrap();
        assert!(local.as_local().is_some());

        let mut config = RateLimitConfig {
            backend: RateLimitBackend::Shared,
            ..Default::default()
        };
        assert!(RateLimiter::from_rule(
            rule,
            "default",
            &config,
            Some(Arc::new(MemoryKvStore::new())),
            clock.clone(),
            StoreAccess::default(),
        )
        .is_err());

        config.failure_policy = Some(FailurePolicy::FailOpen);
        assert!(RateLimiter::from_rule(rule, "default", &config, None, clock.clone(), StoreAccess::default()).is_err());

        let shared = RateLimiter::from_rule(
            rule,
            "default",
            &config,
            Some(Arc::new(MemoryKvStore::new())),
            clock,
            StoreAccess::default(),
        )
        .unwrap();
        assert!(shared.as_local().is_none());
        assert_eq!(shared.rule(), rule);
    }
}
