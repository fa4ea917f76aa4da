// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Fixed-window limiter over a shared key-value store.
//!
//! One atomic increment-with-expiry per request. The first increment of a
//! key starts its window; the store expires the key when the window ends.

use tracing::{debug, warn};
use warden_config::{FailurePolicy, LimitRule};
use warden_core::{CallContext, SharedClock, SharedKv};

use super::RateLimitDecision;
use crate::error::RateLimitError;
use crate::store_access::StoreAccess;

/// Limiter whose counters are shared by every instance.
#[derive(Clone)]
pub struct SharedRateLimiter {
    kv: SharedKv,
    rule: LimitRule,
    policy: FailurePolicy,
    namespace: String,
    clock: SharedClock,
    access: StoreAccess,
}

impl SharedRateLimiter {
    /// Creates a limiter enforcing `rule` with counters under `namespace`.
    pub fn new(
        kv: SharedKv,
        rule: LimitRule,
        policy: FailurePolicy,
        namespace: impl Into<String>,
        clock: SharedClock,
    ) -> Self {
        Self {
            kv,
            rule,
            policy,
            namespace: namespace.into(),
            clock,
            access: StoreAccess::default(),
        }
    }

    /// Replaces store timeout settings.
    pub fn with_store_access(mut self, access: StoreAccess) -> Self {
        self.access = access;
        self
    }

    /// The enforced rule.
    pub fn rule(&self) -> LimitRule {
        self.rule
    }

    /// The policy applied when the store is unreachable.
    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Counts one request against `key`.
    pub async fn allow(
        &self,
        cx: &CallContext,
        key: &str,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let counter_key = format!("{}:{}", self.namespace, key);
        let window = self.rule.window();
        let limit = self.rule.limit;

        let outcome = self
            .access
            .write(
                cx,
                "incr_with_expiry",
                self.kv.incr_with_expiry(cx, &counter_key, window),
            )
            .await;

        let now = self.clock.now();
        match outcome {
            Ok(counter) => {
                let reset_at =
                    now + chrono::Duration::from_std(counter.ttl).unwrap_or(chrono::Duration::zero());
                let remaining = u64::from(limit).saturating_sub(counter.count) as u32;
                if counter.count <= u64::from(limit) {
                    Ok(RateLimitDecision::allowed(limit, remaining, reset_at))
                } else {
                    debug!(key = %counter_key, count = counter.count, limit, "Shared rate limit exceeded");
                    Ok(RateLimitDecision::denied(limit, reset_at))
                }
            }
            Err(err) if err.is_cancelled() => Err(err.into()),
            Err(err) if self.policy.admits() => {
                warn!(key = %counter_key, error = %err, "Rate-limit store unavailable; admitting (fail-open)");
                let reset_at = now
                    + chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());
                Ok(RateLimitDecision::allowed(limit, limit, reset_at))
            }
            Err(err) => {
                warn!(key = %counter_key, error = %err, "Rate-limit store unavailable; denying (fail-closed)");
                Err(err.into())
            }
        }
    }
}

impl std::fmt::Debug for SharedRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRateLimiter")
            .field("namespace", &self.namespace)
            .field("rule", &self.rule)
            .field("policy", &self.policy)
            .finish()
    }
}
