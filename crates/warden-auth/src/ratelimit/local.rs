// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-process fixed-window limiter.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use warden_config::LimitRule;
use warden_core::SharedClock;

use super::RateLimitDecision;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    window_start: DateTime<Utc>,
    count: u32,
    last_seen: DateTime<Utc>,
}

/// Per-instance counters in a sharded map.
///
/// A bucket is reset lazily by the first call after its window ends. The
/// check and the increment happen under the bucket's shard lock, so
/// concurrent callers on one key never over-admit.
#[derive(Debug, Clone)]
pub struct LocalRateLimiter {
    buckets: Arc<DashMap<String, Bucket>>,
    rule: LimitRule,
    window: chrono::Duration,
    clock: SharedClock,
}

impl LocalRateLimiter {
    /// Creates a limiter enforcing `rule`.
    pub fn new(rule: LimitRule, clock: SharedClock) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            window: chrono::Duration::from_std(rule.window()).unwrap_or(chrono::Duration::MAX),
            rule,
            clock,
        }
    }

    /// The enforced rule.
    pub fn rule(&self) -> LimitRule {
        self.rule
    }

    /// Counts one request against `key`.
    pub fn allow(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.now();
        let mut bucket = self.buckets.entry(key.to_string()).or_insert(Bucket {
            window_start: now,
            count: 0,
            last_seen: now,
        });

        if now >= bucket.window_start + self.window {
            bucket.window_start = now;
            bucket.count = 0;
        }
        bucket.last_seen = now;

        let reset_at = bucket.window_start + self.window;
        let limit = self.rule.limit;
        if bucket.count < limit {
            bucket.count += 1;
            RateLimitDecision::allowed(limit, limit - bucket.count, reset_at)
        } else {
            RateLimitDecision::denied(limit, reset_at)
        }
    }

    /// Removes buckets untouched for `idle_windows` windows.
    pub fn sweep(&self, idle_windows: u32) -> usize {
        let now = self.clock.now();
        let windows = i32::try_from(idle_windows.max(1)).unwrap_or(i32::MAX);
        let idle = self.window.checked_mul(windows).unwrap_or(chrono::Duration::MAX);
        let before = self.buckets.len();
        // A deadline past the calendar range never expires.
        self.buckets.retain(|_, bucket| {
            bucket
                .last_seen
                .checked_add_signed(idle)
                .map_or(true, |deadline| now < deadline)
        });
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            debug!(removed, remaining = self.buckets.len(), "Swept idle rate-limit buckets");
        }
        removed
    }

    /// Runs [`sweep`](Self::sweep) every `interval` until `shutdown` fires.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        idle_windows: u32,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Rate-limit sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        limiter.sweep(idle_windows);
                    }
                }
            }
        })
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `true` if no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
