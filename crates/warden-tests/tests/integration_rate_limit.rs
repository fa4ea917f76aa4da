// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Rate Limit Integration Tests
//!
//! Fixed-window behaviour on both backends:
//!
//! - Window boundaries and reset
//! - Exactness under concurrency
//! - Fail-open and fail-closed handling of an unreachable store
//! - Response headers and idle bucket sweeping
//!
//! ## Test Categories
//!
//! - `test_local_*`: In-process backend
//! - `test_shared_*`: Key-value backend
//! - `test_policy_*`: Store outage policies
//! - `test_decision_*`: Decision reporting

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use warden_auth::{
    LocalRateLimiter, RateLimitDecision, RateLimiter, SharedRateLimiter, StoreAccess,
};
use warden_config::{FailurePolicy, LimitRule, RateLimitBackend, RateLimitConfig};
use warden_core::{CallContext, RetryPolicy, SharedKv};
use warden_tests::common::*;

fn rule(limit: u32, window_secs: u64) -> LimitRule {
    LimitRule::new(limit, Duration::from_secs(window_secs))
}

fn local(env: &TestEnv, limit: u32, window_secs: u64) -> RateLimiter {
    RateLimiter::Local(LocalRateLimiter::new(rule(limit, window_secs), env.shared_clock()))
}

fn shared(env: &TestEnv, kv: SharedKv, limit: u32, policy: FailurePolicy) -> RateLimiter {
    RateLimiter::Shared(
        SharedRateLimiter::new(kv, rule(limit, 60), policy, "rl:test", env.shared_clock())
            .with_store_access(StoreAccess::new(
                Duration::from_millis(200),
                RetryPolicy::never(),
            )),
    )
}

async fn remaining_sequence(limiter: &RateLimiter, key: &str, calls: usize) -> Vec<Option<u32>> {
    let cx = CallContext::new();
    let mut out = Vec::with_capacity(calls);
    for _ in 0..calls {
        let decision = limiter.allow(&cx, key).await.expect("decision");
        out.push(decision.allowed.then_some(decision.remaining));
    }
    out
}

// =============================================================================
// Local Backend
// =============================================================================

#[tokio::test]
async fn test_local_window_boundary() {
    init_test_logging();
    let env = TestEnv::new();
    let limiter = local(&env, 5, 60);

    assert_eq!(
        remaining_sequence(&limiter, "u-1", 6).await,
        vec![Some(4), Some(3), Some(2), Some(1), Some(0), None]
    );

    env.clock.advance_secs(59);
    assert_eq!(remaining_sequence(&limiter, "u-1", 1).await, vec![None]);

    env.clock.advance_secs(1);
    assert_eq!(remaining_sequence(&limiter, "u-1", 1).await, vec![Some(4)]);
}

#[tokio::test]
async fn test_local_keys_are_independent() {
    let env = TestEnv::new();
    let limiter = local(&env, 2, 60);

    assert_eq!(remaining_sequence(&limiter, "a", 3).await, vec![Some(1), Some(0), None]);
    assert_eq!(remaining_sequence(&limiter, "b", 1).await, vec![Some(1)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_local_concurrent_exact() {
    let env = TestEnv::new();
    let limiter = local(&env, 10, 60);

    let tasks = (0..100).map(|_| {
        let limiter = limiter.clone();
        tokio::spawn(async move { limiter.allow(&CallContext::new(), "hot").await })
    });
    let admitted = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked").expect("decision"))
        .filter(|decision| decision.allowed)
        .count();

    assert_eq!(admitted, 10);
}

#[tokio::test]
async fn test_local_sweep_idle_buckets() {
    let env = TestEnv::new();
    let RateLimiter::Local(limiter) = local(&env, 5, 60) else {
        unreachable!()
    };

    limiter.allow("stale");
    env.clock.advance_secs(120);
    limiter.allow("fresh");
    assert_eq!(limiter.len(), 2);

    env.clock.advance_secs(60);
    assert_eq!(limiter.sweep(3), 1);
    assert_eq!(limiter.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_local_sweeper_task_stops_on_shutdown() {
    let env = TestEnv::new();
    let RateLimiter::Local(limiter) = local(&env, 5, 1) else {
        unreachable!()
    };
    limiter.allow("idle");
    env.clock.advance_secs(10);

    let shutdown = CancellationToken::new();
    let handle = limiter.spawn_sweeper(Duration::from_secs(1), 2, shutdown.clone());
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(limiter.is_empty());

    shutdown.cancel();
    handle.await.expect("sweeper exits cleanly");
}

// =============================================================================
// Shared Backend
// =============================================================================

#[tokio::test]
async fn test_shared_window_boundary() {
    let env = TestEnv::new();
    let limiter = shared(&env, env.kv.clone(), 5, FailurePolicy::FailClosed);

    assert_eq!(
        remaining_sequence(&limiter, "u-1", 6).await,
        vec![Some(4), Some(3), Some(2), Some(1), Some(0), None]
    );

    env.clock.advance_secs(60);
    assert_eq!(remaining_sequence(&limiter, "u-1", 1).await, vec![Some(4)]);
}

#[tokio::test]
async fn test_shared_instances_share_counters() {
    let env = TestEnv::new();
    let first = shared(&env, env.kv.clone(), 3, FailurePolicy::FailClosed);
    let second = shared(&env, env.kv.clone(), 3, FailurePolicy::FailClosed);
    let cx = CallContext::new();

    assert!(first.allow(&cx, "u-1").await.unwrap().allowed);
    assert!(second.allow(&cx, "u-1").await.unwrap().allowed);
    assert!(first.allow(&cx, "u-1").await.unwrap().allowed);
    assert!(!second.allow(&cx, "u-1").await.unwrap().allowed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_concurrent_exact() {
    let env = TestEnv::new();
    let limiter = shared(&env, env.kv.clone(), 10, FailurePolicy::FailClosed);

    let tasks = (0..100).map(|_| {
        let limiter = limiter.clone();
        tokio::spawn(async move { limiter.allow(&CallContext::new(), "hot").await })
    });
    let admitted = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked").expect("decision"))
        .filter(|decision| decision.allowed)
        .count();

    assert_eq!(admitted, 10);
}

#[tokio::test]
async fn test_shared_from_config_namespaces_classes() {
    let env = TestEnv::new();
    let config = RateLimitConfig {
        backend: RateLimitBackend::Shared,
        failure_policy: Some(FailurePolicy::FailClosed),
        ..Default::default()
    };
    let kv: SharedKv = env.kv.clone();
    let build = |class: &str| {
        RateLimiter::from_rule(
            rule(1, 60),
            class,
            &config,
            Some(kv.clone()),
            env.shared_clock(),
            StoreAccess::default(),
        )
        .expect("limiter")
    };
    let login = build("login");
    let search = build("search");
    let cx = CallContext::new();

    assert!(login.allow(&cx, "u-1").await.unwrap().allowed);
    assert!(search.allow(&cx, "u-1").await.unwrap().allowed);
    assert!(!login.allow(&cx, "u-1").await.unwrap().allowed);
}

#[tokio::test]
async fn test_shared_from_config_requires_store_and_policy() {
    let env = TestEnv::new();
    let mut config = RateLimitConfig {
        backend: RateLimitBackend::Shared,
        failure_policy: Some(FailurePolicy::FailOpen),
        ..Default::default()
    };
    let build = |config: &RateLimitConfig, kv: Option<SharedKv>| {
        RateLimiter::from_rule(
            rule(1, 60),
            "default",
            config,
            kv,
            env.shared_clock(),
            StoreAccess::default(),
        )
    };

    assert!(build(&config, None).is_err());
    config.failure_policy = None;
    assert!(build(&config, Some(env.kv.clone() as SharedKv)).is_err());
}

// =============================================================================
// Outage Policies
// =============================================================================

#[tokio::test]
async fn test_policy_fail_open_admits() {
    let env = TestEnv::new();
    let kv = Arc::new(FailingKvStore::down());
    let limiter = shared(&env, kv.clone(), 5, FailurePolicy::FailOpen);

    let decision = limiter
        .allow(&CallContext::new(), "u-1")
        .await
        .expect("fail-open admits");
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 5);
    assert_eq!(kv.calls(), 1);
}

#[tokio::test]
async fn test_policy_fail_closed_denies() {
    let env = TestEnv::new();
    let kv = Arc::new(FailingKvStore::down());
    let limiter = shared(&env, kv, 5, FailurePolicy::FailClosed);

    let err = limiter.allow(&CallContext::new(), "u-1").await.unwrap_err();
    assert_eq!(err.kind(), warden_auth::ErrorKind::StoreUnavailable);
}

#[tokio::test]
async fn test_policy_recovers_after_outage() {
    let env = TestEnv::new();
    let kv = Arc::new(FailingKvStore::new(env.kv.clone()));
    let limiter = shared(&env, kv.clone(), 2, FailurePolicy::FailClosed);
    let cx = CallContext::new();

    kv.set_down(true);
    assert!(limiter.allow(&cx, "u-1").await.is_err());
    kv.set_down(false);
    assert_eq!(limiter.allow(&cx, "u-1").await.unwrap().remaining, 1);
}

#[tokio::test]
async fn test_policy_cancelled_call_never_admitted() {
    let env = TestEnv::new();
    let limiter = shared(&env, env.kv.clone(), 5, FailurePolicy::FailOpen);
    let cx = CallContext::new();
    cx.cancel();

    assert!(limiter.allow(&cx, "u-1").await.is_err());
}

// =============================================================================
// Decisions
// =============================================================================

#[tokio::test]
async fn test_decision_headers() {
    let env = TestEnv::new();
    let limiter = local(&env, 3, 60);
    let decision = limiter.allow(&CallContext::new(), "u-1").await.unwrap();

    let headers = decision.headers();
    assert_eq!(headers[0], ("X-RateLimit-Limit", "3".to_string()));
    assert_eq!(headers[1], ("X-RateLimit-Remaining", "2".to_string()));
    assert_eq!(
        headers[2],
        ("X-RateLimit-Reset", (START_UNIX + 60).to_string())
    );
}

#[tokio::test]
async fn test_decision_reset_tracks_window_start() {
    let env = TestEnv::new();
    let limiter = local(&env, 3, 60);
    let cx = CallContext::new();

    let first = limiter.allow(&cx, "u-1").await.unwrap();
    env.clock.advance_secs(20);
    let second = limiter.allow(&cx, "u-1").await.unwrap();
    assert_eq!(first.reset_at, second.reset_at);

    let denied = RateLimitDecision::denied(3, first.reset_at);
    assert!(!denied.allowed);
    assert_eq!(denied.remaining, 0);
}
