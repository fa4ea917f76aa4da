// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! Store wrappers for exercising timeouts, retries, stampedes and failure
//! policies.
//!
//! - Configurable latency
//! - Failure injection (every call, or the next N calls)
//! - Call counting for verification

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use warden_core::{
    CallContext, Counter, DirectoryStore, KvStore, MemoryKvStore, Permission, PrincipalId, Role,
    RoleId, SharedDirectory, StoreError, StoreResult,
};

// =============================================================================
// CountingDirectory
// =============================================================================

/// A directory wrapper that counts, delays and fails calls.
pub struct CountingDirectory {
    inner: SharedDirectory,
    latency: Mutex<Duration>,
    fail_all: AtomicBool,
    fail_next: AtomicU32,
    roles_calls: AtomicU64,
    permission_calls: AtomicU64,
    active_calls: AtomicU64,
    fetched: Mutex<Vec<String>>,
}

impl CountingDirectory {
    /// Wraps `inner`.
    pub fn new(inner: SharedDirectory) -> Self {
        Self {
            inner,
            latency: Mutex::new(Duration::ZERO),
            fail_all: AtomicBool::new(false),
            fail_next: AtomicU32::new(0),
            roles_calls: AtomicU64::new(0),
            permission_calls: AtomicU64::new(0),
            active_calls: AtomicU64::new(0),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Adds latency to every call.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = latency;
        self
    }

    /// Changes the latency.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Makes every call fail with `Unavailable` until reset.
    pub fn fail_all(&self, enabled: bool) {
        self.fail_all.store(enabled, Ordering::SeqCst);
    }

    /// Makes the next `count` calls fail with `Unavailable`.
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Calls to `roles_for_principal`.
    pub fn roles_calls(&self) -> u64 {
        self.roles_calls.load(Ordering::SeqCst)
    }

    /// Calls to `permissions_for_role`.
    pub fn permission_calls(&self) -> u64 {
        self.permission_calls.load(Ordering::SeqCst)
    }

    /// Calls to `is_principal_active`.
    pub fn active_calls(&self) -> u64 {
        self.active_calls.load(Ordering::SeqCst)
    }

    /// Principals whose roles were fetched, in order.
    pub fn fetched_principals(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }

    async fn before(&self, operation: &str) -> StoreResult<()> {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(format!("{operation}: injected outage")));
        }
        let consumed = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(StoreError::unavailable(format!("{operation}: injected failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for CountingDirectory {
    async fn roles_for_principal(
        &self,
        cx: &CallContext,
        principal: &PrincipalId,
    ) -> StoreResult<Vec<Role>> {
        self.roles_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched.lock().push(principal.to_string());
        self.before("roles_for_principal").await?;
        self.inner.roles_for_principal(cx, principal).await
    }

    async fn permissions_for_role(
        &self,
        cx: &CallContext,
        role: &RoleId,
    ) -> StoreResult<Vec<Permission>> {
        self.permission_calls.fetch_add(1, Ordering::SeqCst);
        self.before("permissions_for_role").await?;
        self.inner.permissions_for_role(cx, role).await
    }

    async fn is_principal_active(
        &self,
        cx: &CallContext,
        principal: &PrincipalId,
    ) -> StoreResult<bool> {
        self.active_calls.fetch_add(1, Ordering::SeqCst);
        self.before("is_principal_active").await?;
        self.inner.is_principal_active(cx, principal).await
    }
}

// =============================================================================
// FailingKvStore
// =============================================================================

/// An in-memory key-value store that can be switched off.
pub struct FailingKvStore {
    inner: Arc<MemoryKvStore>,
    down: AtomicBool,
    calls: AtomicU64,
}

impl FailingKvStore {
    /// Wraps `inner`, initially up.
    pub fn new(inner: Arc<MemoryKvStore>) -> Self {
        Self {
            inner,
            down: AtomicBool::new(false),
            calls: AtomicU64::new(0),
        }
    }

    /// Creates a store that is down from the start.
    pub fn down() -> Self {
        let store = Self::new(Arc::new(MemoryKvStore::new()));
        store.set_down(true);
        store
    }

    /// Switches the outage on or off.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Calls received, successful or not.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::unavailable("connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KvStore for FailingKvStore {
    async fn incr_with_expiry(
        &self,
        cx: &CallContext,
        key: &str,
        window: Duration,
    ) -> StoreResult<Counter> {
        self.check()?;
        self.inner.incr_with_expiry(cx, key, window).await
    }

    async fn get(&self, cx: &CallContext, key: &str) -> StoreResult<Option<String>> {
        self.check()?;
        self.inner.get(cx, key).await
    }

    async fn set_with_ttl(
        &self,
        cx: &CallContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<()> {
        self.check()?;
        self.inner.set_with_ttl(cx, key, value, ttl).await
    }

    async fn set_if_absent(
        &self,
        cx: &CallContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        self.check()?;
        self.inner.set_if_absent(cx, key, value, ttl).await
    }

    async fn delete(&self, cx: &CallContext, key: &str) -> StoreResult<bool> {
        self.check()?;
        self.inner.delete(cx, key).await
    }
}
