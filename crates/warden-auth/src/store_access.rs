// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bounded access to external stores.
//!
//! Reads are wrapped in the call timeout and retried per the
//! [`RetryPolicy`]. Writes get the timeout only.

use std::future::Future;
use std::time::Duration;

use warden_config::{PermissionConfig, StoreConfig};
use warden_core::{CallContext, RetryPolicy, StoreResult};

/// Timeout and retry settings shared by every store caller.
#[derive(Debug, Clone, Copy)]
pub struct StoreAccess {
    timeout: Duration,
    retry: RetryPolicy,
}

impl StoreAccess {
    /// Creates access settings.
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        Self { timeout, retry }
    }

    /// Derives settings from configuration.
    pub fn from_config(store: &StoreConfig, permissions: &PermissionConfig) -> Self {
        let retry = if permissions.retry_reads {
            RetryPolicy::once(permissions.retry_backoff())
        } else {
            RetryPolicy::never()
        };
        Self::new(store.timeout(), retry)
    }

    /// The per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// A read: bounded and retried on transient failure.
    pub async fn read<T, F, Fut>(&self, cx: &CallContext, operation: &str, mut call: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let timeout = self.timeout;
        self.retry
            .run(cx, operation, move || cx.guard(operation, timeout, call()))
            .await
    }

    /// A write: bounded, never retried.
    pub async fn write<T, Fut>(&self, cx: &CallContext, operation: &str, call: Fut) -> StoreResult<T>
    where
        Fut: Future<Output = StoreResult<T>>,
    {
        cx.guard(operation, self.timeout, call).await
    }
}

impl Default for StoreAccess {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(warden_config::schema::DEFAULT_STORE_TIMEOUT_MS),
            RetryPolicy::default(),
        )
    }
}
