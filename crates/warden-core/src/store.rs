// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Boundaries to the external collaborators.
//!
//! - [`DirectoryStore`]: the authoritative principal/role/permission graph
//!   (read-only from this crate's point of view).
//! - [`KvStore`]: shared key-value state for distributed rate limiting and
//!   token rotation tracking.
//!
//! Implementations must honour the [`CallContext`] they are given; the
//! callers in `warden-auth` additionally wrap every call in
//! [`CallContext::guard`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::StoreResult;
use crate::types::{Permission, PrincipalId, Role, RoleId};

// =============================================================================
// DirectoryStore
// =============================================================================

/// Read-side view of the directory.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Roles currently assigned to the principal. Unknown principals have none.
    async fn roles_for_principal(
        &self,
        cx: &CallContext,
        principal: &PrincipalId,
    ) -> StoreResult<Vec<Role>>;

    /// Permissions currently granted to the role. Unknown roles grant nothing.
    async fn permissions_for_role(
        &self,
        cx: &CallContext,
        role: &RoleId,
    ) -> StoreResult<Vec<Permission>>;

    /// Whether the principal exists and is enabled.
    async fn is_principal_active(
        &self,
        cx: &CallContext,
        principal: &PrincipalId,
    ) -> StoreResult<bool>;
}

/// Shared directory handle.
pub type SharedDirectory = Arc<dyn DirectoryStore>;

// =============================================================================
// KvStore
// =============================================================================

/// Counter state returned by [`KvStore::incr_with_expiry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    /// Value after the increment.
    pub count: u64,
    /// Time until the counter expires.
    pub ttl: Duration,
}

/// Shared key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Atomically increments `key` and, on the first increment only, sets it
    /// to expire after `window`.
    ///
    /// Increment and expiry are one atomic unit: a counter never exists
    /// without an expiry.
    async fn incr_with_expiry(
        &self,
        cx: &CallContext,
        key: &str,
        window: Duration,
    ) -> StoreResult<Counter>;

    /// Reads a value.
    async fn get(&self, cx: &CallContext, key: &str) -> StoreResult<Option<String>>;

    /// Writes a value that expires after `ttl`.
    async fn set_with_ttl(
        &self,
        cx: &CallContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<()>;

    /// Writes a value only if the key is absent. Returns `true` if written.
    async fn set_if_absent(
        &self,
        cx: &CallContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<bool>;

    /// Removes a key. Returns `true` if it existed.
    async fn delete(&self, cx: &CallContext, key: &str) -> StoreResult<bool>;

    /// Drops expired keys in stores that do not expire them on their own.
    /// Returns the number removed.
    fn purge_expired(&self) -> usize {
        0
    }
}

/// Shared key-value handle.
pub type SharedKv = Arc<dyn KvStore>;
