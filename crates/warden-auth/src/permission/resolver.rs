// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Principal to permission-set expansion.
//!
//! `expand` walks principal -> roles -> permissions through the directory
//! and caches the union per principal. Concurrent misses for one principal
//! produce exactly one directory round and share its outcome, failures
//! included; misses for different principals proceed independently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use warden_config::PermissionConfig;
use warden_core::{
    CallContext, InvalidationBus, InvalidationEvent, PermissionSet, PrincipalId, RoleId,
    SharedClock, SharedDirectory, StoreResult, SystemClock,
};

use super::cache::PermissionCache;
use super::flight::{Flight, SingleFlight};
use crate::store_access::StoreAccess;

/// Resolves and caches effective permissions.
#[derive(Clone)]
pub struct PermissionResolver {
    directory: SharedDirectory,
    cache: Arc<PermissionCache>,
    flights: SingleFlight<StoreResult<Arc<PermissionSet>>>,
    clock: SharedClock,
    access: StoreAccess,
    fetches: Arc<AtomicU64>,
}

impl PermissionResolver {
    /// Creates a resolver with the given cache TTL, the system clock and
    /// default store access.
    pub fn new(directory: SharedDirectory, cache_ttl: Duration) -> Self {
        Self {
            directory,
            cache: Arc::new(PermissionCache::new(cache_ttl)),
            flights: SingleFlight::new(),
            clock: Arc::new(SystemClock),
            access: StoreAccess::default(),
            fetches: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creates a resolver from configuration.
    pub fn from_config(
        directory: SharedDirectory,
        config: &PermissionConfig,
        access: StoreAccess,
        clock: SharedClock,
    ) -> Self {
        Self::new(directory, config.cache_ttl())
            .with_store_access(access)
            .with_clock(clock)
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces store timeout and retry settings.
    pub fn with_store_access(mut self, access: StoreAccess) -> Self {
        self.access = access;
        self
    }

    /// Effective permissions of `principal`.
    pub async fn expand(
        &self,
        cx: &CallContext,
        principal: &PrincipalId,
    ) -> StoreResult<Arc<PermissionSet>> {
        if let Some(hit) = self.cache.get_fresh(principal, self.clock.now()) {
            trace!(principal = %principal, "Permission cache hit");
            return Ok(hit);
        }

        loop {
            let leader = match self.flights.join(principal.as_str()) {
                Flight::Leader(leader) => leader,
                Flight::Follower(waiter) => {
                    let shared = cx
                        .guard("expand", self.access.timeout(), async { Ok(waiter.wait().await) })
                        .await?;
                    match shared {
                        Some(result) => return result,
                        // Leader abandoned the fetch; try to lead.
                        None => continue,
                    }
                }
            };

            // A previous leader may have filled the cache just before we joined.
            if let Some(hit) = self.cache.get_fresh(principal, self.clock.now()) {
                leader.complete(Ok(hit.clone()));
                return Ok(hit);
            }

            let result = self.fetch_and_store(cx, principal).await;
            match &result {
                // Our own cancellation is not the followers' answer.
                Err(err) if err.is_cancelled() => drop(leader),
                _ => leader.complete(result.clone()),
            }
            return result;
        }
    }

    async fn fetch_and_store(
        &self,
        cx: &CallContext,
        principal: &PrincipalId,
    ) -> StoreResult<Arc<PermissionSet>> {
        let epoch = self.cache.epoch();
        let (roles, permissions) = self.fetch(cx, principal).await?;
        let permissions = Arc::new(permissions);

        let stored = self.cache.insert_if_epoch(
            epoch,
            principal.clone(),
            permissions.clone(),
            roles,
            self.clock.now(),
        );
        if !stored {
            debug!(principal = %principal, "Invalidated during fetch; result not cached");
        }
        Ok(permissions)
    }

    /// Returns `true` if `principal` currently holds `permission`.
    pub async fn has_permission(
        &self,
        cx: &CallContext,
        principal: &PrincipalId,
        permission: &str,
    ) -> StoreResult<bool> {
        Ok(self.expand(cx, principal).await?.contains(permission))
    }

    /// Drops the cached expansion of one principal.
    pub fn invalidate_principal(&self, principal: &PrincipalId) {
        if self.cache.invalidate_principal(principal) {
            debug!(principal = %principal, "Permission cache entry invalidated");
        }
    }

    /// Drops every cached expansion that included `role`.
    pub fn invalidate_role(&self, role: &RoleId) {
        let dropped = self.cache.invalidate_role(role);
        debug!(role = %role, dropped, "Permission cache invalidated by role");
    }

    /// Drops every cached expansion.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
        debug!("Permission cache cleared");
    }

    /// Applies one directory change event.
    pub fn apply(&self, event: &InvalidationEvent) {
        apply_event(&self.cache, event);
    }

    /// Applies directory change events from `bus` until it closes.
    ///
    /// If the listener falls behind and events are dropped, the whole cache
    /// is cleared.
    pub fn spawn_invalidation_listener(&self, bus: &InvalidationBus) -> JoinHandle<()> {
        let mut events = bus.subscribe();
        let cache = self.cache.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => apply_event(&cache, &event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Invalidation listener lagged; clearing permission cache");
                        cache.invalidate_all();
                    }
                    Err(RecvError::Closed) => {
                        debug!("Invalidation bus closed");
                        break;
                    }
                }
            }
        })
    }

    /// Runs [`purge_expired`](Self::purge_expired) every `interval` until
    /// `shutdown` fires.
    pub fn spawn_purger(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let resolver = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Permission cache purger stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = resolver.purge_expired();
                        if removed > 0 {
                            debug!(removed, remaining = resolver.cached_principals(), "Purged expired permission entries");
                        }
                    }
                }
            }
        })
    }

    /// Number of directory fetch rounds performed.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Number of cached principals.
    pub fn cached_principals(&self) -> usize {
        self.cache.len()
    }

    /// Removes expired cache entries.
    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired(self.clock.now())
    }

    async fn fetch(
        &self,
        cx: &CallContext,
        principal: &PrincipalId,
    ) -> StoreResult<(Vec<RoleId>, PermissionSet)> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let directory = &self.directory;

        let roles = self
            .access
            .read(cx, "roles_for_principal", move || {
                directory.roles_for_principal(cx, principal)
            })
            .await?;
        let role_ids: Vec<RoleId> = roles.into_iter().map(|role| role.id).collect();

        let lookups = role_ids.iter().map(|role| {
            self.access.read(cx, "permissions_for_role", move || {
                directory.permissions_for_role(cx, role)
            })
        });
        let grants = try_join_all(lookups).await?;

        let permissions: PermissionSet = grants
            .into_iter()
            .flatten()
            .map(|permission| permission.name().to_string())
            .collect();

        debug!(
            principal = %principal,
            roles = role_ids.len(),
            permissions = permissions.len(),
            "Expanded permissions"
        );
        Ok((role_ids, permissions))
    }
}

fn apply_event(cache: &PermissionCache, event: &InvalidationEvent) {
    match event {
        InvalidationEvent::Principal(id) => {
            cache.invalidate_principal(id);
        }
        InvalidationEvent::Role(id) => {
            cache.invalidate_role(id);
        }
        InvalidationEvent::All => cache.invalidate_all(),
    }
}

impl std::fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResolver")
            .field("cache_ttl", &self.cache.ttl())
            .field("cached", &self.cache.len())
            .field("fetches", &self.fetch_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{ManualClock, MemoryDirectory, Permission, Principal, Role};

    fn seeded() -> (Arc<MemoryDirectory>, PrincipalId) {
        let dir = Arc::new(MemoryDirectory::new());
        let pid = PrincipalId::new("u-1");
        dir.upsert_principal(Principal::new(pid.clone(), "alice"));
        dir.upsert_role(Role::new("r-editor", "editor"));
        dir.upsert_role(Role::new("r-viewer", "viewer"));
        dir.assign_role(&pid, &RoleId::new("r-editor"));
        dir.assign_role(&pid, &RoleId::new("r-viewer"));
        dir.grant_permission(&RoleId::new("r-editor"), Permission::parse("doc:write").unwrap());
        dir.grant_permission(&RoleId::new("r-viewer"), Permission::parse("doc:read").unwrap());
        (dir, pid)
    }

    #[tokio::test]
    async fn test_expand_unions_roles() {
        let (dir, pid) = seeded();
        let resolver = PermissionResolver::new(dir, Duration::from_secs(30));
        let cx = CallContext::new();

        let set = resolver.expand(&cx, &pid).await.unwrap();
        assert_eq!(set.sorted(), vec!["doc:read", "doc:write"]);
        assert!(resolver.has_permission(&cx, &pid, "doc:read").await.unwrap());
        assert!(!resolver.has_permission(&cx, &pid, "doc:delete").await.unwrap());
        assert_eq!(resolver.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_principal_has_nothing() {
        let (dir, _) = seeded();
        let resolver = PermissionResolver::new(dir, Duration::from_secs(30));
        let set = resolver
            .expand(&CallContext::new(), &PrincipalId::new("ghost"))
            .await
            .unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_cache_ttl() {
        let (dir, pid) = seeded();
        let clock = ManualClock::default();
        let resolver = PermissionResolver::new(dir, Duration::from_secs(30))
            .with_clock(Arc::new(clock.clone()));
        let cx = CallContext::new();

        resolver.expand(&cx, &pid).await.unwrap();
        clock.advance_secs(29);
        resolver.expand(&cx, &pid).await.unwrap();
        assert_eq!(resolver.fetch_count(), 1);

        clock.advance_secs(1);
        resolver.expand(&cx, &pid).await.unwrap();
        assert_eq!(resolver.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_role_refetches() {
        let (dir, pid) = seeded();
        let resolver = PermissionResolver::new(dir.clone(), Duration::from_secs(300));
        let cx = CallContext::new();

        assert!(!resolver.has_permission(&cx, &pid, "doc:delete").await.unwrap());
        dir.grant_permission(&RoleId::new("r-editor"), Permission::parse("doc:delete").unwrap());
        assert!(!resolver.has_permission(&cx, &pid, "doc:delete").await.unwrap());

        resolver.invalidate_role(&RoleId::new("r-editor"));
        assert!(resolver.has_permission(&cx, &pid, "doc:delete").await.unwrap());
    }

    #[tokio::test]
    async fn test_listener_applies_bus_events() {
        let bus = InvalidationBus::new(16);
        let dir = Arc::new(MemoryDirectory::with_bus(bus.clone()));
        let pid = PrincipalId::new("u-1");
        dir.upsert_principal(Principal::new(pid.clone(), "alice"));
        dir.upsert_role(Role::new("r-admin", "admin"));
        dir.grant_permission(&RoleId::new("r-admin"), Permission::parse("user:delete").unwrap());

        let resolver = PermissionResolver::new(dir.clone(), Duration::from_secs(300));
        let listener = resolver.spawn_invalidation_listener(&bus);
        let cx = CallContext::new();

        assert!(!resolver.has_permission(&cx, &pid, "user:delete").await.unwrap());
        dir.assign_role(&pid, &RoleId::new("r-admin"));

        let mut granted = false;
        for _ in 0..50 {
            if resolver.has_permission(&cx, &pid, "user:delete").await.unwrap() {
                granted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(granted);
        listener.abort();
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let (dir, pid) = seeded();
        let resolver = PermissionResolver::new(dir, Duration::from_secs(30));
        let cx = CallContext::new();
        cx.cancel();
        let err = resolver.expand(&cx, &pid).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
