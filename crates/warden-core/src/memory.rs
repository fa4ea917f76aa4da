// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-process store implementations.
//!
//! [`MemoryDirectory`] keeps the role graph as two association tables and
//! publishes an [`InvalidationEvent`] for every mutation. [`MemoryKvStore`]
//! provides the [`KvStore`] contract on a sharded map, with expiry driven by
//! the injected [`Clock`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::clock::{SharedClock, SystemClock};
use crate::context::CallContext;
use crate::error::{StoreError, StoreResult};
use crate::invalidation::{InvalidationBus, InvalidationEvent};
use crate::store::{Counter, DirectoryStore, KvStore};
use crate::types::{Permission, Principal, PrincipalId, Role, RoleId, RolePermission, UserRole};

// =============================================================================
// MemoryDirectory
// =============================================================================

#[derive(Debug, Default)]
struct Graph {
    principals: HashMap<PrincipalId, Principal>,
    roles: HashMap<RoleId, Role>,
    permissions: HashMap<String, Permission>,
    user_roles: HashSet<UserRole>,
    role_permissions: HashSet<RolePermission>,
}

/// An in-process directory.
///
/// Mutations are applied under a write lock and then announced on the
/// attached [`InvalidationBus`], so a subscriber never observes the event
/// before the change is readable.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    graph: RwLock<Graph>,
    bus: Option<InvalidationBus>,
}

impl MemoryDirectory {
    /// Creates an empty directory with no invalidation bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty directory that announces mutations on `bus`.
    pub fn with_bus(bus: InvalidationBus) -> Self {
        Self {
            graph: RwLock::new(Graph::default()),
            bus: Some(bus),
        }
    }

    fn announce(&self, event: InvalidationEvent) {
        if let Some(bus) = &self.bus {
            bus.publish(event);
        }
    }

    /// Inserts or replaces a principal.
    pub fn upsert_principal(&self, principal: Principal) {
        let id = principal.id.clone();
        self.graph.write().principals.insert(id.clone(), principal);
        self.announce(InvalidationEvent::Principal(id));
    }

    /// Enables or disables a principal. Returns `false` if it is unknown.
    pub fn set_active(&self, id: &PrincipalId, active: bool) -> bool {
        let found = match self.graph.write().principals.get_mut(id) {
            Some(principal) => {
                principal.active = active;
                true
            }
            None => false,
        };
        if found {
            self.announce(InvalidationEvent::Principal(id.clone()));
        }
        found
    }

    /// Inserts or replaces a role.
    pub fn upsert_role(&self, role: Role) {
        let id = role.id.clone();
        self.graph.write().roles.insert(id.clone(), role);
        self.announce(InvalidationEvent::Role(id));
    }

    /// Deletes a role together with its grants and assignments.
    pub fn delete_role(&self, id: &RoleId) -> bool {
        let removed = {
            let mut graph = self.graph.write();
            graph.user_roles.retain(|ur| &ur.role_id != id);
            graph.role_permissions.retain(|rp| &rp.role_id != id);
            graph.roles.remove(id).is_some()
        };
        if removed {
            self.announce(InvalidationEvent::Role(id.clone()));
        }
        removed
    }

    /// Assigns a role to a principal.
    pub fn assign_role(&self, principal: &PrincipalId, role: &RoleId) -> bool {
        let inserted = self.graph.write().user_roles.insert(UserRole {
            principal_id: principal.clone(),
            role_id: role.clone(),
        });
        if inserted {
            self.announce(InvalidationEvent::Principal(principal.clone()));
        }
        inserted
    }

    /// Removes a role assignment.
    pub fn unassign_role(&self, principal: &PrincipalId, role: &RoleId) -> bool {
        let removed = self.graph.write().user_roles.remove(&UserRole {
            principal_id: principal.clone(),
            role_id: role.clone(),
        });
        if removed {
            self.announce(InvalidationEvent::Principal(principal.clone()));
        }
        removed
    }

    /// Grants a permission to a role, registering the permission if needed.
    pub fn grant_permission(&self, role: &RoleId, permission: Permission) -> bool {
        let inserted = {
            let mut graph = self.graph.write();
            let name = permission.name().to_string();
            graph.permissions.entry(name.clone()).or_insert(permission);
            graph.role_permissions.insert(RolePermission {
                role_id: role.clone(),
                permission: name,
            })
        };
        if inserted {
            self.announce(InvalidationEvent::Role(role.clone()));
        }
        inserted
    }

    /// Revokes a permission from a role.
    pub fn revoke_permission(&self, role: &RoleId, permission: &str) -> bool {
        let removed = self.graph.write().role_permissions.remove(&RolePermission {
            role_id: role.clone(),
            permission: permission.to_string(),
        });
        if removed {
            self.announce(InvalidationEvent::Role(role.clone()));
        }
        removed
    }

    /// Looks up a principal.
    pub fn principal(&self, id: &PrincipalId) -> Option<Principal> {
        self.graph.read().principals.get(id).cloned()
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectory {
    async fn roles_for_principal(
        &self,
        cx: &CallContext,
        principal: &PrincipalId,
    ) -> StoreResult<Vec<Role>> {
        if cx.is_cancelled() {
            return Err(StoreError::cancelled("roles_for_principal"));
        }
        let graph = self.graph.read();
        let mut roles: Vec<Role> = graph
            .user_roles
            .iter()
            .filter(|ur| &ur.principal_id == principal)
            .filter_map(|ur| graph.roles.get(&ur.role_id).cloned())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn permissions_for_role(
        &self,
        cx: &CallContext,
        role: &RoleId,
    ) -> StoreResult<Vec<Permission>> {
        if cx.is_cancelled() {
            return Err(StoreError::cancelled("permissions_for_role"));
        }
        let graph = self.graph.read();
        Ok(graph
            .role_permissions
            .iter()
            .filter(|rp| &rp.role_id == role)
            .filter_map(|rp| graph.permissions.get(&rp.permission).cloned())
            .collect())
    }

    async fn is_principal_active(
        &self,
        cx: &CallContext,
        principal: &PrincipalId,
    ) -> StoreResult<bool> {
        if cx.is_cancelled() {
            return Err(StoreError::cancelled("is_principal_active"));
        }
        Ok(self
            .graph
            .read()
            .principals
            .get(principal)
            .map(|p| p.active)
            .unwrap_or(false))
    }
}

// =============================================================================
// MemoryKvStore
// =============================================================================

#[derive(Debug, Clone)]
struct KvEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl KvEntry {
    fn new(value: String, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    fn ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or_default()
    }
}

/// In-process [`KvStore`].
///
/// Each key lives in one shard of a [`DashMap`]; the read-modify-write in
/// [`KvStore::incr_with_expiry`] happens under that shard's lock, which makes
/// increment and expiry atomic with respect to other callers.
#[derive(Debug, Clone)]
pub struct MemoryKvStore {
    entries: Arc<DashMap<String, KvEntry>>,
    clock: SharedClock,
}

impl MemoryKvStore {
    /// Creates a store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a store on the given clock.
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Number of stored keys, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops expired keys. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Purged expired keys");
        }
        removed
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn incr_with_expiry(
        &self,
        cx: &CallContext,
        key: &str,
        window: Duration,
    ) -> StoreResult<Counter> {
        if cx.is_cancelled() {
            return Err(StoreError::cancelled("incr_with_expiry"));
        }
        let now = self.clock.now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| KvEntry::new("0".to_string(), now, window));
        if entry.is_expired(now) {
            *entry = KvEntry::new("0".to_string(), now, window);
        }
        let current: u64 = entry
            .value
            .parse()
            .map_err(|_| StoreError::protocol(format!("key '{key}' does not hold an integer")))?;
        let count = current + 1;
        entry.value = count.to_string();
        Ok(Counter {
            count,
            ttl: entry.ttl(now),
        })
    }

    async fn get(&self, cx: &CallContext, key: &str) -> StoreResult<Option<String>> {
        if cx.is_cancelled() {
            return Err(StoreError::cancelled("get"));
        }
        let now = self.clock.now();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set_with_ttl(
        &self,
        cx: &CallContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<()> {
        if cx.is_cancelled() {
            return Err(StoreError::cancelled("set_with_ttl"));
        }
        let now = self.clock.now();
        self.entries
            .insert(key.to_string(), KvEntry::new(value.to_string(), now, ttl));
        Ok(())
    }

    async fn set_if_absent(
        &self,
        cx: &CallContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        if cx.is_cancelled() {
            return Err(StoreError::cancelled("set_if_absent"));
        }
        let now = self.clock.now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(KvEntry::new(value.to_string(), now, ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(KvEntry::new(value.to_string(), now, ttl));
                Ok(true)
            }
        }
    }

    async fn delete(&self, cx: &CallContext, key: &str) -> StoreResult<bool> {
        if cx.is_cancelled() {
            return Err(StoreError::cancelled("delete"));
        }
        let now = self.clock.now();
        Ok(self
            .entries
            .remove(key)
            .map(|(_, entry)| !entry.is_expired(now))
            .unwrap_or(false))
    }

    fn purge_expired(&self) -> usize {
        MemoryKvStore::purge_expired(self)
    }
}
