// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-principal permission cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use warden_core::{PermissionSet, PrincipalId, RoleId};

#[derive(Debug, Clone)]
struct CacheEntry {
    permissions: Arc<PermissionSet>,
    roles: Vec<RoleId>,
    expires_at: DateTime<Utc>,
}

/// Expanded permission sets keyed by principal.
///
/// Every invalidation bumps an epoch. A fetch records the epoch before it
/// starts and only inserts if no invalidation happened in between, so a
/// slow fetch can never overwrite a fresher invalidation.
#[derive(Debug)]
pub struct PermissionCache {
    entries: DashMap<PrincipalId, CacheEntry>,
    epoch: AtomicU64,
    ttl: Duration,
}

impl PermissionCache {
    /// Creates an empty cache with the given entry lifetime.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            epoch: AtomicU64::new(0),
            ttl,
        }
    }

    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current invalidation epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Returns the cached set if present and not expired.
    pub fn get_fresh(&self, principal: &PrincipalId, now: DateTime<Utc>) -> Option<Arc<PermissionSet>> {
        let entry = self.entries.get(principal)?;
        if now < entry.expires_at {
            Some(entry.permissions.clone())
        } else {
            None
        }
    }

    /// Stores a fetch result unless an invalidation happened since `epoch`.
    ///
    /// Returns `true` if stored.
    pub fn insert_if_epoch(
        &self,
        epoch: u64,
        principal: PrincipalId,
        permissions: Arc<PermissionSet>,
        roles: Vec<RoleId>,
        now: DateTime<Utc>,
    ) -> bool {
        let expires_at = now + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero());
        let entry = CacheEntry {
            permissions,
            roles,
            expires_at,
        };
        // Checked under the shard lock so an invalidation of this key
        // cannot interleave between the check and the insert.
        match self.entries.entry(principal) {
            dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                if self.epoch() != epoch {
                    return false;
                }
                slot.insert(entry);
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                if self.epoch() != epoch {
                    return false;
                }
                slot.insert(entry);
            }
        }
        true
    }

    /// Drops one principal.
    pub fn invalidate_principal(&self, principal: &PrincipalId) -> bool {
        self.bump();
        self.entries.remove(principal).is_some()
    }

    /// Drops every principal whose expansion included `role`.
    pub fn invalidate_role(&self, role: &RoleId) -> usize {
        self.bump();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.roles.contains(role));
        before.saturating_sub(self.entries.len())
    }

    /// Drops everything.
    pub fn invalidate_all(&self) {
        self.bump();
        self.entries.clear();
    }

    /// Removes expired entries. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        before.saturating_sub(self.entries.len())
    }

    /// Number of cached principals, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn bump(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}
