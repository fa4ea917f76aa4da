// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Invalidation signals emitted by directory mutations.
//!
//! The directory's administrative layer publishes an
//! [`InvalidationEvent`] for every association change; permission caches
//! subscribe and drop the affected entries.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use crate::types::{PrincipalId, RoleId};

/// Which cached expansions a mutation affects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationEvent {
    /// A UserRole change, or an activation change, for one principal.
    Principal(PrincipalId),
    /// A RolePermission change; affects every principal holding the role.
    Role(RoleId),
    /// Bulk change; drop everything.
    All,
}

/// Broadcast channel for [`InvalidationEvent`]s.
#[derive(Debug, Clone)]
pub struct InvalidationBus {
    sender: Arc<broadcast::Sender<InvalidationEvent>>,
}

impl InvalidationBus {
    /// Default channel capacity.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Creates a bus with room for `capacity` undelivered events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(16));
        Self {
            sender: Arc::new(tx),
        }
    }

    /// Subscribes to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Returns the number of receivers reached.
    pub fn publish(&self, event: InvalidationEvent) -> usize {
        trace!(?event, "Publishing invalidation");
        self.sender.send(event).unwrap_or(0)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
