// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # warden-core
//!
//! Foundational types and collaborator boundaries for the warden security core.
//!
//! - **Types**: `PrincipalId`, `RoleId`, `Principal`, `Role`, `Permission`,
//!   `PermissionSet` and the two association records
//! - **Clock**: injectable time source (`SystemClock`, `ManualClock`)
//! - **Context**: `CallContext` for cancellation and deadlines on store calls
//! - **Store**: `DirectoryStore` and `KvStore` traits with in-memory and Redis
//!   implementations
//! - **Invalidation**: broadcast bus carrying directory mutation events
//! - **Retry**: read-path retry policy
//!
//! ## Example
//!
//! ```rust,ignore
//! use warden_core::prelude::*;
//!
//! let bus = InvalidationBus::default();
//! let directory = MemoryDirectory::with_bus(bus.clone());
//! directory.upsert_principal(Principal::new("u-1", "alice"));
//!
//! let cx = CallContext::with_timeout(Duration::from_secs(3));
//! let active = directory.is_principal_active(&cx, &PrincipalId::new("u-1")).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod clock;
pub mod context;
pub mod error;
pub mod types;

// =============================================================================
// Store Modules
// =============================================================================

pub mod invalidation;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_kv;
pub mod retry;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use context::CallContext;
pub use error::{StoreError, StoreResult};
pub use invalidation::{InvalidationBus, InvalidationEvent};
pub use memory::{MemoryDirectory, MemoryKvStore};
#[cfg(feature = "redis")]
pub use redis_kv::RedisKvStore;
pub use retry::RetryPolicy;
pub use store::{Counter, DirectoryStore, KvStore, SharedDirectory, SharedKv};
pub use types::{
    Permission, PermissionSet, Principal, PrincipalId, Role, RoleId, RolePermission, UserRole,
};

/// Commonly used items.
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::context::CallContext;
    pub use crate::error::{StoreError, StoreResult};
    pub use crate::invalidation::{InvalidationBus, InvalidationEvent};
    pub use crate::memory::{MemoryDirectory, MemoryKvStore};
    pub use crate::store::{DirectoryStore, KvStore};
    pub use crate::types::{Permission, PermissionSet, Principal, PrincipalId, Role, RoleId};
    pub use std::time::Duration;
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
