// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # warden-auth
//!
//! Request-time security for the warden core:
//!
//! - **Token**: `TokenService` issues, validates, refreshes and revokes
//!   signed session tokens
//! - **Permission**: `PermissionResolver` expands principal -> roles ->
//!   permissions behind a single-flight TTL cache
//! - **RateLimit**: fixed-window `RateLimiter` over an in-process map or a
//!   shared key-value store
//! - **Gate**: `AuthGate` composes the three into one admission decision
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warden_auth::{AuthGate, GateRequest};
//! use warden_core::{CallContext, MemoryDirectory, SystemClock};
//!
//! let config = warden_config::load_config("warden.yaml")?;
//! let gate = AuthGate::from_config(
//!     &config,
//!     Arc::new(MemoryDirectory::new()),
//!     None,
//!     Arc::new(SystemClock),
//! )?;
//!
//! let request = GateRequest::new()
//!     .authorization(header_value)
//!     .require("doc:read");
//! let admission = gate.admit(&CallContext::new(), &request).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod gate;
pub mod metrics;
pub mod permission;
pub mod ratelimit;
pub mod store_access;
pub mod token;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ErrorKind, GateError, RateLimitError, TokenError, TokenResult};
pub use gate::{extract_bearer_token, Admission, AuthGate, GateRequest};
pub use metrics::{GateMetrics, GateMetricsSnapshot};
pub use permission::{PermissionCache, PermissionResolver, SingleFlight};
pub use ratelimit::{LocalRateLimiter, RateLimitDecision, RateLimiter, SharedRateLimiter};
pub use store_access::StoreAccess;
pub use token::{IssuedToken, TokenClaims, TokenKind, TokenPair, TokenService, TokenServiceBuilder};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
