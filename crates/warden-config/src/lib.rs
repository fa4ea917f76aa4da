// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # warden-config
//!
//! Configuration management for the warden security core.
//!
//! The configuration provider supplies the signing secret, token lifetimes,
//! rate-limit thresholds and windows, store timeouts and the fail-open /
//! fail-closed policies. It is validated once at startup; a
//! [`ConfigError`] is fatal and never produced per request.
//!
//! ## Example
//!
//! ```no_run
//! use warden_config::{ConfigLoader, WardenConfig};
//!
//! let config: WardenConfig = ConfigLoader::new().load("warden.yaml").unwrap();
//! println!("issuer: {}", config.token.issuer);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, ConfigFormat, ConfigLoader};
pub use schema::{
    FailurePolicy, KeyBy, LimitRule, LogFormat, LogLevel, LoggingConfig, PermissionConfig,
    RateLimitBackend, RateLimitConfig, RouteRule, SecretValue, SigningAlgorithm, StoreConfig,
    TokenConfig, WardenConfig,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
