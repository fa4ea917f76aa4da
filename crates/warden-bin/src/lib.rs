// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # warden-bin
//!
//! Operator tooling for the warden security core.
//!
//! - CLI argument parsing with clap
//! - Logging initialization
//! - Command implementations (validate, issue, inspect, version)
//!
//! ## Usage
//!
//! ```bash
//! # Check a configuration file
//! warden -c /etc/warden/warden.yaml validate --strict
//!
//! # Issue an access token for local testing
//! warden issue u-1 --handle alice --role admin
//!
//! # Validate a token and print its claims
//! warden inspect eyJhbGciOi...
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
