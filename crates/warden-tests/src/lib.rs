// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Warden Integration Tests
//!
//! Integration tests for the warden workspace, plus the fixtures and mocks
//! they share.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Seeded directories, configurations and token forgery
//!   - `mocks`: Instrumented and failure-injecting store implementations
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p warden-tests
//!
//! # Run one suite
//! cargo test -p warden-tests --test integration_token
//! cargo test -p warden-tests --test integration_permissions
//! cargo test -p warden-tests --test integration_rate_limit
//! cargo test -p warden-tests --test integration_gate
//! cargo test -p warden-tests --test integration_config
//! ```
//!
//! ## Test Categories
//!
//! ### Token Tests (`integration_token.rs`)
//! - Issue/validate round trip and the expiry boundary
//! - Signature tampering and algorithm confusion
//! - Refresh, rotation, reuse detection and revocation
//!
//! ### Permission Tests (`integration_permissions.rs`)
//! - Expansion across roles
//! - Invalidation (explicit and via the bus)
//! - Stampede protection, timeouts, retries and cancellation
//!
//! ### Rate Limit Tests (`integration_rate_limit.rs`)
//! - Exact window boundary on both backends
//! - Concurrent admissions
//! - Fail-open and fail-closed behaviour
//!
//! ### Gate Tests (`integration_gate.rs`)
//! - Admission ordering and generic rejections
//! - Failure policies
//!
//! ### Config Tests (`integration_config.rs`)
//! - YAML, TOML and JSON loading
//! - Validation rules and environment overrides

#![allow(dead_code)]

pub mod common;
