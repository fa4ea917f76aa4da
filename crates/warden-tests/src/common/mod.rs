// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Common Test Utilities
//!
//! - `fixtures`: Seeded test data and ready-made components
//! - `mocks`: Store implementations with latency, failure injection and
//!   call counting

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize test logging. Call this at the start of each test.
pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("warn,warden_auth=debug")),
            )
            .with_test_writer()
            .init();
    });
}

/// Generate a unique test ID for key isolation.
pub fn unique_test_id() -> String {
    format!("test_{:016x}", rand::random::<u64>())
}
