// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! A seeded directory, ready-made configurations and a [`TestEnv`] that
//! wires components to one manual clock.
//!
//! ## Seeded directory
//!
//! | Principal | Roles            | Active |
//! |-----------|------------------|--------|
//! | alice     | editor, viewer   | yes    |
//! | bob       | viewer           | yes    |
//! | carol     | viewer           | no     |
//! | dave      | admin            | yes    |

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use warden_auth::{AuthGate, PermissionResolver, StoreAccess, TokenKind, TokenService};
use warden_config::{TokenConfig, WardenConfig};
use warden_core::{
    InvalidationBus, ManualClock, MemoryDirectory, MemoryKvStore, Permission, Principal,
    PrincipalId, Role, RoleId, SharedClock,
};

/// Signing secret used by every fixture.
pub const TEST_SECRET: &str = "test-secret-key-that-is-long-enough-for-testing";

/// Unix time every manual clock starts at.
pub const START_UNIX: i64 = 1_700_000_000;

// =============================================================================
// Directory Fixtures
// =============================================================================

/// Well-known principal and role ids.
pub struct Ids;

impl Ids {
    /// Editor and viewer.
    pub const ALICE: &'static str = "u-alice";
    /// Viewer.
    pub const BOB: &'static str = "u-bob";
    /// Viewer, deactivated.
    pub const CAROL: &'static str = "u-carol";
    /// Admin.
    pub const DAVE: &'static str = "u-dave";

    /// `admin` role.
    pub const ADMIN: &'static str = "r-admin";
    /// `editor` role.
    pub const EDITOR: &'static str = "r-editor";
    /// `viewer` role.
    pub const VIEWER: &'static str = "r-viewer";
}

/// Builds the seeded directory, optionally publishing to `bus`.
pub fn seeded_directory(bus: Option<InvalidationBus>) -> Arc<MemoryDirectory> {
    let dir = match bus {
        Some(bus) => MemoryDirectory::with_bus(bus),
        None => MemoryDirectory::new(),
    };

    dir.upsert_role(Role::new(Ids::ADMIN, "admin").with_description("Full control"));
    dir.upsert_role(Role::new(Ids::EDITOR, "editor"));
    dir.upsert_role(Role::new(Ids::VIEWER, "viewer"));

    grant(&dir, Ids::ADMIN, &["user:read", "user:delete", "doc:read", "doc:write"]);
    grant(&dir, Ids::EDITOR, &["doc:read", "doc:write"]);
    grant(&dir, Ids::VIEWER, &["doc:read"]);

    dir.upsert_principal(Principal::new(Ids::ALICE, "alice"));
    dir.upsert_principal(Principal::new(Ids::BOB, "bob"));
    dir.upsert_principal(Principal::new(Ids::CAROL, "carol").deactivated());
    dir.upsert_principal(Principal::new(Ids::DAVE, "dave"));

    assign(&dir, Ids::ALICE, &[Ids::EDITOR, Ids::VIEWER]);
    assign(&dir, Ids::BOB, &[Ids::VIEWER]);
    assign(&dir, Ids::CAROL, &[Ids::VIEWER]);
    assign(&dir, Ids::DAVE, &[Ids::ADMIN]);

    Arc::new(dir)
}

fn grant(dir: &MemoryDirectory, role: &str, permissions: &[&str]) {
    for name in permissions {
        if let Some(permission) = Permission::parse(name) {
            dir.grant_permission(&RoleId::new(role), permission);
        }
    }
}

fn assign(dir: &MemoryDirectory, principal: &str, roles: &[&str]) {
    for role in roles {
        dir.assign_role(&PrincipalId::new(principal), &RoleId::new(*role));
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Token settings with the test secret.
pub fn token_config() -> TokenConfig {
    TokenConfig::with_secret(TEST_SECRET)
}

/// A full configuration with the test secret and default limits.
pub fn warden_config() -> WardenConfig {
    WardenConfig {
        token: token_config(),
        ..Default::default()
    }
}

/// A YAML document equivalent to a production-style configuration.
pub fn sample_yaml() -> &'static str {
    r#"
token:
  secret: "test-secret-key-that-is-long-enough-for-testing"
  issuer: "warden-test"
  algorithm: HS256
  access_ttl_secs: 900
  refresh_ttl_secs: 86400
  rotate_refresh_tokens: true

permissions:
  cache_ttl_secs: 30
  failure_policy: fail_closed

rate_limit:
  backend: memory
  default:
    limit: 100
    window_secs: 60
  source:
    limit: 300
    window_secs: 60
  routes:
    login:
      limit: 5
      window_secs: 60
      key: source

store:
  timeout_ms: 1500

logging:
  level: debug
  format: json
"#
}

// =============================================================================
// Test Environment
// =============================================================================

/// Components sharing one manual clock, bus, directory and key-value store.
pub struct TestEnv {
    /// Manual clock starting at [`START_UNIX`].
    pub clock: ManualClock,
    /// Directory change bus.
    pub bus: InvalidationBus,
    /// Seeded directory publishing to `bus`.
    pub directory: Arc<MemoryDirectory>,
    /// In-memory key-value store on `clock`.
    pub kv: Arc<MemoryKvStore>,
}

impl TestEnv {
    /// Creates a fresh environment.
    pub fn new() -> Self {
        let clock = ManualClock::at_unix(START_UNIX);
        let bus = InvalidationBus::new(64);
        let directory = seeded_directory(Some(bus.clone()));
        let kv = Arc::new(MemoryKvStore::with_clock(Arc::new(clock.clone())));
        Self {
            clock,
            bus,
            directory,
            kv,
        }
    }

    /// The clock as a shared handle.
    pub fn shared_clock(&self) -> SharedClock {
        Arc::new(self.clock.clone())
    }

    /// A token service over this environment.
    pub fn token_service(&self, config: TokenConfig) -> TokenService {
        TokenService::builder(config)
            .directory(self.directory.clone())
            .kv_store(self.kv.clone())
            .clock(self.shared_clock())
            .build()
            .expect("token service fixture")
    }

    /// A resolver over this environment.
    pub fn resolver(&self, cache_ttl: Duration) -> PermissionResolver {
        PermissionResolver::new(self.directory.clone(), cache_ttl)
            .with_clock(self.shared_clock())
            .with_store_access(StoreAccess::default())
    }

    /// A gate over this environment.
    pub fn gate(&self, config: &WardenConfig) -> AuthGate {
        AuthGate::from_config(
            config,
            self.directory.clone(),
            Some(self.kv.clone()),
            self.shared_clock(),
        )
        .expect("gate fixture")
    }

    /// Looks up a seeded principal.
    pub fn principal(&self, id: &str) -> Principal {
        self.directory
            .principal(&PrincipalId::new(id))
            .expect("seeded principal")
    }

    /// Issues an access token for a seeded principal.
    pub fn access_token(&self, service: &TokenService, id: &str) -> String {
        service
            .issue(&self.principal(id), Vec::new(), TokenKind::Access)
            .expect("issue access token")
            .token
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Token Forgery
// =============================================================================

/// Splits a compact token into its decoded header, decoded claims and raw
/// signature segment.
pub fn split_token(token: &str) -> (serde_json::Value, serde_json::Value, String) {
    let mut parts = token.split('.');
    let header = decode_segment(parts.next().unwrap_or_default());
    let claims = decode_segment(parts.next().unwrap_or_default());
    let signature = parts.next().unwrap_or_default().to_string();
    (header, claims, signature)
}

/// Assembles a token from arbitrary parts without signing it.
pub fn forge_token(header: &serde_json::Value, claims: &serde_json::Value, signature: &str) -> String {
    format!(
        "{}.{}.{}",
        encode_segment(header),
        encode_segment(claims),
        signature
    )
}

fn encode_segment(value: &serde_json::Value) -> String {
    URL_SAFE_NO_PAD.encode(value.to_string())
}

fn decode_segment(segment: &str) -> serde_json::Value {
    URL_SAFE_NO_PAD
        .decode(segment)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or(serde_json::Value::Null)
}
