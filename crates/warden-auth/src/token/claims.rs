// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Token claim set.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_core::{Principal, PrincipalId};

use crate::error::{TokenError, TokenResult};

/// Access or refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived; presented on every request.
    Access,
    /// Long-lived; exchanged for new access tokens.
    Refresh,
}

impl TokenKind {
    /// Lowercase name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed claim set.
///
/// Timestamps are Unix seconds. A well-formed claim set satisfies
/// `nbf <= iat < exp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the principal id.
    pub sub: String,

    /// Stable principal handle.
    pub handle: String,

    /// Role names at issue time. Informational only; authorization
    /// decisions reload live roles.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Token kind.
    pub kind: TokenKind,

    /// Issued at.
    pub iat: i64,

    /// Not before.
    pub nbf: i64,

    /// Expires at.
    pub exp: i64,

    /// Issuer.
    pub iss: String,

    /// Unique token id.
    pub jti: String,
}

impl TokenClaims {
    /// Builds claims for `principal` issued at `now` that live for `ttl`.
    pub fn new(
        principal: &Principal,
        roles: Vec<String>,
        kind: TokenKind,
        issuer: &str,
        now: i64,
        ttl: Duration,
    ) -> Self {
        Self {
            sub: principal.id.as_str().to_string(),
            handle: principal.handle.clone(),
            roles,
            kind,
            iat: now,
            nbf: now,
            exp: now.saturating_add(ttl.as_secs() as i64),
            iss: issuer.to_string(),
            jti: Uuid::now_v7().to_string(),
        }
    }

    /// The subject as a principal id.
    pub fn principal_id(&self) -> PrincipalId {
        PrincipalId::new(self.sub.clone())
    }

    /// The principal this token was issued to.
    pub fn principal(&self) -> Principal {
        Principal::new(self.principal_id(), self.handle.clone())
    }

    /// Returns `true` if the role snapshot contains `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Declared lifetime in seconds.
    pub fn lifetime_secs(&self) -> i64 {
        self.exp - self.iat
    }

    /// Seconds until expiry, clamped at zero.
    pub fn remaining_secs(&self, now: i64) -> u64 {
        (self.exp - now).max(0) as u64
    }

    /// Checks `nbf <= iat < exp`, `exp - iat <= max_lifetime` and that the
    /// identity fields are present.
    pub fn check_invariants(&self, max_lifetime: Duration) -> TokenResult<()> {
        if self.sub.is_empty() {
            return Err(TokenError::malformed("empty subject"));
        }
        if self.jti.is_empty() {
            return Err(TokenError::malformed("empty token id"));
        }
        if self.nbf > self.iat {
            return Err(TokenError::malformed("not-before is after issued-at"));
        }
        if self.iat >= self.exp {
            return Err(TokenError::malformed("issued-at is not before expiry"));
        }
        if self.lifetime_secs() as u64 > max_lifetime.as_secs() {
            return Err(TokenError::malformed(format!(
                "{} token lifetime {}s exceeds {}s",
                self.kind,
                self.lifetime_secs(),
                max_lifetime.as_secs()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(ttl_secs: u64) -> TokenClaims {
        TokenClaims::new(
            &Principal::new("u-1", "alice"),
            vec!["admin".to_string()],
            TokenKind::Access,
            "warden",
            1_000,
            Duration::from_secs(ttl_secs),
        )
    }

    #[test]
    fn test_new_claims() {
        let c = claims(900);
        assert_eq!(c.sub, "u-1");
        assert_eq!(c.handle, "alice");
        assert_eq!(c.iat, 1_000);
        assert_eq!(c.nbf, 1_000);
        assert_eq!(c.exp, 1_900);
        assert!(c.has_role("admin"));
        assert!(!c.jti.is_empty());
        assert_eq!(c.remaining_secs(1_800), 100);
        assert_eq!(c.remaining_secs(5_000), 0);
    }

    #[test]
    fn test_unique_ids() {
        assert_ne!(claims(10).jti, claims(10).jti);
    }

    #[test]
    fn test_invariants() {
        let max = Duration::from_secs(3600);
        assert!(claims(900).check_invariants(max).is_ok());
        assert!(claims(7200).check_invariants(max).is_err());
        assert!(claims(0).check_invariants(max).is_err());

        let mut c = claims(900);
        c.nbf = c.iat + 1;
        assert!(c.check_invariants(max).is_err());
    }

    #[test]
    fn test_kind_wire_format() {
        let json = serde_json::to_value(claims(60)).unwrap();
        assert_eq!(json["kind"], "access");
    }
}
