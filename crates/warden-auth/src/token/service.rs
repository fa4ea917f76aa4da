// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Token issue, validation, refresh and revocation.
//!
//! # Validation order
//!
//! 1. Three non-empty segments
//! 2. Header `alg` equals the configured algorithm (rejects `none` and any
//!    other value before signature verification)
//! 3. Signature and required claims
//! 4. Time window against the injected clock
//! 5. Claim invariants (`nbf <= iat < exp`, lifetime bound per kind)
//!
//! `exp`/`nbf` checks are done here rather than by `jsonwebtoken` so that the
//! clock is injectable and the boundary is exact: a token is expired at
//! `now >= exp`.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use warden_config::{ConfigError, ConfigResult, SigningAlgorithm, TokenConfig};
use warden_core::{
    CallContext, Principal, SharedClock, SharedDirectory, SharedKv, StoreError, SystemClock,
};

use super::claims::{TokenClaims, TokenKind};
use crate::error::{TokenError, TokenResult};
use crate::store_access::StoreAccess;

const USED_PREFIX: &str = "tok:used";
const REVOKED_PREFIX: &str = "tok:revoked";

// =============================================================================
// Results
// =============================================================================

/// A signed token together with the claims it carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Compact JWT.
    pub token: String,
    /// Claims inside `token`.
    pub claims: TokenClaims,
}

/// Result of a refresh exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// New access token.
    pub access: IssuedToken,
    /// Replacement refresh token; present only when rotation is enabled.
    pub refresh: Option<IssuedToken>,
}

#[derive(Debug, Deserialize)]
struct RawHeader {
    alg: Option<String>,
}

// =============================================================================
// TokenService
// =============================================================================

/// Issues and verifies signed session tokens.
///
/// The signing secret is loaded once from [`TokenConfig`] at construction
/// and never changes afterwards.
#[derive(Clone)]
pub struct TokenService {
    config: Arc<TokenConfig>,
    algorithm: Algorithm,
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
    clock: SharedClock,
    directory: SharedDirectory,
    kv: Option<SharedKv>,
    access: StoreAccess,
}

impl TokenService {
    /// Starts building a service from `config`.
    pub fn builder(config: TokenConfig) -> TokenServiceBuilder {
        TokenServiceBuilder::new(config)
    }

    /// Issues a token of `kind` for `principal` with the given role snapshot.
    pub fn issue(
        &self,
        principal: &Principal,
        roles: Vec<String>,
        kind: TokenKind,
    ) -> TokenResult<IssuedToken> {
        let ttl = match kind {
            TokenKind::Access => self.config.access_ttl_duration(),
            TokenKind::Refresh => self.config.refresh_ttl_duration(),
        };
        let claims = TokenClaims::new(
            principal,
            roles,
            kind,
            &self.config.issuer,
            self.clock.unix_seconds(),
            ttl,
        );
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| TokenError::signing(e.to_string()))?;
        debug!(principal = %claims.sub, kind = %kind, jti = %claims.jti, "Issued token");
        Ok(IssuedToken { token, claims })
    }

    /// Validates `token` and returns its claims.
    pub fn validate(&self, token: &str) -> TokenResult<TokenClaims> {
        let mut segments = token.split('.');
        let (header, signature) =
            match (segments.next(), segments.next(), segments.next(), segments.next()) {
                (Some(h), Some(c), Some(s), None)
                    if !h.is_empty() && !c.is_empty() && !s.is_empty() =>
                {
                    (h, s)
                }
                _ => return Err(TokenError::malformed("expected three non-empty segments")),
            };
        self.check_header(header)?;
        // A damaged signature segment is a signature failure, not a shape one.
        if URL_SAFE_NO_PAD.decode(signature).is_err() {
            return Err(TokenError::bad_signature("signature is not base64url"));
        }

        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(map_jwt_error)?
            .claims;

        let now = self.clock.unix_seconds();
        let leeway = self.config.leeway_secs as i64;
        if now < claims.nbf - leeway {
            return Err(TokenError::NotYetValid {
                not_before: claims.nbf,
            });
        }
        if now >= claims.exp + leeway {
            return Err(TokenError::Expired {
                expired_at: claims.exp,
            });
        }

        claims.check_invariants(self.max_lifetime(claims.kind))?;
        Ok(claims)
    }

    /// Validates `token` and requires it to be of `kind`.
    pub fn validate_kind(&self, token: &str, kind: TokenKind) -> TokenResult<TokenClaims> {
        let claims = self.validate(token)?;
        if claims.kind != kind {
            return Err(TokenError::WrongKind {
                expected: kind,
                actual: claims.kind,
            });
        }
        Ok(claims)
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// Active status and roles are re-read from the directory; the role
    /// snapshot inside the refresh token is ignored. With rotation enabled
    /// the refresh token is consumed and a replacement is returned.
    pub async fn refresh(&self, cx: &CallContext, refresh_token: &str) -> TokenResult<TokenPair> {
        let claims = self.validate_kind(refresh_token, TokenKind::Refresh)?;

        if self.is_revoked(cx, &claims.jti).await? {
            return Err(TokenError::Revoked { jti: claims.jti });
        }

        let principal_id = claims.principal_id();
        let directory = &self.directory;
        let id = &principal_id;

        let active = self
            .access
            .read(cx, "is_principal_active", move || {
                directory.is_principal_active(cx, id)
            })
            .await?;
        if !active {
            info!(principal = %principal_id, "Refresh refused for inactive principal");
            return Err(TokenError::PrincipalInactive {
                principal: principal_id.into_inner(),
            });
        }

        let roles: Vec<String> = self
            .access
            .read(cx, "roles_for_principal", move || {
                directory.roles_for_principal(cx, id)
            })
            .await?
            .into_iter()
            .map(|role| role.name)
            .collect();

        if self.config.rotate_refresh_tokens {
            self.consume(cx, &claims).await?;
        }

        let principal = claims.principal();
        let access = self.issue(&principal, roles.clone(), TokenKind::Access)?;
        let refresh = if self.config.rotate_refresh_tokens {
            Some(self.issue(&principal, roles, TokenKind::Refresh)?)
        } else {
            None
        };

        debug!(
            principal = %principal.id,
            rotated = refresh.is_some(),
            "Refreshed access token"
        );
        Ok(TokenPair { access, refresh })
    }

    /// Revokes a validated token until its natural expiry.
    ///
    /// Returns `false` when revocation tracking is disabled; such tokens
    /// stay valid until they expire.
    pub async fn revoke(&self, cx: &CallContext, claims: &TokenClaims) -> TokenResult<bool> {
        if !self.config.revocation_enabled {
            warn!(jti = %claims.jti, "Revocation requested but tracking is disabled");
            return Ok(false);
        }
        let ttl = self.remaining_ttl(claims);
        if ttl.is_zero() {
            return Ok(true);
        }
        let kv = self.kv()?;
        let key = format!("{REVOKED_PREFIX}:{}", claims.jti);
        self.access
            .write(cx, "set_with_ttl", kv.set_with_ttl(cx, &key, &claims.sub, ttl))
            .await?;
        info!(principal = %claims.sub, jti = %claims.jti, "Token revoked");
        Ok(true)
    }

    /// Returns `true` if `jti` is on the revocation list.
    pub async fn is_revoked(&self, cx: &CallContext, jti: &str) -> TokenResult<bool> {
        if !self.config.revocation_enabled {
            return Ok(false);
        }
        let kv = self.kv()?;
        let key = format!("{REVOKED_PREFIX}:{jti}");
        let key = key.as_str();
        let found = self
            .access
            .read(cx, "get", move || kv.get(cx, key))
            .await?;
        Ok(found.is_some())
    }

    /// Whether revocation tracking is on.
    pub fn revocation_enabled(&self) -> bool {
        self.config.revocation_enabled
    }

    /// Whether refresh tokens are single-use.
    pub fn rotation_enabled(&self) -> bool {
        self.config.rotate_refresh_tokens
    }

    /// The configured issuer.
    pub fn issuer(&self) -> &str {
        &self.config.issuer
    }

    fn check_header(&self, segment: &str) -> TokenResult<()> {
        let bytes = URL_SAFE_NO_PAD
            .decode(segment)
            .map_err(|_| TokenError::malformed("header is not base64url"))?;
        let header: RawHeader = serde_json::from_slice(&bytes)
            .map_err(|_| TokenError::malformed("header is not a JSON object"))?;
        let expected = self.config.algorithm.as_str();
        match header.alg.as_deref() {
            Some(alg) if alg == expected => Ok(()),
            Some(alg) => Err(TokenError::bad_signature(format!(
                "unexpected algorithm '{alg}'"
            ))),
            None => Err(TokenError::bad_signature("missing algorithm")),
        }
    }

    /// Marks a refresh token as used. Fails if it already was.
    async fn consume(&self, cx: &CallContext, claims: &TokenClaims) -> TokenResult<()> {
        let kv = self.kv()?;
        let key = format!("{USED_PREFIX}:{}", claims.jti);
        let ttl = self.remaining_ttl(claims).max(Duration::from_secs(1));
        let first = self
            .access
            .write(cx, "set_if_absent", kv.set_if_absent(cx, &key, &claims.sub, ttl))
            .await?;
        if !first {
            warn!(principal = %claims.sub, jti = %claims.jti, "Refresh token reuse detected");
            return Err(TokenError::AlreadyUsed {
                jti: claims.jti.clone(),
            });
        }
        Ok(())
    }

    fn remaining_ttl(&self, claims: &TokenClaims) -> Duration {
        let now = self.clock.unix_seconds();
        Duration::from_secs(claims.remaining_secs(now) + self.config.leeway_secs)
    }

    fn max_lifetime(&self, kind: TokenKind) -> Duration {
        Duration::from_secs(match kind {
            TokenKind::Access => self.config.max_access_ttl_secs,
            TokenKind::Refresh => self.config.max_refresh_ttl_secs,
        })
    }

    /// The key-value store backing rotation and revocation, if any.
    pub fn kv_store(&self) -> Option<&SharedKv> {
        self.kv.as_ref()
    }

    fn kv(&self) -> TokenResult<&SharedKv> {
        self.kv
            .as_ref()
            .ok_or_else(|| StoreError::unavailable("no key-value store attached").into())
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.config.issuer)
            .field("algorithm", &self.algorithm)
            .field("access_ttl_secs", &self.config.access_ttl_secs)
            .field("rotation", &self.config.rotate_refresh_tokens)
            .field("revocation", &self.config.revocation_enabled)
            .finish()
    }
}

fn jwt_algorithm(algorithm: SigningAlgorithm) -> Algorithm {
    match algorithm {
        SigningAlgorithm::HS256 => Algorithm::HS256,
        SigningAlgorithm::HS384 => Algorithm::HS384,
        SigningAlgorithm::HS512 => Algorithm::HS512,
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        JwtErrorKind::InvalidSignature => TokenError::bad_signature("signature mismatch"),
        JwtErrorKind::InvalidAlgorithm
        | JwtErrorKind::InvalidAlgorithmName
        | JwtErrorKind::MissingAlgorithm => TokenError::bad_signature("algorithm mismatch"),
        JwtErrorKind::InvalidIssuer => TokenError::malformed("unexpected issuer"),
        JwtErrorKind::MissingRequiredClaim(claim) => {
            TokenError::malformed(format!("missing claim '{claim}'"))
        }
        JwtErrorKind::Base64(_) => TokenError::malformed("segment is not base64url"),
        JwtErrorKind::Json(e) => TokenError::malformed(format!("invalid claims: {e}")),
        JwtErrorKind::Utf8(_) => TokenError::malformed("segment is not UTF-8"),
        _ => TokenError::malformed(err.to_string()),
    }
}

// =============================================================================
// TokenServiceBuilder
// =============================================================================

/// Builder for [`TokenService`].
pub struct TokenServiceBuilder {
    config: TokenConfig,
    directory: Option<SharedDirectory>,
    kv: Option<SharedKv>,
    clock: Option<SharedClock>,
    access: StoreAccess,
}

impl TokenServiceBuilder {
    fn new(config: TokenConfig) -> Self {
        Self {
            config,
            directory: None,
            kv: None,
            clock: None,
            access: StoreAccess::default(),
        }
    }

    /// Sets the directory consulted on refresh.
    pub fn directory(mut self, directory: SharedDirectory) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Sets the key-value store for rotation and revocation tracking.
    pub fn kv_store(mut self, kv: SharedKv) -> Self {
        self.kv = Some(kv);
        self
    }

    /// Sets the clock.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets store timeout and retry behaviour.
    pub fn store_access(mut self, access: StoreAccess) -> Self {
        self.access = access;
        self
    }

    /// Validates the configuration and builds the service.
    pub fn build(self) -> ConfigResult<TokenService> {
        self.config.validate()?;

        let directory = self
            .directory
            .ok_or_else(|| ConfigError::missing_field("token service directory store"))?;
        if self.config.needs_kv_store() && self.kv.is_none() {
            return Err(ConfigError::validation(
                "token",
                "refresh rotation and revocation require a key-value store",
            ));
        }

        let secret = self
            .config
            .secret
            .as_ref()
            .ok_or_else(|| ConfigError::missing_field("token.secret"))?;
        let algorithm = jwt_algorithm(self.config.algorithm);

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        info!(
            issuer = %self.config.issuer,
            algorithm = %self.config.algorithm,
            rotation = self.config.rotate_refresh_tokens,
            revocation = self.config.revocation_enabled,
            "Token service initialized"
        );

        Ok(TokenService {
            encoding_key: Arc::new(EncodingKey::from_secret(secret.expose().as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(secret.expose().as_bytes())),
            validation: Arc::new(validation),
            algorithm,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            directory,
            kv: self.kv,
            access: self.access,
            config: Arc::new(self.config),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{Clock, ManualClock, MemoryDirectory, MemoryKvStore, Role, RoleId};

    const SECRET: &str = "test-secret-key-that-is-long-enough-for-testing";

    fn service(config: TokenConfig) -> (TokenService, ManualClock, Arc<MemoryDirectory>) {
        let clock = ManualClock::at_unix(1_700_000_000);
        let directory = Arc::new(MemoryDirectory::new());
        let kv = Arc::new(MemoryKvStore::with_clock(Arc::new(clock.clone())));
        let svc = TokenService::builder(config)
            .directory(directory.clone())
            .kv_store(kv)
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        (svc, clock, directory)
    }

    fn alice() -> Principal {
        Principal::new("u-1", "alice")
    }

    #[test]
    fn test_issue_and_validate() {
        let (svc, _, _) = service(TokenConfig::with_secret(SECRET));
        let issued = svc
            .issue(&alice(), vec!["admin".to_string()], TokenKind::Access)
            .unwrap();

        let claims = svc.validate(&issued.token).unwrap();
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.sub, "u-1");
        assert!(claims.has_role("admin"));
        assert_eq!(claims.iss, "warden");
    }

    #[test]
    fn test_short_secret_rejected_at_build() {
        let result = TokenService::builder(TokenConfig::with_secret("short"))
            .directory(Arc::new(MemoryDirectory::new()))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_rotation_requires_kv() {
        let result = TokenService::builder(
            TokenConfig::with_secret(SECRET).rotate_refresh_tokens(true),
        )
        .directory(Arc::new(MemoryDirectory::new()))
        .build();
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_expiry_boundary() {
        let (svc, clock, _) = service(TokenConfig::with_secret(SECRET));
        let issued = svc.issue(&alice(), vec![], TokenKind::Access).unwrap();

        clock.advance_secs(899);
        assert!(svc.validate(&issued.token).is_ok());

        clock.advance_secs(1);
        assert!(matches!(
            svc.validate(&issued.token),
            Err(TokenError::Expired { .. })
        ));
    }

    #[test]
    fn test_not_yet_valid() {
        let (svc, clock, _) = service(TokenConfig::with_secret(SECRET));
        let issued = svc.issue(&alice(), vec![], TokenKind::Access).unwrap();

        clock.set(clock.now() - chrono::Duration::seconds(10));
        assert!(matches!(
            svc.validate(&issued.token),
            Err(TokenError::NotYetValid { .. })
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let (svc1, _, _) = service(TokenConfig::with_secret(SECRET));
        let (svc2, _, _) =
            service(TokenConfig::with_secret("another-secret-that-is-long-enough-to-use"));
        let issued = svc1.issue(&alice(), vec![], TokenKind::Access).unwrap();
        assert!(matches!(
            svc2.validate(&issued.token),
            Err(TokenError::BadSignature { .. })
        ));
    }

    #[test]
    fn test_wrong_issuer() {
        let (svc1, _, _) = service(TokenConfig::with_secret(SECRET).issuer("a"));
        let (svc2, _, _) = service(TokenConfig::with_secret(SECRET).issuer("b"));
        let issued = svc1.issue(&alice(), vec![], TokenKind::Access).unwrap();
        assert!(matches!(
            svc2.validate(&issued.token),
            Err(TokenError::Malformed { .. })
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let (svc, _, _) = service(TokenConfig::with_secret(SECRET));
        for token in ["", "abc", "a.b", "a..c", "a.b.c.d", "invalid.token.here"] {
            assert!(
                matches!(svc.validate(token), Err(TokenError::Malformed { .. })),
                "{token:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_alg_none_rejected() {
        let (svc, _, _) = service(TokenConfig::with_secret(SECRET));
        let issued = svc.issue(&alice(), vec![], TokenKind::Access).unwrap();
        let payload = issued.token.split('.').nth(1).unwrap();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);

        for forged in [
            format!("{header}.{payload}."),
            format!("{header}.{payload}.c2ln"),
        ] {
            let err = svc.validate(&forged).unwrap_err();
            assert!(err.kind() == crate::error::ErrorKind::BadSignature
                || err.kind() == crate::error::ErrorKind::Malformed);
        }

        let forged = format!("{header}.{payload}.c2ln");
        assert!(matches!(
            svc.validate(&forged),
            Err(TokenError::BadSignature { .. })
        ));
    }

    #[test]
    fn test_validate_kind() {
        let (svc, _, _) = service(TokenConfig::with_secret(SECRET));
        let access = svc.issue(&alice(), vec![], TokenKind::Access).unwrap();
        assert!(matches!(
            svc.validate_kind(&access.token, TokenKind::Refresh),
            Err(TokenError::WrongKind { .. })
        ));
    }

    #[tokio::test]
    async fn test_refresh_reloads_roles() {
        let (svc, _, dir) = service(TokenConfig::with_secret(SECRET));
        let principal = alice();
        dir.upsert_principal(principal.clone());
        dir.upsert_role(Role::new("r-ops", "ops"));
        dir.assign_role(&principal.id, &RoleId::new("r-ops"));

        let refresh = svc
            .issue(&principal, vec!["stale".to_string()], TokenKind::Refresh)
            .unwrap();
        let cx = CallContext::new();
        let pair = svc.refresh(&cx, &refresh.token).await.unwrap();

        assert_eq!(pair.access.claims.kind, TokenKind::Access);
        assert_eq!(pair.access.claims.roles, vec!["ops".to_string()]);
        assert!(pair.refresh.is_none());

        // Without rotation the same refresh token keeps working.
        assert!(svc.refresh(&cx, &refresh.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_inactive_principal() {
        let (svc, _, dir) = service(TokenConfig::with_secret(SECRET));
        dir.upsert_principal(alice().deactivated());
        let refresh = svc.issue(&alice(), vec![], TokenKind::Refresh).unwrap();

        let err = svc
            .refresh(&CallContext::new(), &refresh.token)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::PrincipalInactive { .. }));
    }

    #[tokio::test]
    async fn test_refresh_rotation_single_use() {
        let (svc, _, dir) =
            service(TokenConfig::with_secret(SECRET).rotate_refresh_tokens(true));
        dir.upsert_principal(alice());
        let refresh = svc.issue(&alice(), vec![], TokenKind::Refresh).unwrap();
        let cx = CallContext::new();

        let pair = svc.refresh(&cx, &refresh.token).await.unwrap();
        let next = pair.refresh.expect("rotation returns a new refresh token");
        assert_ne!(next.claims.jti, refresh.claims.jti);

        let err = svc.refresh(&cx, &refresh.token).await.unwrap_err();
        assert!(matches!(err, TokenError::AlreadyUsed { .. }));

        assert!(svc.refresh(&cx, &next.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_revocation() {
        let (svc, _, _) = service(TokenConfig::with_secret(SECRET).revocation(true));
        let issued = svc.issue(&alice(), vec![], TokenKind::Access).unwrap();
        let cx = CallContext::new();

        assert!(!svc.is_revoked(&cx, &issued.claims.jti).await.unwrap());
        assert!(svc.revoke(&cx, &issued.claims).await.unwrap());
        assert!(svc.is_revoked(&cx, &issued.claims.jti).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_disabled_is_noop() {
        let (svc, _, _) = service(TokenConfig::with_secret(SECRET));
        let issued = svc.issue(&alice(), vec![], TokenKind::Access).unwrap();
        let cx = CallContext::new();
        assert!(!svc.revoke(&cx, &issued.claims).await.unwrap());
        assert!(!svc.is_revoked(&cx, &issued.claims.jti).await.unwrap());
    }
}
