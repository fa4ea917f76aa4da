// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Request admission.
//!
//! [`AuthGate::admit`] runs, in order:
//!
//! 1. The coarse per-address limiter, before any token parsing
//! 2. Bearer extraction
//! 3. Access token validation (and the revocation list, when enabled)
//! 4. The required-permission check
//! 5. The route-class limiter, keyed by principal or address
//!
//! Callers only ever see a [`GateError`]. The precise reason is logged and
//! counted in [`GateMetrics`].

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use warden_config::{ConfigResult, FailurePolicy, KeyBy, WardenConfig};
use warden_core::{
    CallContext, InvalidationBus, PermissionSet, SharedClock, SharedDirectory, SharedKv,
};

use crate::error::{ErrorKind, GateError, TokenError};
use crate::metrics::GateMetrics;
use crate::permission::PermissionResolver;
use crate::ratelimit::{RateLimitDecision, RateLimiter};
use crate::store_access::StoreAccess;
use crate::token::{TokenClaims, TokenKind, TokenService};

const DEFAULT_CLASS: &str = "default";
const SOURCE_CLASS: &str = "source";

// =============================================================================
// Request / Admission
// =============================================================================

/// What the gate needs to know about one request.
#[derive(Debug, Clone, Default)]
pub struct GateRequest {
    /// Raw `Authorization` header value.
    pub authorization: Option<String>,
    /// Client network address.
    pub source: Option<IpAddr>,
    /// Permission the route requires.
    pub required_permission: Option<String>,
    /// Named rate-limit class of the route.
    pub route_class: Option<String>,
}

impl GateRequest {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `Authorization` header value.
    pub fn authorization(mut self, header: impl Into<String>) -> Self {
        self.authorization = Some(header.into());
        self
    }

    /// Sets a bearer token.
    pub fn bearer(self, token: &str) -> Self {
        self.authorization(format!("Bearer {token}"))
    }

    /// Sets the client address.
    pub fn source(mut self, addr: IpAddr) -> Self {
        self.source = Some(addr);
        self
    }

    /// Requires a permission.
    pub fn require(mut self, permission: impl Into<String>) -> Self {
        self.required_permission = Some(permission.into());
        self
    }

    /// Selects a route class.
    pub fn route(mut self, class: impl Into<String>) -> Self {
        self.route_class = Some(class.into());
        self
    }
}

/// An admitted request.
#[derive(Debug, Clone)]
pub struct Admission {
    /// Validated access token claims.
    pub claims: TokenClaims,
    /// Effective permissions of the principal.
    pub permissions: Arc<PermissionSet>,
    /// Quota state after this request, when limiting is enabled.
    pub rate_limit: Option<RateLimitDecision>,
}

#[derive(Debug, Clone)]
struct RouteLimiter {
    limiter: RateLimiter,
    key_by: KeyBy,
}

// =============================================================================
// AuthGate
// =============================================================================

/// Authentication, authorization and rate limiting in front of a handler.
#[derive(Clone)]
pub struct AuthGate {
    tokens: TokenService,
    resolver: PermissionResolver,
    default_limiter: Option<RouteLimiter>,
    routes: HashMap<String, RouteLimiter>,
    source_limiter: Option<RateLimiter>,
    permission_policy: FailurePolicy,
    sweep_interval: Duration,
    idle_windows: u32,
    metrics: Arc<GateMetrics>,
}

impl AuthGate {
    /// Creates a gate with no rate limiting and fail-closed permission
    /// resolution.
    pub fn new(tokens: TokenService, resolver: PermissionResolver) -> Self {
        Self {
            tokens,
            resolver,
            default_limiter: None,
            routes: HashMap::new(),
            source_limiter: None,
            permission_policy: FailurePolicy::FailClosed,
            sweep_interval: Duration::from_secs(60),
            idle_windows: 3,
            metrics: Arc::new(GateMetrics::new()),
        }
    }

    /// Builds every component from configuration.
    pub fn from_config(
        config: &WardenConfig,
        directory: SharedDirectory,
        kv: Option<SharedKv>,
        clock: SharedClock,
    ) -> ConfigResult<Self> {
        config.validate()?;
        let access = StoreAccess::from_config(&config.store, &config.permissions);

        let mut builder = TokenService::builder(config.token.clone())
            .directory(directory.clone())
            .clock(clock.clone())
            .store_access(access);
        if let Some(kv) = &kv {
            builder = builder.kv_store(kv.clone());
        }
        let tokens = builder.build()?;

        let resolver =
            PermissionResolver::from_config(directory, &config.permissions, access, clock.clone());

        let mut gate = Self::new(tokens, resolver)
            .with_permission_policy(config.permissions.failure_policy);
        gate.sweep_interval = config.rate_limit.sweep_interval();
        gate.idle_windows = config.rate_limit.idle_windows;

        let limits = &config.rate_limit;
        if limits.enabled {
            let build = |rule, class: &str| {
                RateLimiter::from_rule(rule, class, limits, kv.clone(), clock.clone(), access)
            };

            gate = gate.with_default_limiter(build(limits.default, DEFAULT_CLASS)?);
            for (name, route) in &limits.routes {
                gate = gate.with_route(name.clone(), build(route.rule(), name)?, route.key);
            }
            if let Some(rule) = limits.source {
                gate = gate.with_source_limiter(build(rule, SOURCE_CLASS)?);
            }
        }

        info!(
            rate_limiting = limits.enabled,
            backend = ?limits.backend,
            routes = limits.routes.len(),
            permission_policy = ?config.permissions.failure_policy,
            "Auth gate initialized"
        );
        Ok(gate)
    }

    /// Sets the principal-keyed limiter for routes without a class.
    pub fn with_default_limiter(mut self, limiter: RateLimiter) -> Self {
        self.default_limiter = Some(RouteLimiter {
            limiter,
            key_by: KeyBy::Principal,
        });
        self
    }

    /// Adds a named route class.
    pub fn with_route(mut self, class: impl Into<String>, limiter: RateLimiter, key_by: KeyBy) -> Self {
        self.routes.insert(class.into(), RouteLimiter { limiter, key_by });
        self
    }

    /// Sets the coarse per-address limiter.
    pub fn with_source_limiter(mut self, limiter: RateLimiter) -> Self {
        self.source_limiter = Some(limiter);
        self
    }

    /// Sets the behaviour when permission resolution fails.
    pub fn with_permission_policy(mut self, policy: FailurePolicy) -> Self {
        self.permission_policy = policy;
        self
    }

    /// The token service.
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// The permission resolver.
    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    /// Returns a reference to the metrics.
    pub fn metrics(&self) -> &Arc<GateMetrics> {
        &self.metrics
    }

    /// Starts the housekeeping tasks: idle-bucket sweepers for in-process
    /// limiters, the permission cache purger, expiry of the token store when
    /// it needs it, and the invalidation listener if a bus is given. All run
    /// every sweep interval until `shutdown` fires.
    pub fn spawn_background(
        &self,
        bus: Option<&InvalidationBus>,
        shutdown: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        let limiters = self
            .default_limiter
            .iter()
            .map(|route| &route.limiter)
            .chain(self.routes.values().map(|route| &route.limiter))
            .chain(self.source_limiter.iter());
        for limiter in limiters {
            if let Some(local) = limiter.as_local() {
                handles.push(local.spawn_sweeper(
                    self.sweep_interval,
                    self.idle_windows,
                    shutdown.clone(),
                ));
            }
        }
        handles.push(
            self.resolver
                .spawn_purger(self.sweep_interval, shutdown.clone()),
        );
        if let Some(kv) = self.tokens.kv_store() {
            handles.push(spawn_kv_purger(kv.clone(), self.sweep_interval, shutdown.clone()));
        }
        if let Some(bus) = bus {
            handles.push(self.resolver.spawn_invalidation_listener(bus));
        }
        handles
    }

    /// Decides whether a request may proceed.
    pub async fn admit(&self, cx: &CallContext, request: &GateRequest) -> Result<Admission, GateError> {
        self.metrics.record_request();

        if let (Some(limiter), Some(addr)) = (&self.source_limiter, request.source) {
            self.check_limit(cx, limiter, &addr.to_string(), SOURCE_CLASS)
                .await?;
        }

        let token = match request.authorization.as_deref().and_then(extract_bearer_token) {
            Some(token) => token,
            None => {
                debug!("No bearer token provided");
                return Err(self.reject(ErrorKind::Unauthenticated, GateError::Unauthenticated));
            }
        };

        let claims = self
            .tokens
            .validate_kind(token, TokenKind::Access)
            .map_err(|err| self.token_rejection(err))?;

        match self.tokens.is_revoked(cx, &claims.jti).await {
            Ok(false) => {}
            Ok(true) => {
                debug!(principal = %claims.sub, jti = %claims.jti, "Revoked token presented");
                return Err(self.reject(ErrorKind::Unauthenticated, GateError::Unauthenticated));
            }
            Err(err) => return Err(self.token_rejection(err)),
        }

        let principal = claims.principal_id();
        let mut degraded = false;
        let permissions = match self.resolver.expand(cx, &principal).await {
            Ok(set) => set,
            Err(err) if !err.is_cancelled() && self.permission_policy.admits() => {
                warn!(principal = %principal, error = %err, "Permission lookup failed; admitting (fail-open)");
                self.metrics.record_fail_open();
                degraded = true;
                Arc::new(PermissionSet::new())
            }
            Err(err) => {
                warn!(principal = %principal, error = %err, "Permission lookup failed");
                return Err(self.reject(ErrorKind::StoreUnavailable, GateError::Unavailable));
            }
        };

        if let Some(required) = &request.required_permission {
            if !degraded && !permissions.contains(required) {
                debug!(principal = %principal, permission = %required, "Permission denied");
                return Err(self.reject(ErrorKind::Forbidden, GateError::Forbidden));
            }
        }

        let rate_limit = match self.route_limiter(request.route_class.as_deref()) {
            Some((class, route)) => {
                let key = match (route.key_by, request.source) {
                    (KeyBy::Source, Some(addr)) => addr.to_string(),
                    _ => claims.sub.clone(),
                };
                Some(self.check_limit(cx, &route.limiter, &key, class).await?)
            }
            None => None,
        };

        self.metrics.record_admitted();
        debug!(principal = %principal, "Request admitted");
        Ok(Admission {
            claims,
            permissions,
            rate_limit,
        })
    }

    fn route_limiter<'a>(&'a self, class: Option<&'a str>) -> Option<(&'a str, &'a RouteLimiter)> {
        if let Some(name) = class {
            if let Some(route) = self.routes.get(name) {
                return Some((name, route));
            }
            debug!(class = name, "Unknown route class; using default limit");
        }
        self.default_limiter
            .as_ref()
            .map(|route| (DEFAULT_CLASS, route))
    }

    async fn check_limit(
        &self,
        cx: &CallContext,
        limiter: &RateLimiter,
        key: &str,
        class: &str,
    ) -> Result<RateLimitDecision, GateError> {
        match limiter.allow(cx, key).await {
            Ok(decision) if decision.allowed => Ok(decision),
            Ok(decision) => {
                debug!(class, key, limit = decision.limit, "Rate limit exceeded");
                Err(self.reject(
                    ErrorKind::RateLimited,
                    GateError::RateLimited {
                        limit: decision.limit,
                        remaining: decision.remaining,
                        reset_at: decision.reset_at,
                    },
                ))
            }
            Err(err) => {
                warn!(class, error = %err, "Rate limiter unavailable");
                Err(self.reject(err.kind(), GateError::Unavailable))
            }
        }
    }

    fn token_rejection(&self, err: TokenError) -> GateError {
        let kind = err.kind();
        if err.is_credential_error() {
            debug!(kind = %kind, error = %err, "Token rejected");
            self.reject(kind, GateError::Unauthenticated)
        } else {
            warn!(kind = %kind, error = %err, "Token check failed");
            self.reject(kind, GateError::Unavailable)
        }
    }

    fn reject(&self, kind: ErrorKind, err: GateError) -> GateError {
        self.metrics.record_rejection(kind);
        err
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("tokens", &self.tokens)
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .field("source_limiter", &self.source_limiter.is_some())
            .field("permission_policy", &self.permission_policy)
            .finish()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn spawn_kv_purger(kv: SharedKv, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    kv.purge_expired();
                }
            }
        }
    })
}

/// Extracts the token from an `Authorization: Bearer <token>` value.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

// =============================================================================
// Tests
// =============================================================================
