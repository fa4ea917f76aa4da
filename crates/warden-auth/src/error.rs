// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for token handling, rate limiting and admission.
//!
//! Internal errors ([`TokenError`], [`RateLimitError`], [`StoreError`]) carry
//! precise reasons for logs and metrics. The only error a caller of
//! [`AuthGate`](crate::gate::AuthGate) sees is [`GateError`], which is
//! deliberately generic so rejections cannot be used to probe credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_core::StoreError;

use crate::token::TokenKind;

// =============================================================================
// ErrorKind
// =============================================================================

/// Failure taxonomy used for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Structurally invalid token or claims.
    Malformed,
    /// Signature or algorithm mismatch.
    BadSignature,
    /// Past `exp`.
    Expired,
    /// Before `nbf`.
    NotYetValid,
    /// Single-use refresh token presented twice.
    TokenAlreadyUsed,
    /// Principal disabled.
    PrincipalInactive,
    /// Generic authentication failure.
    Unauthenticated,
    /// Missing permission.
    Forbidden,
    /// Quota exhausted.
    RateLimited,
    /// A store could not answer.
    StoreUnavailable,
    /// Invalid configuration.
    ConfigError,
}

impl ErrorKind {
    /// Number of kinds.
    pub const COUNT: usize = 11;

    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; Self::COUNT] = [
        ErrorKind::Malformed,
        ErrorKind::BadSignature,
        ErrorKind::Expired,
        ErrorKind::NotYetValid,
        ErrorKind::TokenAlreadyUsed,
        ErrorKind::PrincipalInactive,
        ErrorKind::Unauthenticated,
        ErrorKind::Forbidden,
        ErrorKind::RateLimited,
        ErrorKind::StoreUnavailable,
        ErrorKind::ConfigError,
    ];

    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Malformed => "malformed",
            ErrorKind::BadSignature => "bad_signature",
            ErrorKind::Expired => "expired",
            ErrorKind::NotYetValid => "not_yet_valid",
            ErrorKind::TokenAlreadyUsed => "token_already_used",
            ErrorKind::PrincipalInactive => "principal_inactive",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::ConfigError => "config_error",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// TokenError
// =============================================================================

/// Result type for token operations.
pub type TokenResult<T> = Result<T, TokenError>;

/// Token issue, validation and refresh failures.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token or its claims are structurally invalid.
    #[error("Malformed token: {reason}")]
    Malformed {
        /// What was wrong.
        reason: String,
    },

    /// The signature did not verify, or the header named another algorithm.
    #[error("Bad token signature: {reason}")]
    BadSignature {
        /// What was wrong.
        reason: String,
    },

    /// The token is past its expiry.
    #[error("Token expired at {expired_at}")]
    Expired {
        /// The `exp` claim.
        expired_at: i64,
    },

    /// The token is not valid yet.
    #[error("Token not valid before {not_before}")]
    NotYetValid {
        /// The `nbf` claim.
        not_before: i64,
    },

    /// A token of the other kind was presented.
    #[error("Expected {expected} token, got {actual}")]
    WrongKind {
        /// Kind the operation requires.
        expected: TokenKind,
        /// Kind the token declares.
        actual: TokenKind,
    },

    /// A single-use refresh token was presented again.
    #[error("Refresh token '{jti}' has already been used")]
    AlreadyUsed {
        /// The token id.
        jti: String,
    },

    /// The token was revoked before its natural expiry.
    #[error("Token '{jti}' has been revoked")]
    Revoked {
        /// The token id.
        jti: String,
    },

    /// The principal is disabled or no longer exists.
    #[error("Principal '{principal}' is inactive")]
    PrincipalInactive {
        /// The principal id.
        principal: String,
    },

    /// A store lookup failed.
    #[error("Token store error: {0}")]
    Store(#[from] StoreError),

    /// Encoding the token failed.
    #[error("Token signing failed: {message}")]
    Signing {
        /// Error message.
        message: String,
    },
}

impl TokenError {
    /// Creates a malformed error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Creates a bad signature error.
    pub fn bad_signature(reason: impl Into<String>) -> Self {
        Self::BadSignature {
            reason: reason.into(),
        }
    }

    /// Creates a signing error.
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// The taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokenError::Malformed { .. } | TokenError::WrongKind { .. } => ErrorKind::Malformed,
            TokenError::BadSignature { .. } => ErrorKind::BadSignature,
            TokenError::Expired { .. } => ErrorKind::Expired,
            TokenError::NotYetValid { .. } => ErrorKind::NotYetValid,
            TokenError::AlreadyUsed { .. } => ErrorKind::TokenAlreadyUsed,
            TokenError::Revoked { .. } => ErrorKind::Unauthenticated,
            TokenError::PrincipalInactive { .. } => ErrorKind::PrincipalInactive,
            TokenError::Store(_) => ErrorKind::StoreUnavailable,
            TokenError::Signing { .. } => ErrorKind::ConfigError,
        }
    }

    /// Returns `true` if the failure is the caller's credential, not ours.
    pub fn is_credential_error(&self) -> bool {
        !matches!(self, TokenError::Store(_) | TokenError::Signing { .. })
    }
}

// =============================================================================
// RateLimitError
// =============================================================================

/// Rate limiter failures. Only the shared backend produces these, and only
/// under the fail-closed policy.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The counter store could not be reached.
    #[error("Rate limit store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl RateLimitError {
    /// The taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::StoreUnavailable
    }
}

// =============================================================================
// GateError
// =============================================================================

/// Client-visible admission failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// No valid credential.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Authenticated but not permitted.
    #[error("Forbidden")]
    Forbidden,

    /// Quota exhausted.
    #[error("Rate limit exceeded")]
    RateLimited {
        /// Admissions per window.
        limit: u32,
        /// Admissions left in the window.
        remaining: u32,
        /// When the window resets.
        reset_at: DateTime<Utc>,
    },

    /// A dependency failed and policy denies.
    #[error("Service unavailable")]
    Unavailable,
}

impl GateError {
    /// The matching HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::Unauthenticated => 401,
            GateError::Forbidden => 403,
            GateError::RateLimited { .. } => 429,
            GateError::Unavailable => 503,
        }
    }

    /// Returns the error code for categorization.
    pub fn error_code(&self) -> &'static str {
        match self {
            GateError::Unauthenticated => "UNAUTHENTICATED",
            GateError::Forbidden => "FORBIDDEN",
            GateError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            GateError::Unavailable => "SERVICE_UNAVAILABLE",
        }
    }

    /// Returns a message safe to show to end users.
    pub fn user_message(&self) -> String {
        match self {
            GateError::Unauthenticated => "Authentication required".to_string(),
            GateError::Forbidden => "Access denied".to_string(),
            GateError::RateLimited { reset_at, .. } => {
                format!("Too many requests; retry after {}", reset_at.to_rfc3339())
            }
            GateError::Unavailable => "Service temporarily unavailable".to_string(),
        }
    }

    /// The taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GateError::Unauthenticated => ErrorKind::Unauthenticated,
            GateError::Forbidden => ErrorKind::Forbidden,
            GateError::RateLimited { .. } => ErrorKind::RateLimited,
            GateError::Unavailable => ErrorKind::StoreUnavailable,
        }
    }

    /// Seconds until a rate-limited caller may retry.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        match self {
            GateError::RateLimited { reset_at, .. } => {
                Some((*reset_at - now).num_seconds().max(0) as u64)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_token_error_kinds() {
        assert_eq!(TokenError::malformed("x").kind(), ErrorKind::Malformed);
        assert_eq!(
            TokenError::bad_signature("alg none").kind(),
            ErrorKind::BadSignature
        );
        assert_eq!(
            TokenError::Expired { expired_at: 1 }.kind(),
            ErrorKind::Expired
        );
        assert_eq!(
            TokenError::WrongKind {
                expected: TokenKind::Refresh,
                actual: TokenKind::Access
            }
            .kind(),
            ErrorKind::Malformed
        );
        assert_eq!(
            TokenError::Store(StoreError::unavailable("down")).kind(),
            ErrorKind::StoreUnavailable
        );
    }

    #[test]
    fn test_credential_errors() {
        assert!(TokenError::malformed("x").is_credential_error());
        assert!(!TokenError::Store(StoreError::timeout("get", Duration::from_secs(3)))
            .is_credential_error());
    }

    #[test]
    fn test_gate_error_is_generic() {
        let err = GateError::Unauthenticated;
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.to_string(), "Unauthenticated");
        assert_eq!(GateError::Unavailable.status_code(), 503);
        assert_eq!(GateError::Forbidden.error_code(), "FORBIDDEN");
    }

    #[test]
    fn test_retry_after() {
        let now = Utc::now();
        let err = GateError::RateLimited {
            limit: 5,
            remaining: 0,
            reset_at: now + chrono::Duration::seconds(42),
        };
        assert_eq!(err.retry_after_secs(now), Some(42));
        assert_eq!(GateError::Forbidden.retry_after_secs(now), None);
    }

    #[test]
    fn test_error_kind_labels_unique() {
        let labels: std::collections::HashSet<_> =
            ErrorKind::ALL.iter().map(ErrorKind::as_str).collect();
        assert_eq!(labels.len(), ErrorKind::ALL.len());
        for (i, kind) in ErrorKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }
}
