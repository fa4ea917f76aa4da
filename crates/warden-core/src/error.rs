// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for store collaborators.
//!
//! Every directory or key-value call surfaces a [`StoreError`]. Callers use
//! [`StoreError::is_retryable`] to decide whether a read-path lookup may be
//! attempted once more.

use std::time::Duration;

use thiserror::Error;

/// Failure of a call to an external store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be reached or refused the call.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },

    /// The call did not finish within its time bound.
    #[error("Store call '{operation}' timed out after {elapsed:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The bound that was exceeded.
        elapsed: Duration,
    },

    /// The enclosing request was cancelled while the call was in flight.
    #[error("Store call '{operation}' cancelled")]
    Cancelled {
        /// The abandoned operation.
        operation: String,
    },

    /// The store answered with something we could not interpret.
    #[error("Unexpected store response: {message}")]
    Protocol {
        /// Error message.
        message: String,
    },
}

impl StoreError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Returns `true` if a retry might succeed.
    ///
    /// Cancelled calls are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }

    /// Returns `true` if the caller abandoned the call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            Self::unavailable(err.to_string())
        } else if err.is_timeout() {
            Self::timeout("redis", Duration::ZERO)
        } else {
            Self::protocol(err.to_string())
        }
    }
}

/// Result alias for store calls.
pub type StoreResult<T> = Result<T, StoreError>;
