// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-request cancellation and deadline propagation.
//!
//! Every method that may block on a store takes a [`CallContext`] as its
//! first parameter. The context carries a [`CancellationToken`] (fired on
//! client disconnect or shutdown) and an optional absolute deadline.
//! [`CallContext::guard`] bounds a single store call by the tighter of the
//! deadline and the store timeout.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{StoreError, StoreResult};

/// Cancellation and deadline for one unit of work.
#[derive(Debug, Clone)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Creates a context with no deadline.
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Creates a context that expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline_in(timeout)
    }

    /// Creates a context driven by an existing token.
    pub fn from_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Sets or tightens the deadline.
    pub fn deadline_in(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
        self
    }

    /// Derives a context whose cancellation follows this one.
    ///
    /// Cancelling the child does not cancel the parent.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancels this context and every child.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the underlying token.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Runs one store call under this context.
    ///
    /// The call is bounded by `limit` or the remaining deadline, whichever
    /// is shorter. Cancellation drops the in-flight future and yields
    /// [`StoreError::Cancelled`].
    pub async fn guard<T, F>(&self, operation: &str, limit: Duration, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        if self.is_cancelled() {
            return Err(StoreError::cancelled(operation));
        }

        let bound = match self.remaining() {
            Some(left) => left.min(limit),
            None => limit,
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StoreError::cancelled(operation)),
            outcome = tokio::time::timeout(bound, fut) => match outcome {
                Ok(result) => result,
                Err(_) => Err(StoreError::timeout(operation, bound)),
            },
        }
    }

    /// Sleeps for `delay` unless cancelled first.
    pub async fn sleep(&self, operation: &str, delay: Duration) -> StoreResult<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StoreError::cancelled(operation)),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}
