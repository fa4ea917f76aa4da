// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Retry policy for read-path store lookups.
//!
//! Only transient failures ([`StoreError::is_retryable`]) are retried, and
//! never after the caller has cancelled. Crypto and parsing failures never
//! reach this module.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::CallContext;
use crate::error::{StoreError, StoreResult};

/// How often and how patiently a read is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Pause before each retry.
    #[serde(with = "duration_millis")]
    pub backoff: Duration,
}

impl RetryPolicy {
    /// One retry after `backoff`.
    pub fn once(backoff: Duration) -> Self {
        Self {
            max_retries: 1,
            backoff,
        }
    }

    /// No retries.
    pub fn never() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Runs `call`, retrying transient failures.
    pub async fn run<T, F, Fut>(
        &self,
        cx: &CallContext,
        operation: &str,
        mut call: F,
    ) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(cx, &err, attempt) => {
                    attempt += 1;
                    warn!(operation, attempt, error = %err, "Retrying store read");
                    cx.sleep(operation, self.backoff).await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn should_retry(&self, cx: &CallContext, err: &StoreError, attempt: u32) -> bool {
        attempt < self.max_retries && err.is_retryable() && !cx.is_cancelled()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once(Duration::from_millis(50))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
