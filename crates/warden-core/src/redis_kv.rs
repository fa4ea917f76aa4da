// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Redis-backed [`KvStore`].
//!
//! Counters are incremented by a server-side Lua script so that `INCR` and
//! `PEXPIRE` execute as one unit. A crash between the two calls would
//! otherwise leave a counter that never expires.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::info;

use crate::context::CallContext;
use crate::error::{StoreError, StoreResult};
use crate::store::{Counter, KvStore};

/// Increments KEYS[1]; sets its expiry to ARGV[1] ms when the counter is new
/// or somehow lost its expiry. Returns `{count, pttl}`.
const INCR_WITH_EXPIRY: &str = r#"
local count = redis.call('INCR', KEYS[1])
local ttl = redis.call('PTTL', KEYS[1])
if count == 1 or ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

/// [`KvStore`] on a Redis server.
#[derive(Clone)]
pub struct RedisKvStore {
    manager: ConnectionManager,
    prefix: Arc<String>,
    incr_script: Arc<Script>,
}

impl RedisKvStore {
    /// Connects to `url` and namespaces every key under `prefix`.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> StoreResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|err| StoreError::unavailable(format!("redis client: {err}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|err| StoreError::unavailable(format!("redis connect: {err}")))?;
        let prefix = prefix.into();
        info!(prefix = %prefix, "Connected to redis key-value store");
        Ok(Self {
            manager,
            prefix: Arc::new(prefix),
            incr_script: Arc::new(Script::new(INCR_WITH_EXPIRY)),
        })
    }

    fn namespaced_key(&self, key: &str) -> String {
        namespaced(&self.prefix, key)
    }
}

fn namespaced(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}:{key}")
    }
}

fn millis(duration: Duration) -> u64 {
    (duration.as_millis() as u64).max(1)
}

impl std::fmt::Debug for RedisKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKvStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn incr_with_expiry(
        &self,
        cx: &CallContext,
        key: &str,
        window: Duration,
    ) -> StoreResult<Counter> {
        if cx.is_cancelled() {
            return Err(StoreError::cancelled("incr_with_expiry"));
        }
        let mut conn = self.manager.clone();
        let reply: Vec<i64> = self
            .incr_script
            .key(self.namespaced_key(key))
            .arg(millis(window))
            .invoke_async(&mut conn)
            .await?;
        match reply.as_slice() {
            [count, ttl] if *count > 0 => Ok(Counter {
                count: *count as u64,
                ttl: Duration::from_millis((*ttl).max(0) as u64),
            }),
            other => Err(StoreError::protocol(format!(
                "unexpected incr reply: {other:?}"
            ))),
        }
    }

    async fn get(&self, cx: &CallContext, key: &str) -> StoreResult<Option<String>> {
        if cx.is_cancelled() {
            return Err(StoreError::cancelled("get"));
        }
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(self.namespaced_key(key)).await?;
        Ok(value)
    }

    async fn set_with_ttl(
        &self,
        cx: &CallContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<()> {
        if cx.is_cancelled() {
            return Err(StoreError::cancelled("set_with_ttl"));
        }
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(self.namespaced_key(key))
            .arg(value)
            .arg("PX")
            .arg(millis(ttl))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        cx: &CallContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        if cx.is_cancelled() {
            return Err(StoreError::cancelled("set_if_absent"));
        }
        let mut conn = self.manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.namespaced_key(key))
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, cx: &CallContext, key: &str) -> StoreResult<bool> {
        if cx.is_cancelled() {
            return Err(StoreError::cancelled("delete"));
        }
        let mut conn = self.manager.clone();
        let removed: i64 = conn.del(self.namespaced_key(key)).await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_keys() {
        assert_eq!(namespaced("warden", "rl:u-1"), "warden:rl:u-1");
        assert_eq!(namespaced("", "rl:u-1"), "rl:u-1");
    }

    #[test]
    fn test_millis_never_zero() {
        assert_eq!(millis(Duration::from_secs(60)), 60_000);
        assert_eq!(millis(Duration::from_micros(10)), 1);
    }
}
