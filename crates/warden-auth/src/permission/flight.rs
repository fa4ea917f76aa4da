// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-key single-flight.
//!
//! The first caller for a key becomes the leader and does the work. Later
//! callers for the same key become followers and receive the leader's
//! result, errors included, through a `watch` slot. A leader dropped before
//! publishing closes the slot and its followers retry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

type FlightMap<T> = Arc<Mutex<HashMap<String, watch::Receiver<Option<T>>>>>;

/// Map of in-flight keys.
pub struct SingleFlight<T> {
    inner: FlightMap<T>,
}

/// Outcome of joining a key.
pub enum Flight<T> {
    /// This caller must do the work and publish it.
    Leader(FlightLeader<T>),
    /// Another caller is already working on the key.
    Follower(FlightFollower<T>),
}

/// Held by the caller doing the work for one key.
pub struct FlightLeader<T> {
    key: String,
    map: FlightMap<T>,
    tx: Option<watch::Sender<Option<T>>>,
}

/// Waits for a leader's result.
pub struct FlightFollower<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> SingleFlight<T> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Joins the flight for `key`, leading it if nobody else is.
    pub fn join(&self, key: &str) -> Flight<T> {
        let mut map = self.inner.lock();
        if let Some(rx) = map.get(key) {
            return Flight::Follower(FlightFollower { rx: rx.clone() });
        }
        let (tx, rx) = watch::channel(None);
        map.insert(key.to_string(), rx);
        Flight::Leader(FlightLeader {
            key: key.to_string(),
            map: self.inner.clone(),
            tx: Some(tx),
        })
    }

    /// Number of keys currently tracked.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().len()
    }
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SingleFlight<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> FlightLeader<T> {
    /// Hands `value` to every follower and ends the flight.
    pub fn complete(mut self, value: T) {
        if let Some(tx) = self.tx.take() {
            self.map.lock().remove(&self.key);
            tx.send_replace(Some(value));
        }
    }
}

impl<T> Drop for FlightLeader<T> {
    fn drop(&mut self) {
        // Abandoned without a result: followers see the slot close.
        if self.tx.take().is_some() {
            self.map.lock().remove(&self.key);
        }
    }
}

impl<T: Clone> FlightFollower<T> {
    /// The leader's result, or `None` if the leader gave up.
    pub async fn wait(mut self) -> Option<T> {
        loop {
            let current = self.rx.borrow_and_update().clone();
            if current.is_some() {
                return current;
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }
}

impl<T> std::fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.inner.lock().len())
            .finish()
    }
}

impl<T> std::fmt::Debug for FlightLeader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightLeader").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn leader(flight: Flight<u32>) -> FlightLeader<u32> {
        match flight {
            Flight::Leader(leader) => leader,
            Flight::Follower(_) => panic!("expected leader"),
        }
    }

    fn follower(flight: Flight<u32>) -> FlightFollower<u32> {
        match flight {
            Flight::Follower(follower) => follower,
            Flight::Leader(_) => panic!("expected follower"),
        }
    }

    #[tokio::test]
    async fn test_entry_removed_after_complete() {
        let flights = SingleFlight::<u32>::new();
        let lead = leader(flights.join("u-1"));
        assert_eq!(flights.in_flight(), 1);
        lead.complete(7);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_followers_receive_leader_result() {
        let flights = SingleFlight::<u32>::new();
        let lead = leader(flights.join("u-1"));
        let waiters: Vec<_> = (0..8).map(|_| follower(flights.join("u-1"))).collect();

        let handles: Vec<_> = waiters
            .into_iter()
            .map(|waiter| tokio::spawn(waiter.wait()))
            .collect();
        tokio::time::sleep(Duration::from_millis(5)).await;
        lead.complete(42);

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Some(42));
        }
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_late_follower_sees_published_value() {
        let flights = SingleFlight::<u32>::new();
        let lead = leader(flights.join("u-1"));
        let waiter = follower(flights.join("u-1"));
        lead.complete(3);
        assert_eq!(waiter.wait().await, Some(3));
    }

    #[tokio::test]
    async fn test_abandoned_leader_releases_followers() {
        let flights = SingleFlight::<u32>::new();
        let lead = leader(flights.join("u-1"));
        let waiter = follower(flights.join("u-1"));
        drop(lead);

        assert_eq!(waiter.wait().await, None);
        assert_eq!(flights.in_flight(), 0);
        assert!(matches!(flights.join("u-1"), Flight::Leader(_)));
    }

    #[tokio::test]
    async fn test_different_keys_lead_independently() {
        let flights = SingleFlight::<u32>::new();
        let _a = leader(flights.join("u-1"));
        assert!(matches!(flights.join("u-2"), Flight::Leader(_)));
    }
}
