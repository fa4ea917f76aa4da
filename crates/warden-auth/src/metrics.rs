// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Admission counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::ErrorKind;

/// Counters for the admission gate.
///
/// Rejections are counted by their internal [`ErrorKind`], which callers
/// of the gate never see.
#[derive(Debug, Default)]
pub struct GateMetrics {
    /// Requests evaluated.
    pub requests: AtomicU64,
    /// Requests admitted.
    pub admitted: AtomicU64,
    /// Requests rejected for any reason.
    pub rejected: AtomicU64,
    /// Store failures admitted under a fail-open policy.
    pub fail_open_admissions: AtomicU64,
    by_kind: [AtomicU64; ErrorKind::COUNT],
}

impl GateMetrics {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejection(&self, kind: ErrorKind) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        self.by_kind[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fail_open(&self) {
        self.fail_open_admissions.fetch_add(1, Ordering::Relaxed);
    }

    /// Rejections counted for `kind`.
    pub fn rejections(&self, kind: ErrorKind) -> u64 {
        self.by_kind[kind.index()].load(Ordering::Relaxed)
    }

    /// Creates a snapshot of the current metrics.
    pub fn snapshot(&self) -> GateMetricsSnapshot {
        GateMetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            fail_open_admissions: self.fail_open_admissions.load(Ordering::Relaxed),
            rejections: ErrorKind::ALL
                .iter()
                .map(|kind| (kind.as_str(), self.rejections(*kind)))
                .filter(|(_, count)| *count > 0)
                .collect(),
        }
    }
}

/// Snapshot of gate metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GateMetricsSnapshot {
    /// Requests evaluated.
    pub requests: u64,
    /// Requests admitted.
    pub admitted: u64,
    /// Requests rejected.
    pub rejected: u64,
    /// Fail-open admissions.
    pub fail_open_admissions: u64,
    /// Non-zero rejection counts by kind label.
    pub rejections: BTreeMap<&'static str, u64>,
}
