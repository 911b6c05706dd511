//! Metrics registry for cursordb
//!
//! - Counters only, monotonic
//! - Thread-safe, relaxed atomics

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters of one datastore
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Documents inserted
    inserts: AtomicU64,
    /// Documents modified by update
    updates: AtomicU64,
    /// Documents removed
    removes: AtomicU64,
    /// Candidate requests served
    candidate_requests: AtomicU64,
    /// Candidate requests answered from an index
    index_lookups: AtomicU64,
    /// Candidate requests answered by scanning every document
    full_scans: AtomicU64,
    /// Documents handed out as candidates
    candidates_returned: AtomicU64,
    /// Writes rejected by unique indexes
    unique_violations: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_inserts(&self, n: u64) {
        self.inserts.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_updates(&self, n: u64) {
        self.updates.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_removes(&self, n: u64) {
        self.removes.fetch_add(n, Ordering::Relaxed);
    }

    /// Record one candidate request and how it was answered
    pub fn record_candidate_request(&self, used_index: bool, returned: u64) {
        self.candidate_requests.fetch_add(1, Ordering::Relaxed);
        if used_index {
            self.index_lookups.fetch_add(1, Ordering::Relaxed);
        } else {
            self.full_scans.fetch_add(1, Ordering::Relaxed);
        }
        self.candidates_returned.fetch_add(returned, Ordering::Relaxed);
    }

    pub fn increment_unique_violations(&self) {
        self.unique_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            candidate_requests: self.candidate_requests.load(Ordering::Relaxed),
            index_lookups: self.index_lookups.load(Ordering::Relaxed),
            full_scans: self.full_scans.load(Ordering::Relaxed),
            candidates_returned: self.candidates_returned.load(Ordering::Relaxed),
            unique_violations: self.unique_violations.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub inserts: u64,
    pub updates: u64,
    pub removes: u64,
    pub candidate_requests: u64,
    pub index_lookups: u64,
    pub full_scans: u64,
    pub candidates_returned: u64,
    pub unique_violations: u64,
}
