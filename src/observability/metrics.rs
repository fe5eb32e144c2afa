//! Dispatch counters
//!
//! Counters only, monotonic, reset on process start.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Request counters shared by the dispatcher and the `/metrics` endpoint
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    requests_received: AtomicU64,
    requests_succeeded: AtomicU64,
    /// Rejected by the codec (malformed envelope, bad binary)
    envelopes_rejected: AtomicU64,
    routes_not_found: AtomicU64,
    auth_rejected: AtomicU64,
    /// Application errors returned by handlers
    application_errors: AtomicU64,
    internal_errors: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_requests_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_requests_succeeded(&self) {
        self.requests_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_envelopes_rejected(&self) {
        self.envelopes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_routes_not_found(&self) {
        self.routes_not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_auth_rejected(&self) {
        self.auth_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_application_errors(&self) {
        self.application_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_internal_errors(&self) {
        self.internal_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            requests_succeeded: self.requests_succeeded.load(Ordering::Relaxed),
            envelopes_rejected: self.envelopes_rejected.load(Ordering::Relaxed),
            routes_not_found: self.routes_not_found.load(Ordering::Relaxed),
            auth_rejected: self.auth_rejected.load(Ordering::Relaxed),
            application_errors: self.application_errors.load(Ordering::Relaxed),
            internal_errors: self.internal_errors.load(Ordering::Relaxed),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or_default()
    }
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_received: u64,
    pub requests_succeeded: u64,
    pub envelopes_rejected: u64,
    pub routes_not_found: u64,
    pub auth_rejected: u64,
    pub application_errors: u64,
    pub internal_errors: u64,
}
