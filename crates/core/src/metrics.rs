//! Invocation counters and latency recording.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::envelope::Envelope;

/// Record one invocation's latency, labelled by outcome.
pub fn record_invocation_latency(duration_ms: f64) {
    metrics::histogram!("tool_invocation_latency", duration_ms);
}

pub fn increment_invocation_count(status: &'static str) {
    metrics::counter!("tool_invocation_total", 1, "status" => status);
}

/// RAII timer around a single dispatch.
pub struct MetricTimer {
    start: Instant,
}

impl MetricTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Drop for MetricTimer {
    fn drop(&mut self) {
        record_invocation_latency(self.start.elapsed().as_secs_f64() * 1000.0);
    }
}

#[derive(Default)]
pub struct InvocationMetrics {
    invocations: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    confirmations_requested: AtomicU64,
    remote_calls: AtomicU64,
}

impl InvocationMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Count the envelope and forward it to the global recorder.
    pub fn observe(&self, envelope: &Envelope) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        let counter = match envelope {
            Envelope::Success { .. } => &self.successes,
            Envelope::Error { .. } => &self.failures,
            Envelope::ConfirmationRequired { .. } => &self.confirmations_requested,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        increment_invocation_count(envelope.status());
    }

    pub fn inc_remote_calls(&self) {
        self.remote_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            invocations: self.invocations.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            confirmations_requested: self.confirmations_requested.load(Ordering::Relaxed),
            remote_calls: self.remote_calls.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub invocations: u64,
    pub successes: u64,
    pub failures: u64,
    pub confirmations_requested: u64,
    pub remote_calls: u64,
}

impl MetricsSnapshot {
    pub fn success_rate(&self) -> f64 {
        if self.invocations == 0 {
            return 1.0;
        }
        self.successes as f64 / self.invocations as f64
    }
}
