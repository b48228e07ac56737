//! Best-effort usage telemetry.
//!
//! The dispatcher builds one [`TelemetryEvent`] per invocation and hands it to
//! the configured [`TelemetrySink`] on a spawned task. A failing sink is logged
//! and otherwise ignored; it never delays or fails the invocation. Call
//! [`TelemetryHook::flush`] before shutdown so in-flight events are written.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::invocation::InvocationRequest;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Telemetry sink error: {0}")]
    Sink(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub invocation_id: Uuid,
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub status: String,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn new(request: &InvocationRequest, envelope: &Envelope, elapsed: Duration) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            tool: request.tool.clone(),
            action: request.action.clone(),
            status: envelope.status().to_string(),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record(&self, event: TelemetryEvent) -> Result<(), TelemetryError>;
}

#[derive(Clone, Default)]
pub struct TelemetryHook {
    sink: Option<Arc<dyn TelemetrySink>>,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl TelemetryHook {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            sink: Some(sink),
            pending: Arc::default(),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Fire and forget; [`flush`](Self::flush) waits for the stragglers.
    pub fn emit(&self, event: TelemetryEvent) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let handle = tokio::spawn(async move {
            let tool = event.tool.clone();
            if let Err(e) = sink.record(event).await {
                warn!("Telemetry for {} dropped: {}", tool, e);
            }
        });

        let mut pending = self.pending.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Waits for every event emitted so far to reach the sink.
    pub async fn flush(&self) {
        let handles = std::mem::take(&mut *self.pending.lock());
        if handles.is_empty() {
            return;
        }
        debug!("Flushing {} telemetry events", handles.len());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Telemetry task failed: {}", e);
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().iter().filter(|h| !h.is_finished()).count()
    }
}
