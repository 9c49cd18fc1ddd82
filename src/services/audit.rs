//! Best-effort audit trail.
//!
//! [`AuditRecorder::record`] never returns an error. A failed write is logged
//! and counted, and the request that triggered it carries on unchanged.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::db::Store;
use crate::domain::audit::AuditEntry;

/// Where audit entries are persisted.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditEntry, at: DateTime<Utc>) -> anyhow::Result<()>;
}

#[async_trait]
impl AuditSink for Store {
    async fn append(&self, entry: &AuditEntry, at: DateTime<Utc>) -> anyhow::Result<()> {
        self.append_audit_log(entry, at).await
    }
}

#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    enabled: bool,
}

impl AuditRecorder {
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>, clock: Arc<dyn Clock>, enabled: bool) -> Self {
        Self {
            sink,
            clock,
            enabled,
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn record(&self, entry: AuditEntry) {
        if !self.enabled {
            return;
        }

        let action = entry.action;
        match self.sink.append(&entry, self.clock.now()).await {
            Ok(()) => {
                debug!(action = %action, success = entry.success, "Audit entry recorded");
            }
            Err(e) => {
                metrics::counter!("audit_write_failures_total", "action" => action.as_str())
                    .increment(1);
                warn!(action = %action, error = %e, "Failed to record audit entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::domain::audit::AuditAction;
    use std::sync::Mutex;

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn append(&self, _entry: &AuditEntry, _at: DateTime<Utc>) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[derive(Default)]
    struct MemorySink(Mutex<Vec<AuditAction>>);

    #[async_trait]
    impl AuditSink for MemorySink {
        async fn append(&self, entry: &AuditEntry, _at: DateTime<Utc>) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(entry.action);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let recorder = AuditRecorder::new(Arc::new(FailingSink), Arc::new(SystemClock), true);
        // Must complete without panicking or propagating.
        recorder.record(AuditEntry::new(AuditAction::CaseCreated)).await;
    }

    #[tokio::test]
    async fn test_disabled_recorder_writes_nothing() {
        let sink = Arc::new(MemorySink::default());
        let recorder = AuditRecorder::new(sink.clone(), Arc::new(SystemClock), false);
        recorder.record(AuditEntry::new(AuditAction::LoginSuccess)).await;
        assert!(sink.0.lock().unwrap().is_empty());

        let recorder = AuditRecorder::new(sink.clone(), Arc::new(SystemClock), true);
        recorder.record(AuditEntry::new(AuditAction::LoginSuccess)).await;
        assert_eq!(*sink.0.lock().unwrap(), vec![AuditAction::LoginSuccess]);
    }
}
