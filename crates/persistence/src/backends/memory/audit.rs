//! In-memory audit channels.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{AccessAuditRecord, AuditSink, OverrideAuditRecord};
use crate::error::AuditError;

/// Keeps access and override records in two separate lists.
///
/// [`set_failing`](Self::set_failing) makes every write fail, which lets
/// callers exercise their log-and-continue handling.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    access: Mutex<Vec<AccessAuditRecord>>,
    overrides: Mutex<Vec<OverrideAuditRecord>>,
    failing: AtomicBool,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns a copy of the access channel.
    pub fn access_records(&self) -> Vec<AccessAuditRecord> {
        self.access.lock().clone()
    }

    /// Returns a copy of the override channel.
    pub fn override_records(&self) -> Vec<OverrideAuditRecord> {
        self.overrides.lock().clone()
    }

    fn check(&self) -> Result<(), AuditError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuditError::WriteFailed {
                sink: "memory".to_string(),
                message: "sink configured to fail".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record_access(&self, record: &AccessAuditRecord) -> Result<(), AuditError> {
        self.check()?;
        self.access.lock().push(record.clone());
        Ok(())
    }

    async fn record_override(&self, record: &OverrideAuditRecord) -> Result<(), AuditError> {
        self.check()?;
        self.overrides.lock().push(record.clone());
        Ok(())
    }
}
