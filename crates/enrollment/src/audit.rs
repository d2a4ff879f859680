//! Audit sink that emits records as tracing events.

use std::sync::Arc;

use async_trait::async_trait;
use registrar_persistence::core::{AccessAuditRecord, AuditSink, OverrideAuditRecord};
use registrar_persistence::error::AuditError;
use tracing::{info, warn};

/// Writes access decisions to the `registrar::audit` target and overrides to
/// `registrar::audit::override`. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record_access(&self, record: &AccessAuditRecord) -> Result<(), AuditError> {
        let resource_id = record.resource_id.as_deref().unwrap_or("-");
        let reason = record.reason.as_deref().unwrap_or("-");
        let correlation_id = record.correlation_id.as_deref().unwrap_or("-");

        if record.allowed {
            info!(
                target: "registrar::audit",
                audit_id = %record.id,
                principal = %record.principal_id,
                institution = %record.target_institution_id,
                action = %record.action,
                resource_type = %record.resource_type,
                resource_id,
                correlation_id,
                allowed = true,
                "access decision"
            );
        } else {
            warn!(
                target: "registrar::audit",
                audit_id = %record.id,
                principal = %record.principal_id,
                institution = %record.target_institution_id,
                action = %record.action,
                resource_type = %record.resource_type,
                resource_id,
                reason,
                correlation_id,
                allowed = false,
                "access decision"
            );
        }
        Ok(())
    }

    async fn record_override(&self, record: &OverrideAuditRecord) -> Result<(), AuditError> {
        warn!(
            target: "registrar::audit::override",
            audit_id = %record.id,
            principal = %record.principal_id,
            institution = %record.institution_id,
            action = %record.action,
            student_id = %record.student_id,
            course_id = %record.course_id,
            enrollment_id = %record.enrollment_id,
            was_over_capacity = record.was_over_capacity,
            enrolled_count = record.enrolled_count,
            max_students = record.max_students,
            correlation_id = record.correlation_id.as_deref().unwrap_or("-"),
            "administrative override"
        );
        Ok(())
    }
}

/// Fans every record out to several sinks. A failure in one sink does not stop
/// delivery to the others; the first error is returned.
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    /// Creates a sink delivering to each of `sinks` in order.
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl AuditSink for FanoutAuditSink {
    async fn record_access(&self, record: &AccessAuditRecord) -> Result<(), AuditError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record_access(record).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn record_override(&self, record: &OverrideAuditRecord) -> Result<(), AuditError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record_override(record).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registrar_persistence::backends::memory::MemoryAuditSink;
    use registrar_persistence::core::AccessAction;
    use registrar_persistence::{InstitutionId, PrincipalId};

    fn record() -> AccessAuditRecord {
        AccessAuditRecord::new(
            PrincipalId::new("alice"),
            InstitutionId::new("inst-b"),
            AccessAction::Enroll,
            "Course",
            None,
            false,
        )
        .with_reason("no membership in target institution")
    }

    #[tokio::test]
    async fn test_tracing_sink_never_fails() {
        assert!(TracingAuditSink.record_access(&record()).await.is_ok());
    }

    #[tokio::test]
    async fn test_fanout_delivers_past_failures() {
        let failing = Arc::new(MemoryAuditSink::new());
        failing.set_failing(true);
        let healthy = Arc::new(MemoryAuditSink::new());
        let fanout = FanoutAuditSink::new(vec![
            failing.clone() as Arc<dyn AuditSink>,
            healthy.clone() as Arc<dyn AuditSink>,
        ]);

        let result = fanout.record_access(&record()).await;
        assert!(matches!(result, Err(AuditError::WriteFailed { .. })));
        assert_eq!(healthy.access_records().len(), 1);
        assert!(failing.access_records().is_empty());
    }
}
