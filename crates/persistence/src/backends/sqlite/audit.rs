//! Durable audit channels for the SQLite backend.

use async_trait::async_trait;
use rusqlite::params;
use tracing::debug;

use crate::core::{AccessAuditRecord, AuditSink, OverrideAuditRecord};
use crate::error::{AuditError, StorageResult};

use super::SqliteBackend;

fn write_failed(e: impl std::fmt::Display) -> AuditError {
    AuditError::WriteFailed {
        sink: "sqlite".to_string(),
        message: e.to_string(),
    }
}

impl SqliteBackend {
    /// Returns the number of rows in the access channel.
    pub fn access_audit_count(&self) -> StorageResult<u64> {
        self.count_rows("access_audit")
    }

    /// Returns the number of rows in the override channel.
    pub fn override_audit_count(&self) -> StorageResult<u64> {
        self.count_rows("override_audit")
    }

    fn count_rows(&self, table: &str) -> StorageResult<u64> {
        let conn = self.get_connection()?;
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(count as u64)
    }
}

#[async_trait]
impl AuditSink for SqliteBackend {
    async fn record_access(&self, record: &AccessAuditRecord) -> Result<(), AuditError> {
        let conn = self.get_connection().map_err(write_failed)?;
        conn.execute(
            "INSERT INTO access_audit (id, timestamp, principal_id, target_institution_id, action,
                                       resource_type, resource_id, allowed, reason, correlation_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id.to_string(),
                record.timestamp.to_rfc3339(),
                record.principal_id.as_str(),
                record.target_institution_id.as_str(),
                record.action.to_string(),
                record.resource_type,
                record.resource_id,
                record.allowed,
                record.reason,
                record.correlation_id
            ],
        )
        .map_err(write_failed)?;

        debug!(
            audit_id = %record.id,
            allowed = record.allowed,
            "access decision persisted"
        );
        Ok(())
    }

    async fn record_override(&self, record: &OverrideAuditRecord) -> Result<(), AuditError> {
        let conn = self.get_connection().map_err(write_failed)?;
        conn.execute(
            "INSERT INTO override_audit (id, timestamp, principal_id, institution_id, action,
                                         student_id, course_id, enrollment_id, was_over_capacity,
                                         enrolled_count, max_students, correlation_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.id.to_string(),
                record.timestamp.to_rfc3339(),
                record.principal_id.as_str(),
                record.institution_id.as_str(),
                record.action.to_string(),
                record.student_id,
                record.course_id,
                record.enrollment_id,
                record.was_over_capacity,
                record.enrolled_count,
                record.max_students,
                record.correlation_id
            ],
        )
        .map_err(write_failed)?;

        debug!(audit_id = %record.id, "override persisted");
        Ok(())
    }
}
