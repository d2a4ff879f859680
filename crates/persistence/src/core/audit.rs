//! Audit records and the sink that receives them.
//!
//! Two channels exist. Access decisions ([`AccessAuditRecord`]) are written for
//! every tenant check, allowed or not. Administrative overrides
//! ([`OverrideAuditRecord`]) are higher sensitivity and go to a separate
//! channel. Sinks are append-only.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuditError;
use crate::tenant::{InstitutionId, PrincipalId};

/// The action an access decision was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessAction {
    /// Reading a record.
    Read,
    /// Enrolling in a course.
    Enroll,
    /// Dropping a course.
    Drop,
    /// Administrative enrollment past capacity.
    AdminEnroll,
    /// Administrative removal from a roster.
    AdminRemove,
    /// Establishing a tenant context.
    EstablishContext,
}

impl fmt::Display for AccessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessAction::Read => write!(f, "read"),
            AccessAction::Enroll => write!(f, "enroll"),
            AccessAction::Drop => write!(f, "drop"),
            AccessAction::AdminEnroll => write!(f, "admin_enroll"),
            AccessAction::AdminRemove => write!(f, "admin_remove"),
            AccessAction::EstablishContext => write!(f, "establish_context"),
        }
    }
}

impl std::str::FromStr for AccessAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(AccessAction::Read),
            "enroll" => Ok(AccessAction::Enroll),
            "drop" => Ok(AccessAction::Drop),
            "admin_enroll" => Ok(AccessAction::AdminEnroll),
            "admin_remove" => Ok(AccessAction::AdminRemove),
            "establish_context" => Ok(AccessAction::EstablishContext),
            other => Err(format!("unknown access action: {}", other)),
        }
    }
}

/// One access decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessAuditRecord {
    /// Record ID.
    pub id: Uuid,
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// The acting principal.
    pub principal_id: PrincipalId,
    /// The institution the principal tried to act in.
    pub target_institution_id: InstitutionId,
    /// What was attempted.
    pub action: AccessAction,
    /// Kind of record involved.
    pub resource_type: String,
    /// Record involved, when known.
    pub resource_id: Option<String>,
    /// Outcome.
    pub allowed: bool,
    /// Why access was denied, or a note on an allowed decision.
    pub reason: Option<String>,
    /// Request correlation ID, when one was supplied.
    pub correlation_id: Option<String>,
}

impl AccessAuditRecord {
    /// Creates a record stamped with a fresh ID and the current time.
    pub fn new(
        principal_id: PrincipalId,
        target_institution_id: InstitutionId,
        action: AccessAction,
        resource_type: impl Into<String>,
        resource_id: Option<String>,
        allowed: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            principal_id,
            target_institution_id,
            action,
            resource_type: resource_type.into(),
            resource_id,
            allowed,
            reason: None,
            correlation_id: None,
        }
    }

    /// Sets the reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets the correlation ID.
    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

/// One administrative roster override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideAuditRecord {
    /// Record ID.
    pub id: Uuid,
    /// When the override committed.
    pub timestamp: DateTime<Utc>,
    /// The administrator.
    pub principal_id: PrincipalId,
    /// Institution the override happened in.
    pub institution_id: InstitutionId,
    /// `AdminEnroll` or `AdminRemove`.
    pub action: AccessAction,
    /// Affected student.
    pub student_id: String,
    /// Affected course.
    pub course_id: String,
    /// Affected enrollment row.
    pub enrollment_id: String,
    /// Whether the roster was over the normal limit.
    pub was_over_capacity: bool,
    /// Roster size before the override.
    pub enrolled_count: u32,
    /// Course seat limit.
    pub max_students: u32,
    /// Request correlation ID, when one was supplied.
    pub correlation_id: Option<String>,
}

/// Append-only recipient of audit records.
///
/// Callers treat sink failures as log-and-continue: a failed write is never a
/// reason to fail the business operation that produced the record.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Appends an access decision.
    async fn record_access(&self, record: &AccessAuditRecord) -> Result<(), AuditError>;

    /// Appends an administrative override.
    async fn record_override(&self, record: &OverrideAuditRecord) -> Result<(), AuditError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_action_round_trips_through_str() {
        for action in [
            AccessAction::Read,
            AccessAction::Enroll,
            AccessAction::Drop,
            AccessAction::AdminEnroll,
            AccessAction::AdminRemove,
            AccessAction::EstablishContext,
        ] {
            assert_eq!(action.to_string().parse::<AccessAction>(), Ok(action));
        }
    }

    #[test]
    fn test_access_record_builder() {
        let record = AccessAuditRecord::new(
            PrincipalId::new("u-1"),
            InstitutionId::new("inst-b"),
            AccessAction::Enroll,
            "Course",
            Some("c-9".to_string()),
            false,
        )
        .with_reason("no active membership")
        .with_correlation_id(Some("req-42".to_string()));

        assert!(!record.allowed);
        assert_eq!(record.reason.as_deref(), Some("no active membership"));
        assert_eq!(record.correlation_id.as_deref(), Some("req-42"));
    }
}
