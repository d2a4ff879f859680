//! Access decisions for principals acting in an institution.
//!
//! The [`AccessValidator`] is the primary tenant gate. It never mutates
//! business data; its only side effect is writing audit records.
//!
//! Two checks are provided:
//!
//! - [`AccessValidator::validate_cross_institutional_access`] decides whether a
//!   principal may act in a target institution at all. Every call produces an
//!   [`AccessAuditRecord`], allowed or not.
//! - [`AccessValidator::validate_resource_access`] compares a loaded record's
//!   owning institution with the caller's context. It catches scoping mistakes
//!   in queries and is not the primary gate.

use std::fmt;
use std::sync::Arc;

use registrar_persistence::core::{
    AccessAction, AccessAuditRecord, AuditSink, DirectoryStorage, OverrideAuditRecord,
};
use registrar_persistence::tenant::{Membership, MembershipStatus};
use registrar_persistence::types::{InstitutionStatus, TenantScoped};
use registrar_persistence::{InstitutionId, PrincipalId, StorageResult, TenantContext};
use tracing::{debug, error, warn};

/// Parameters of a cross-institution access check.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    /// Acting principal.
    pub principal_id: PrincipalId,
    /// Institution the principal wants to act in.
    pub institution_id: InstitutionId,
    /// What the principal wants to do.
    pub action: AccessAction,
    /// Kind of record involved.
    pub resource_type: String,
    /// Record involved, when known.
    pub resource_id: Option<String>,
    /// Request correlation ID.
    pub correlation_id: Option<String>,
}

impl AccessRequest {
    /// Creates a request with no resource ID or correlation ID.
    pub fn new(
        principal_id: impl Into<PrincipalId>,
        institution_id: impl Into<InstitutionId>,
        action: AccessAction,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            principal_id: principal_id.into(),
            institution_id: institution_id.into(),
            action,
            resource_type: resource_type.into(),
            resource_id: None,
            correlation_id: None,
        }
    }

    /// Sets the resource ID.
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Sets the correlation ID.
    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

/// Why a cross-institution check denied access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// The target institution does not exist.
    InstitutionNotFound,
    /// The target institution is inactive or suspended.
    InstitutionUnavailable(InstitutionStatus),
    /// The principal has no membership in the target institution.
    NoMembership,
    /// The principal's membership is not active.
    MembershipInactive(MembershipStatus),
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::InstitutionNotFound => write!(f, "institution not found"),
            DenyReason::InstitutionUnavailable(status) => write!(f, "institution is {}", status),
            DenyReason::NoMembership => write!(f, "no membership in target institution"),
            DenyReason::MembershipInactive(status) => write!(f, "membership is {}", status),
        }
    }
}

/// Result of a cross-institution check.
#[derive(Debug, Clone)]
pub struct AccessDecision {
    /// Whether the principal may act.
    pub allowed: bool,
    /// Structured reason for a denial.
    pub deny: Option<DenyReason>,
    /// The verified membership, present when allowed.
    pub membership: Option<Membership>,
    /// The audit record that was written.
    pub audit_record: AccessAuditRecord,
}

impl AccessDecision {
    /// Human-readable reason, present when denied.
    pub fn reason(&self) -> Option<&str> {
        self.audit_record.reason.as_deref()
    }
}

/// Result of a resource ownership check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDecision {
    /// Whether the record belongs to the caller's institution.
    pub allowed: bool,
    /// Why the check failed.
    pub reason: Option<String>,
}

/// Tenant gate and audit producer.
pub struct AccessValidator<D> {
    directory: Arc<D>,
    audit: Arc<dyn AuditSink>,
}

impl<D> Clone for AccessValidator<D> {
    fn clone(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
            audit: Arc::clone(&self.audit),
        }
    }
}

impl<D: DirectoryStorage> AccessValidator<D> {
    /// Creates a validator reading memberships from `directory` and writing
    /// decisions to `audit`.
    pub fn new(directory: Arc<D>, audit: Arc<dyn AuditSink>) -> Self {
        Self { directory, audit }
    }

    /// Returns the directory this validator reads from.
    pub fn directory(&self) -> &Arc<D> {
        &self.directory
    }

    /// Decides whether the principal may act in the target institution.
    ///
    /// Access requires an existing, active institution and an active
    /// membership. The decision is audited before it is returned; a failing
    /// audit sink is logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Only directory read failures are returned as errors.
    pub async fn validate_cross_institutional_access(
        &self,
        request: &AccessRequest,
    ) -> StorageResult<AccessDecision> {
        let (deny, membership) = self.decide(request).await?;
        let allowed = deny.is_none();

        let mut record = AccessAuditRecord::new(
            request.principal_id.clone(),
            request.institution_id.clone(),
            request.action,
            request.resource_type.clone(),
            request.resource_id.clone(),
            allowed,
        )
        .with_correlation_id(request.correlation_id.clone());
        if let Some(reason) = &deny {
            record = record.with_reason(reason.to_string());
        }

        if allowed {
            debug!(
                principal = %request.principal_id,
                institution = %request.institution_id,
                action = %request.action,
                "access allowed"
            );
        } else {
            warn!(
                principal = %request.principal_id,
                institution = %request.institution_id,
                action = %request.action,
                reason = record.reason.as_deref().unwrap_or_default(),
                "access denied"
            );
        }

        self.record_access(&record).await;

        Ok(AccessDecision {
            allowed,
            deny,
            membership: if allowed { membership } else { None },
            audit_record: record,
        })
    }

    async fn decide(
        &self,
        request: &AccessRequest,
    ) -> StorageResult<(Option<DenyReason>, Option<Membership>)> {
        let institution = match self.directory.institution(&request.institution_id).await? {
            Some(institution) => institution,
            None => return Ok((Some(DenyReason::InstitutionNotFound), None)),
        };
        if !institution.is_active() {
            return Ok((
                Some(DenyReason::InstitutionUnavailable(institution.status)),
                None,
            ));
        }

        let membership = self
            .directory
            .membership(&request.principal_id, &request.institution_id)
            .await?;
        match membership {
            None => Ok((Some(DenyReason::NoMembership), None)),
            Some(m) if !m.is_active() => {
                Ok((Some(DenyReason::MembershipInactive(m.status)), Some(m)))
            }
            Some(m) => Ok((None, Some(m))),
        }
    }

    /// Checks that `resource` is owned by the context's institution.
    pub fn validate_resource_access<R: TenantScoped>(
        &self,
        context: &TenantContext,
        resource: &R,
        action: AccessAction,
    ) -> ResourceDecision {
        if resource.institution_id() == context.institution_id() {
            return ResourceDecision {
                allowed: true,
                reason: None,
            };
        }

        error!(
            principal = %context.principal_id(),
            context_institution = %context.institution_id(),
            resource_institution = %resource.institution_id(),
            resource_type = %resource.resource_kind(),
            resource_id = resource.resource_id(),
            action = %action,
            "loaded record belongs to another institution"
        );
        ResourceDecision {
            allowed: false,
            reason: Some(format!(
                "{} {} is not owned by institution {}",
                resource.resource_kind(),
                resource.resource_id(),
                context.institution_id()
            )),
        }
    }

    /// Writes a denied record for a course that is absent in the caller's
    /// institution. When the course exists elsewhere the record names its
    /// owner; the caller still only sees a generic not-found.
    pub async fn report_missing_course(
        &self,
        context: &TenantContext,
        course_id: &str,
        action: AccessAction,
    ) -> StorageResult<()> {
        let owner = self.directory.course_owner(course_id).await?;
        let reason = match owner {
            Some(owner) if &owner != context.institution_id() => {
                format!("course owned by institution {}", owner)
            }
            _ => "course not found in institution".to_string(),
        };

        let record = AccessAuditRecord::new(
            context.principal_id().clone(),
            context.institution_id().clone(),
            action,
            "Course",
            Some(course_id.to_string()),
            false,
        )
        .with_reason(reason)
        .with_correlation_id(context.correlation_id().map(str::to_string));

        self.record_access(&record).await;
        Ok(())
    }

    /// Appends an access record, logging and swallowing sink failures.
    pub async fn record_access(&self, record: &AccessAuditRecord) {
        if let Err(e) = self.audit.record_access(record).await {
            error!(
                audit_id = %record.id,
                principal = %record.principal_id,
                institution = %record.target_institution_id,
                error = %e,
                "failed to write access audit record"
            );
        }
    }

    /// Appends an override record, logging and swallowing sink failures.
    pub async fn record_override(&self, record: &OverrideAuditRecord) {
        if let Err(e) = self.audit.record_override(record).await {
            error!(
                audit_id = %record.id,
                principal = %record.principal_id,
                institution = %record.institution_id,
                error = %e,
                "failed to write override audit record"
            );
        }
    }
}
