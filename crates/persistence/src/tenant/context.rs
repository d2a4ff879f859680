//! Tenant context for enrollment operations.
//!
//! This module defines [`TenantContext`], the immutable value describing
//! "this principal, acting within this institution, with this membership role
//! and status". A context is established once per request or session and is
//! passed to every tenant-scoped check.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::id::{InstitutionId, PrincipalId};
use super::membership::{Membership, MembershipRole, MembershipStatus};
use crate::error::{TenantError, ValidationError};

/// A validated tenant context.
///
/// Contexts are normally produced by the context manager after the
/// principal's membership has been verified. The fields are private and
/// there are no setters, so a context cannot be re-pointed at another
/// institution once created.
///
/// ```
/// use registrar_persistence::tenant::{InstitutionId, MembershipRole, PrincipalId, TenantContext};
///
/// let ctx = TenantContext::new(
///     PrincipalId::new("user-1"),
///     InstitutionId::new("state-u"),
///     MembershipRole::Student,
/// );
/// assert!(ctx.check_access(&InstitutionId::new("state-u")).is_ok());
/// assert!(ctx.check_access(&InstitutionId::new("other-u")).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct TenantContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    principal_id: PrincipalId,
    institution_id: InstitutionId,
    role: MembershipRole,
    status: MembershipStatus,
    established_at: DateTime<Utc>,
    correlation_id: Option<String>,
}

impl TenantContext {
    /// Creates an active context for the given principal, institution and role.
    pub fn new(
        principal_id: PrincipalId,
        institution_id: InstitutionId,
        role: MembershipRole,
    ) -> Self {
        Self::from_parts(
            principal_id,
            institution_id,
            role,
            MembershipStatus::Active,
            None,
        )
    }

    /// Creates a context from a verified membership record.
    pub fn from_membership(membership: &Membership) -> Self {
        Self::from_parts(
            membership.principal_id.clone(),
            membership.institution_id.clone(),
            membership.role,
            membership.status,
            None,
        )
    }

    fn from_parts(
        principal_id: PrincipalId,
        institution_id: InstitutionId,
        role: MembershipRole,
        status: MembershipStatus,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                principal_id,
                institution_id,
                role,
                status,
                established_at: Utc::now(),
                correlation_id,
            }),
        }
    }

    /// Returns a copy of this context carrying the given correlation ID.
    pub fn with_correlation_id(self, correlation_id: impl Into<String>) -> Self {
        Self::from_parts(
            self.inner.principal_id.clone(),
            self.inner.institution_id.clone(),
            self.inner.role,
            self.inner.status,
            Some(correlation_id.into()),
        )
    }

    /// Returns the acting principal.
    pub fn principal_id(&self) -> &PrincipalId {
        &self.inner.principal_id
    }

    /// Returns the institution this context is bound to.
    pub fn institution_id(&self) -> &InstitutionId {
        &self.inner.institution_id
    }

    /// Returns the membership role.
    pub fn role(&self) -> MembershipRole {
        self.inner.role
    }

    /// Returns the membership status captured when the context was established.
    pub fn status(&self) -> MembershipStatus {
        self.inner.status
    }

    /// Returns when the context was established.
    pub fn established_at(&self) -> DateTime<Utc> {
        self.inner.established_at
    }

    /// Returns the correlation ID, if set.
    pub fn correlation_id(&self) -> Option<&str> {
        self.inner.correlation_id.as_deref()
    }

    /// Returns `true` if the principal administers the institution.
    pub fn is_admin(&self) -> bool {
        self.inner.role == MembershipRole::Admin
    }

    /// Checks if this context can access records owned by the given institution.
    ///
    /// Only the context's own institution is accessible; there is no
    /// parent/child or shared tenant.
    pub fn check_access(&self, resource_institution: &InstitutionId) -> Result<(), TenantError> {
        if &self.inner.institution_id == resource_institution {
            return Ok(());
        }

        Err(TenantError::AccessDenied {
            institution_id: self.inner.institution_id.clone(),
            resource_type: "unknown".to_string(),
            resource_id: "unknown".to_string(),
        })
    }
}

/// Builder for creating tenant contexts from external input.
#[derive(Default)]
pub struct TenantContextBuilder {
    principal_id: Option<PrincipalId>,
    institution_id: Option<InstitutionId>,
    role: Option<MembershipRole>,
    status: Option<MembershipStatus>,
    correlation_id: Option<String>,
}

impl TenantContextBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the principal ID.
    pub fn principal_id(mut self, principal_id: impl Into<PrincipalId>) -> Self {
        self.principal_id = Some(principal_id.into());
        self
    }

    /// Sets the institution ID.
    pub fn institution_id(mut self, institution_id: impl Into<InstitutionId>) -> Self {
        self.institution_id = Some(institution_id.into());
        self
    }

    /// Sets the membership role.
    pub fn role(mut self, role: MembershipRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Sets the membership status.
    pub fn status(mut self, status: MembershipStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the correlation ID.
    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Builds the context, returning an error if required fields are missing.
    pub fn build(self) -> Result<TenantContext, ValidationError> {
        let principal_id = self
            .principal_id
            .filter(|p| !p.is_blank())
            .ok_or_else(|| ValidationError::MissingRequiredField {
                field: "principal_id".to_string(),
            })?;

        let institution_id = self
            .institution_id
            .filter(|i| !i.is_blank())
            .ok_or_else(|| ValidationError::MissingRequiredField {
                field: "institution_id".to_string(),
            })?;

        Ok(TenantContext::from_parts(
            principal_id,
            institution_id,
            self.role.unwrap_or(MembershipRole::Student),
            self.status.unwrap_or(MembershipStatus::Active),
            self.correlation_id,
        ))
    }
}
