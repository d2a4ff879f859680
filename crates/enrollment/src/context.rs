//! Per-principal tenant context store.
//!
//! Each principal holds at most one active [`TenantContext`]. A context is only
//! stored after the [`AccessValidator`] has confirmed an active membership.
//! A switch removes the previous context before verifying the new
//! institution, so no reader can see the old institution once a switch has
//! started. The lock is never held across directory or audit I/O.

use std::collections::HashMap;
use std::sync::Arc;

use registrar_persistence::core::{AccessAction, DirectoryStorage};
use registrar_persistence::{InstitutionId, PrincipalId, TenantContext};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{EnrollmentError, EnrollmentResult};
use crate::validator::{AccessRequest, AccessValidator, DenyReason};

/// Stores the active context of every principal.
pub struct TenantContextManager<D> {
    validator: AccessValidator<D>,
    contexts: Arc<RwLock<HashMap<PrincipalId, TenantContext>>>,
}

impl<D> Clone for TenantContextManager<D> {
    fn clone(&self) -> Self {
        Self {
            validator: self.validator.clone(),
            contexts: Arc::clone(&self.contexts),
        }
    }
}

impl<D: DirectoryStorage> TenantContextManager<D> {
    /// Creates an empty manager.
    pub fn new(validator: AccessValidator<D>) -> Self {
        Self {
            validator,
            contexts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Verifies the principal's membership in `institution_id` and stores the
    /// resulting context as current, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// * `NotFound` - the institution does not exist
    /// * `AccessDenied` - no active membership, or the institution is unavailable
    pub async fn establish_context(
        &self,
        principal_id: &PrincipalId,
        institution_id: &InstitutionId,
    ) -> EnrollmentResult<TenantContext> {
        let context = self.verify(principal_id, institution_id).await?;
        self.contexts
            .write()
            .await
            .insert(principal_id.clone(), context.clone());

        info!(
            principal = %principal_id,
            institution = %institution_id,
            role = %context.role(),
            "tenant context established"
        );
        Ok(context)
    }

    /// Discards the principal's context. Returns `true` if one was stored.
    pub async fn clear_context(&self, principal_id: &PrincipalId) -> bool {
        let removed = self.contexts.write().await.remove(principal_id).is_some();
        if removed {
            debug!(principal = %principal_id, "tenant context cleared");
        }
        removed
    }

    /// Returns the principal's context if it is bound to exactly
    /// `institution_id`.
    pub async fn get_current_context(
        &self,
        principal_id: &PrincipalId,
        institution_id: &InstitutionId,
    ) -> Option<TenantContext> {
        self.contexts
            .read()
            .await
            .get(principal_id)
            .filter(|ctx| ctx.institution_id() == institution_id)
            .cloned()
    }

    /// Like [`get_current_context`](Self::get_current_context) but fails with
    /// `ContextMissing` when no matching context is active.
    pub async fn require_context(
        &self,
        principal_id: &PrincipalId,
        institution_id: &InstitutionId,
    ) -> EnrollmentResult<TenantContext> {
        self.get_current_context(principal_id, institution_id)
            .await
            .ok_or_else(|| EnrollmentError::ContextMissing {
                institution_id: institution_id.to_string(),
            })
    }

    /// Clears the principal's context and establishes a new one for
    /// `institution_id`.
    ///
    /// Between the two steps readers see no context for the principal. On
    /// failure the principal is left with no context.
    pub async fn switch_context(
        &self,
        principal_id: &PrincipalId,
        institution_id: &InstitutionId,
    ) -> EnrollmentResult<TenantContext> {
        let previous = self.contexts.write().await.remove(principal_id);

        let context = self.verify(principal_id, institution_id).await?;
        self.contexts
            .write()
            .await
            .insert(principal_id.clone(), context.clone());

        info!(
            principal = %principal_id,
            from = previous.as_ref().map(|c| c.institution_id().as_str()).unwrap_or("none"),
            to = %institution_id,
            "tenant context switched"
        );
        Ok(context)
    }

    /// Number of principals with an active context.
    pub async fn active_contexts(&self) -> usize {
        self.contexts.read().await.len()
    }

    async fn verify(
        &self,
        principal_id: &PrincipalId,
        institution_id: &InstitutionId,
    ) -> EnrollmentResult<TenantContext> {
        let request = AccessRequest::new(
            principal_id.clone(),
            institution_id.clone(),
            AccessAction::EstablishContext,
            "Institution",
        )
        .with_resource_id(institution_id.as_str());

        let decision = self
            .validator
            .validate_cross_institutional_access(&request)
            .await
            .map_err(|e| EnrollmentError::unexpected("establish_context", &e))?;

        match (decision.deny, decision.membership) {
            (None, Some(membership)) => Ok(TenantContext::from_membership(&membership)),
            (Some(DenyReason::InstitutionNotFound), _) => {
                Err(EnrollmentError::not_found("Institution not found"))
            }
            _ => Err(EnrollmentError::AccessDenied),
        }
    }
}
