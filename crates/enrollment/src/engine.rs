//! Enroll and drop operations.
//!
//! Every operation follows the same shape:
//!
//! 1. Validate input.
//! 2. Gate the principal with the [`AccessValidator`] (denials are audited).
//! 3. Run the transactional body under [`with_retry`]. Each attempt opens a
//!    fresh transaction and re-reads Student and Course; nothing read by an
//!    earlier attempt is reused.
//! 4. Translate the outcome into an [`EnrollmentError`] kind.
//!
//! Only optimistic-lock conflicts are retried. A duplicate-key failure at
//! commit means another request enrolled the same student first and becomes
//! the "already enrolled" conflict without a retry.
//!
//! Dropping the returned future aborts the in-flight transaction: staged
//! writes are discarded and nothing partial becomes visible.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use registrar_persistence::core::{
    AccessAction, AccessAuditRecord, AuditSink, DirectoryStorage, OverrideAuditRecord,
    Transaction, TransactionProvider,
};
use registrar_persistence::types::{Course, Enrollment, Student, TenantScoped};
use registrar_persistence::{InstitutionId, PrincipalId, StorageError, TenantContext};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{ConflictKind, EnrollmentError, EnrollmentResult};
use crate::retry::{RetryError, RetryPolicy, Retryable, Sleeper, TokioSleeper, with_retry};
use crate::validator::{AccessRequest, AccessValidator};

const STUDENT_NOT_FOUND: &str = "Student profile not found in your current institution";
const COURSE_NOT_FOUND: &str = "Course not available in your current institution";
const ENROLLMENT_NOT_FOUND: &str = "No active enrollment found for this course";

/// Storage the engine needs: membership lookups plus transactions.
pub trait EnrollmentStore: DirectoryStorage + TransactionProvider {}

impl<T: DirectoryStorage + TransactionProvider> EnrollmentStore for T {}

/// A student enrolling themselves.
#[derive(Debug, Clone)]
pub struct EnrollRequest {
    pub principal_id: PrincipalId,
    pub institution_id: InstitutionId,
    pub course_id: String,
    pub semester: String,
    pub academic_year: String,
    pub correlation_id: Option<String>,
}

impl EnrollRequest {
    pub fn new(
        principal_id: impl Into<PrincipalId>,
        institution_id: impl Into<InstitutionId>,
        course_id: impl Into<String>,
        semester: impl Into<String>,
        academic_year: impl Into<String>,
    ) -> Self {
        Self {
            principal_id: principal_id.into(),
            institution_id: institution_id.into(),
            course_id: course_id.into(),
            semester: semester.into(),
            academic_year: academic_year.into(),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// A student dropping one of their courses.
///
/// Without a semester the most recently created active row for the course is
/// dropped.
#[derive(Debug, Clone)]
pub struct DropRequest {
    pub principal_id: PrincipalId,
    pub institution_id: InstitutionId,
    pub course_id: String,
    pub semester: Option<String>,
    pub correlation_id: Option<String>,
}

impl DropRequest {
    pub fn new(
        principal_id: impl Into<PrincipalId>,
        institution_id: impl Into<InstitutionId>,
        course_id: impl Into<String>,
    ) -> Self {
        Self {
            principal_id: principal_id.into(),
            institution_id: institution_id.into(),
            course_id: course_id.into(),
            semester: None,
            correlation_id: None,
        }
    }

    pub fn for_semester(mut self, semester: impl Into<String>) -> Self {
        self.semester = Some(semester.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// An administrator enrolling a student past the seat limit.
#[derive(Debug, Clone)]
pub struct AdminEnrollRequest {
    pub admin_id: PrincipalId,
    pub institution_id: InstitutionId,
    pub student_id: String,
    pub course_id: String,
    pub semester: String,
    pub academic_year: String,
    pub correlation_id: Option<String>,
}

impl AdminEnrollRequest {
    pub fn new(
        admin_id: impl Into<PrincipalId>,
        institution_id: impl Into<InstitutionId>,
        student_id: impl Into<String>,
        course_id: impl Into<String>,
        semester: impl Into<String>,
        academic_year: impl Into<String>,
    ) -> Self {
        Self {
            admin_id: admin_id.into(),
            institution_id: institution_id.into(),
            student_id: student_id.into(),
            course_id: course_id.into(),
            semester: semester.into(),
            academic_year: academic_year.into(),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// An administrator removing a student from a roster.
#[derive(Debug, Clone)]
pub struct AdminRemoveRequest {
    pub admin_id: PrincipalId,
    pub institution_id: InstitutionId,
    pub student_id: String,
    pub course_id: String,
    pub semester: Option<String>,
    pub correlation_id: Option<String>,
}

impl AdminRemoveRequest {
    pub fn new(
        admin_id: impl Into<PrincipalId>,
        institution_id: impl Into<InstitutionId>,
        student_id: impl Into<String>,
        course_id: impl Into<String>,
    ) -> Self {
        Self {
            admin_id: admin_id.into(),
            institution_id: institution_id.into(),
            student_id: student_id.into(),
            course_id: course_id.into(),
            semester: None,
            correlation_id: None,
        }
    }

    pub fn for_semester(mut self, semester: impl Into<String>) -> Self {
        self.semester = Some(semester.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Result of an administrative override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideOutcome {
    /// The created or dropped enrollment row.
    pub enrollment: Enrollment,
    /// Whether the roster was over the normal limit.
    pub was_over_capacity: bool,
}

/// Roster size observed inside the transaction, before the write.
#[derive(Debug, Clone, Copy)]
struct RosterSnapshot {
    enrolled_count: u32,
    max_students: u32,
}

impl RosterSnapshot {
    fn of(course: &Course) -> Self {
        Self {
            enrolled_count: u32::try_from(course.enrolled_count()).unwrap_or(u32::MAX),
            max_students: course.max_students(),
        }
    }
}

/// How the acting student is found: the caller's own profile, or a profile
/// named by an administrator.
#[derive(Debug, Clone, Copy)]
enum StudentLookup<'a> {
    Principal(&'a PrincipalId),
    Id(&'a str),
}

/// Why one attempt failed.
#[derive(Debug)]
enum Failure {
    /// A business or tenant rule rejected the request.
    Rejected(EnrollmentError),
    /// The store failed.
    Storage(StorageError),
}

impl From<StorageError> for Failure {
    fn from(e: StorageError) -> Self {
        Failure::Storage(e)
    }
}

impl From<EnrollmentError> for Failure {
    fn from(e: EnrollmentError) -> Self {
        Failure::Rejected(e)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Rejected(e) => write!(f, "rejected: {}", e),
            Failure::Storage(e) => write!(f, "storage: {}", e),
        }
    }
}

impl Retryable for Failure {
    fn is_retryable(&self) -> bool {
        matches!(self, Failure::Storage(e) if e.is_retryable())
    }
}

/// Commits on success, rolls back on failure.
async fn finish<T, X>(tx: X, staged: Result<T, Failure>) -> Result<T, Failure>
where
    X: Transaction + 'static,
{
    match staged {
        Ok(value) => {
            Box::new(tx).commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = Box::new(tx).rollback().await {
                debug!(error = %rollback_err, "rollback after rejected attempt failed");
            }
            Err(e)
        }
    }
}

fn already_enrolled(active: &Enrollment, semester: &str) -> EnrollmentError {
    if active.semester() == semester {
        return EnrollmentError::conflict(ConflictKind::AlreadyEnrolled);
    }
    EnrollmentError::BusinessConflict {
        kind: ConflictKind::AlreadyEnrolled,
        message: format!(
            "Already enrolled in this course for semester {}",
            active.semester()
        ),
    }
}

fn require(field: &str, value: &str) -> EnrollmentResult<()> {
    if value.trim().is_empty() {
        return Err(EnrollmentError::validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Orchestrates enrollment transactions for every institution.
pub struct EnrollmentEngine<S> {
    store: Arc<S>,
    validator: AccessValidator<S>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl<S> Clone for EnrollmentEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            validator: self.validator.clone(),
            policy: self.policy.clone(),
            sleeper: Arc::clone(&self.sleeper),
        }
    }
}

impl<S: EnrollmentStore> EnrollmentEngine<S> {
    /// Creates an engine that waits with the tokio timer.
    pub fn new(store: Arc<S>, audit: Arc<dyn AuditSink>, config: EngineConfig) -> Self {
        Self {
            validator: AccessValidator::new(Arc::clone(&store), audit),
            store,
            policy: RetryPolicy::new(config.retry),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replaces the sleeper used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Returns the validator, for building a context manager over the same
    /// directory and audit sink.
    pub fn validator(&self) -> &AccessValidator<S> {
        &self.validator
    }

    /// Returns the retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Enrolls the calling principal's student profile in a course.
    ///
    /// # Errors
    ///
    /// * `Validation` - blank input, or the credit limit would be exceeded
    /// * `AccessDenied` - no active membership in the institution
    /// * `NotFound` - no student profile, or the course is absent or inactive
    ///   in the institution (also when it exists in another institution)
    /// * `Forbidden` - the student profile is inactive
    /// * `BusinessConflict` - already enrolled, or the course is full
    /// * `ConcurrencyExhausted` - conflicts persisted through every attempt
    pub async fn enroll(&self, request: &EnrollRequest) -> EnrollmentResult<Enrollment> {
        require("principal_id", request.principal_id.as_str())?;
        require("institution_id", request.institution_id.as_str())?;
        require("course_id", &request.course_id)?;
        require("semester", &request.semester)?;
        require("academic_year", &request.academic_year)?;

        let ctx = self
            .authorize(
                &request.principal_id,
                &request.institution_id,
                AccessAction::Enroll,
                &request.course_id,
                request.correlation_id.as_deref(),
            )
            .await?;

        let ctx_ref = &ctx;
        let result = with_retry(&self.policy, self.sleeper.as_ref(), "enroll", move |_| {
            self.enroll_attempt(ctx_ref, request)
        })
        .await;
        let (enrollment, _) = self.settle("enroll", result)?;

        self.audit_success(&ctx, AccessAction::Enroll, &enrollment, "enrollment created")
            .await;
        info!(
            principal = %ctx.principal_id(),
            institution = %ctx.institution_id(),
            course_id = %enrollment.course_id(),
            enrollment_id = %enrollment.id(),
            semester = %enrollment.semester(),
            "enrolled"
        );
        Ok(enrollment)
    }

    async fn enroll_attempt(
        &self,
        ctx: &TenantContext,
        request: &EnrollRequest,
    ) -> Result<(Enrollment, RosterSnapshot), Failure> {
        let mut tx = self.store.begin_transaction(ctx.institution_id()).await?;
        let staged = self
            .stage_enroll(
                &mut tx,
                ctx,
                AccessAction::Enroll,
                StudentLookup::Principal(ctx.principal_id()),
                &request.course_id,
                &request.semester,
                &request.academic_year,
                true,
            )
            .await;
        finish(tx, staged).await
    }

    /// Drops the calling principal's active enrollment in a course.
    ///
    /// # Errors
    ///
    /// * `Validation` - blank input
    /// * `AccessDenied` - no active membership in the institution
    /// * `NotFound` - no student profile, or no active enrollment for the course
    /// * `ConcurrencyExhausted` - conflicts persisted through every attempt
    pub async fn drop_enrollment(&self, request: &DropRequest) -> EnrollmentResult<Enrollment> {
        require("principal_id", request.principal_id.as_str())?;
        require("institution_id", request.institution_id.as_str())?;
        require("course_id", &request.course_id)?;

        let ctx = self
            .authorize(
                &request.principal_id,
                &request.institution_id,
                AccessAction::Drop,
                &request.course_id,
                request.correlation_id.as_deref(),
            )
            .await?;

        let ctx_ref = &ctx;
        let result = with_retry(&self.policy, self.sleeper.as_ref(), "drop", move |_| {
            self.drop_attempt(ctx_ref, request)
        })
        .await;
        let (enrollment, _) = self.settle("drop", result)?;

        self.audit_success(&ctx, AccessAction::Drop, &enrollment, "enrollment dropped")
            .await;
        info!(
            principal = %ctx.principal_id(),
            institution = %ctx.institution_id(),
            course_id = %enrollment.course_id(),
            enrollment_id = %enrollment.id(),
            credits_released = enrollment.credits(),
            "dropped"
        );
        Ok(enrollment)
    }

    async fn drop_attempt(
        &self,
        ctx: &TenantContext,
        request: &DropRequest,
    ) -> Result<(Enrollment, RosterSnapshot), Failure> {
        let mut tx = self.store.begin_transaction(ctx.institution_id()).await?;
        let staged = self
            .stage_drop(
                &mut tx,
                ctx,
                AccessAction::Drop,
                StudentLookup::Principal(ctx.principal_id()),
                &request.course_id,
                request.semester.as_deref(),
            )
            .await;
        finish(tx, staged).await
    }

    /// Enrolls a student on an administrator's behalf, ignoring the seat
    /// limit. The duplicate, credit-limit and tenant checks still apply.
    ///
    /// # Errors
    ///
    /// As [`enroll`](Self::enroll), plus `Forbidden` when the caller is not
    /// an administrator of the institution. `CourseFull` is never returned.
    pub async fn admin_enroll(
        &self,
        request: &AdminEnrollRequest,
    ) -> EnrollmentResult<OverrideOutcome> {
        require("admin_id", request.admin_id.as_str())?;
        require("institution_id", request.institution_id.as_str())?;
        require("student_id", &request.student_id)?;
        require("course_id", &request.course_id)?;
        require("semester", &request.semester)?;
        require("academic_year", &request.academic_year)?;

        let ctx = self
            .authorize_admin(
                &request.admin_id,
                &request.institution_id,
                AccessAction::AdminEnroll,
                &request.course_id,
                request.correlation_id.as_deref(),
            )
            .await?;

        let ctx_ref = &ctx;
        let result = with_retry(
            &self.policy,
            self.sleeper.as_ref(),
            "admin_enroll",
            move |_| self.admin_enroll_attempt(ctx_ref, request),
        )
        .await;
        let (enrollment, roster) = self.settle("admin_enroll", result)?;

        // At or above the limit before the override added a seat
        let was_over_capacity = roster.enrolled_count >= roster.max_students;
        self.audit_override(&ctx, AccessAction::AdminEnroll, &enrollment, roster, was_over_capacity)
            .await;
        Ok(OverrideOutcome {
            enrollment,
            was_over_capacity,
        })
    }

    async fn admin_enroll_attempt(
        &self,
        ctx: &TenantContext,
        request: &AdminEnrollRequest,
    ) -> Result<(Enrollment, RosterSnapshot), Failure> {
        let mut tx = self.store.begin_transaction(ctx.institution_id()).await?;
        let staged = self
            .stage_enroll(
                &mut tx,
                ctx,
                AccessAction::AdminEnroll,
                StudentLookup::Id(&request.student_id),
                &request.course_id,
                &request.semester,
                &request.academic_year,
                false,
            )
            .await;
        finish(tx, staged).await
    }

    /// Removes a student from a roster on an administrator's behalf.
    ///
    /// # Errors
    ///
    /// As [`drop_enrollment`](Self::drop_enrollment), plus `Forbidden` when the
    /// caller is not an administrator of the institution.
    pub async fn admin_remove(
        &self,
        request: &AdminRemoveRequest,
    ) -> EnrollmentResult<OverrideOutcome> {
        require("admin_id", request.admin_id.as_str())?;
        require("institution_id", request.institution_id.as_str())?;
        require("student_id", &request.student_id)?;
        require("course_id", &request.course_id)?;

        let ctx = self
            .authorize_admin(
                &request.admin_id,
                &request.institution_id,
                AccessAction::AdminRemove,
                &request.course_id,
                request.correlation_id.as_deref(),
            )
            .await?;

        let ctx_ref = &ctx;
        let result = with_retry(
            &self.policy,
            self.sleeper.as_ref(),
            "admin_remove",
            move |_| self.admin_remove_attempt(ctx_ref, request),
        )
        .await;
        let (enrollment, roster) = self.settle("admin_remove", result)?;

        let was_over_capacity = roster.enrolled_count > roster.max_students;
        self.audit_override(&ctx, AccessAction::AdminRemove, &enrollment, roster, was_over_capacity)
            .await;
        Ok(OverrideOutcome {
            enrollment,
            was_over_capacity,
        })
    }

    async fn admin_remove_attempt(
        &self,
        ctx: &TenantContext,
        request: &AdminRemoveRequest,
    ) -> Result<(Enrollment, RosterSnapshot), Failure> {
        let mut tx = self.store.begin_transaction(ctx.institution_id()).await?;
        let staged = self
            .stage_drop(
                &mut tx,
                ctx,
                AccessAction::AdminRemove,
                StudentLookup::Id(&request.student_id),
                &request.course_id,
                request.semester.as_deref(),
            )
            .await;
        finish(tx, staged).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn stage_enroll(
        &self,
        tx: &mut S::Transaction,
        ctx: &TenantContext,
        action: AccessAction,
        lookup: StudentLookup<'_>,
        course_id: &str,
        semester: &str,
        academic_year: &str,
        enforce_capacity: bool,
    ) -> Result<(Enrollment, RosterSnapshot), Failure> {
        let mut student = self.load_student(tx, ctx, lookup, action).await?;
        if !student.is_active() {
            return Err(EnrollmentError::forbidden("Student profile is inactive").into());
        }

        let mut course = self.load_course(tx, ctx, course_id, action).await?;

        // One active row per (student, course) keeps the roster a seat count
        if let Some(active) = tx
            .find_active_enrollment(student.id(), course.id(), None)
            .await?
        {
            return Err(already_enrolled(&active, semester).into());
        }
        if enforce_capacity && course.is_full() {
            return Err(EnrollmentError::conflict(ConflictKind::CourseFull).into());
        }
        if student.would_exceed(course.credits()) {
            return Err(EnrollmentError::validation(format!(
                "Credit limit exceeded. Current: {}, Course: {}, Max: {}",
                student.total_credits(),
                course.credits(),
                student.max_credits()
            ))
            .into());
        }

        let roster = RosterSnapshot::of(&course);
        let enrollment = Enrollment::enrolled(&student, &course, semester, academic_year);
        course.add_student(student.id());
        student.add_course(course.id(), course.credits());

        let enrollment = tx.stage_new_enrollment(&enrollment).await?;
        tx.stage_course(&course).await?;
        tx.stage_student(&student).await?;
        Ok((enrollment, roster))
    }

    async fn stage_drop(
        &self,
        tx: &mut S::Transaction,
        ctx: &TenantContext,
        action: AccessAction,
        lookup: StudentLookup<'_>,
        course_id: &str,
        semester: Option<&str>,
    ) -> Result<(Enrollment, RosterSnapshot), Failure> {
        let mut student = self.load_student(tx, ctx, lookup, action).await?;

        let mut enrollment = tx
            .find_active_enrollment(student.id(), course_id, semester)
            .await?
            .ok_or_else(|| EnrollmentError::not_found(ENROLLMENT_NOT_FOUND))?;
        self.ensure_owned(ctx, &enrollment, action)?;

        let mut course = tx
            .read_course(course_id)
            .await?
            .ok_or_else(|| EnrollmentError::not_found(COURSE_NOT_FOUND))?;
        self.ensure_owned(ctx, &course, action)?;

        let still_held = tx
            .count_active_enrollments(student.id(), course.id())
            .await?
            > 1;

        let roster = RosterSnapshot::of(&course);
        enrollment.mark_dropped();
        if still_held {
            student.release_credits(enrollment.credits());
        } else {
            course.remove_student(student.id());
            student.remove_course(course.id(), enrollment.credits());
        }

        let enrollment = tx.stage_enrollment(&enrollment).await?;
        tx.stage_course(&course).await?;
        tx.stage_student(&student).await?;
        Ok((enrollment, roster))
    }

    async fn load_student(
        &self,
        tx: &mut S::Transaction,
        ctx: &TenantContext,
        lookup: StudentLookup<'_>,
        action: AccessAction,
    ) -> Result<Student, Failure> {
        let student = match lookup {
            StudentLookup::Principal(principal_id) => {
                tx.read_student_for_principal(principal_id).await?
            }
            StudentLookup::Id(student_id) => tx.read_student(student_id).await?,
        }
        .ok_or_else(|| EnrollmentError::not_found(STUDENT_NOT_FOUND))?;
        self.ensure_owned(ctx, &student, action)?;
        Ok(student)
    }

    /// Loads an active course in the caller's institution. A miss is reported
    /// to the audit channel (naming the owner if the course lives elsewhere)
    /// and surfaces as a generic not-found.
    async fn load_course(
        &self,
        tx: &mut S::Transaction,
        ctx: &TenantContext,
        course_id: &str,
        action: AccessAction,
    ) -> Result<Course, Failure> {
        match tx.read_course(course_id).await? {
            Some(course) if course.is_active() => {
                self.ensure_owned(ctx, &course, action)?;
                Ok(course)
            }
            _ => {
                if let Err(e) = self
                    .validator
                    .report_missing_course(ctx, course_id, action)
                    .await
                {
                    warn!(course_id, error = %e, "could not resolve course owner for audit");
                }
                Err(EnrollmentError::not_found(COURSE_NOT_FOUND).into())
            }
        }
    }

    fn ensure_owned<R: TenantScoped>(
        &self,
        ctx: &TenantContext,
        resource: &R,
        action: AccessAction,
    ) -> Result<(), Failure> {
        let decision = self.validator.validate_resource_access(ctx, resource, action);
        if decision.allowed {
            Ok(())
        } else {
            Err(EnrollmentError::AccessDenied.into())
        }
    }

    async fn authorize(
        &self,
        principal_id: &PrincipalId,
        institution_id: &InstitutionId,
        action: AccessAction,
        course_id: &str,
        correlation_id: Option<&str>,
    ) -> EnrollmentResult<TenantContext> {
        let request = AccessRequest::new(
            principal_id.clone(),
            institution_id.clone(),
            action,
            "Course",
        )
        .with_resource_id(course_id)
        .with_correlation_id(correlation_id.map(str::to_string));

        let decision = self
            .validator
            .validate_cross_institutional_access(&request)
            .await
            .map_err(|e| EnrollmentError::unexpected(&action.to_string(), &e))?;

        match decision.membership {
            Some(membership) if decision.allowed => {
                let ctx = TenantContext::from_membership(&membership);
                Ok(match correlation_id {
                    Some(id) => ctx.with_correlation_id(id),
                    None => ctx,
                })
            }
            _ => Err(EnrollmentError::AccessDenied),
        }
    }

    async fn authorize_admin(
        &self,
        principal_id: &PrincipalId,
        institution_id: &InstitutionId,
        action: AccessAction,
        course_id: &str,
        correlation_id: Option<&str>,
    ) -> EnrollmentResult<TenantContext> {
        let ctx = self
            .authorize(principal_id, institution_id, action, course_id, correlation_id)
            .await?;
        if ctx.is_admin() {
            return Ok(ctx);
        }

        let record = AccessAuditRecord::new(
            principal_id.clone(),
            institution_id.clone(),
            action,
            "Course",
            Some(course_id.to_string()),
            false,
        )
        .with_reason(format!("role {} may not perform {}", ctx.role(), action))
        .with_correlation_id(correlation_id.map(str::to_string));
        self.validator.record_access(&record).await;

        warn!(
            principal = %principal_id,
            institution = %institution_id,
            role = %ctx.role(),
            action = %action,
            "administrative action refused"
        );
        Err(EnrollmentError::forbidden("Administrative role required"))
    }

    fn settle<T>(
        &self,
        operation: &str,
        result: Result<T, RetryError<Failure>>,
    ) -> EnrollmentResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(RetryError::Exhausted { attempts, last }) => {
                warn!(operation, attempts, error = %last, "giving up after conflicts");
                Err(EnrollmentError::ConcurrencyExhausted { attempts })
            }
            Err(RetryError::Failed(Failure::Rejected(e))) => {
                debug!(operation, kind = %e.kind(), error = %e, "request rejected");
                Err(e)
            }
            Err(RetryError::Failed(Failure::Storage(e))) if e.is_unique_violation() => {
                debug!(operation, error = %e, "lost duplicate-enrollment race");
                Err(EnrollmentError::conflict(ConflictKind::AlreadyEnrolled))
            }
            Err(RetryError::Failed(Failure::Storage(e))) => {
                Err(EnrollmentError::unexpected(operation, &e))
            }
        }
    }

    async fn audit_success(
        &self,
        ctx: &TenantContext,
        action: AccessAction,
        enrollment: &Enrollment,
        note: &str,
    ) {
        let record = AccessAuditRecord::new(
            ctx.principal_id().clone(),
            ctx.institution_id().clone(),
            action,
            "Enrollment",
            Some(enrollment.id().to_string()),
            true,
        )
        .with_reason(note)
        .with_correlation_id(ctx.correlation_id().map(str::to_string));
        self.validator.record_access(&record).await;
    }

    async fn audit_override(
        &self,
        ctx: &TenantContext,
        action: AccessAction,
        enrollment: &Enrollment,
        roster: RosterSnapshot,
        was_over_capacity: bool,
    ) {
        let record = OverrideAuditRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            principal_id: ctx.principal_id().clone(),
            institution_id: ctx.institution_id().clone(),
            action,
            student_id: enrollment.student_id().to_string(),
            course_id: enrollment.course_id().to_string(),
            enrollment_id: enrollment.id().to_string(),
            was_over_capacity,
            enrolled_count: roster.enrolled_count,
            max_students: roster.max_students,
            correlation_id: ctx.correlation_id().map(str::to_string),
        };
        self.validator.record_override(&record).await;

        info!(
            admin = %ctx.principal_id(),
            institution = %ctx.institution_id(),
            action = %action,
            student_id = %enrollment.student_id(),
            course_id = %enrollment.course_id(),
            was_over_capacity,
            "administrative override committed"
        );
    }
}
