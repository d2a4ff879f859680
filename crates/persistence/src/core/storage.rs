//! Directory and record storage traits.
//!
//! [`DirectoryStorage`] answers the tenancy questions the access layer asks
//! (does the institution exist, is the principal a member, who owns this
//! course). [`RecordStorage`] exposes committed academic records outside of a
//! transaction, plus the seeding operations used by registration flows.
//!
//! Neither trait mutates a student's credits or a course's roster; those only
//! change through a [`Transaction`](super::Transaction).

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::tenant::{InstitutionId, Membership, PrincipalId};
use crate::types::{Course, Enrollment, Institution, Student};

/// Tenancy lookups: institutions, memberships and record ownership.
///
/// # Example
///
/// ```ignore
/// use registrar_persistence::core::DirectoryStorage;
/// use registrar_persistence::tenant::{InstitutionId, PrincipalId};
///
/// async fn is_member<S: DirectoryStorage>(store: &S) -> bool {
///     let membership = store
///         .membership(&PrincipalId::new("user-1"), &InstitutionId::new("state-u"))
///         .await
///         .ok()
///         .flatten();
///     membership.is_some_and(|m| m.is_active())
/// }
/// ```
#[async_trait]
pub trait DirectoryStorage: Send + Sync {
    /// Returns a human-readable name for this storage backend.
    fn backend_name(&self) -> &'static str;

    /// Reads an institution.
    async fn institution(&self, id: &InstitutionId) -> StorageResult<Option<Institution>>;

    /// Reads the membership of `principal_id` in `institution_id`, whatever its status.
    async fn membership(
        &self,
        principal_id: &PrincipalId,
        institution_id: &InstitutionId,
    ) -> StorageResult<Option<Membership>>;

    /// Returns the institution owning `course_id`, searching every tenant.
    ///
    /// Only used to enrich internal audit records; the answer must never be
    /// surfaced to the caller that asked about the course.
    async fn course_owner(&self, course_id: &str) -> StorageResult<Option<InstitutionId>>;
}

/// Committed-state reads and seeding.
#[async_trait]
pub trait RecordStorage: Send + Sync {
    /// Creates or replaces an institution.
    async fn put_institution(&self, institution: Institution) -> StorageResult<()>;

    /// Creates or replaces a membership.
    async fn put_membership(&self, membership: Membership) -> StorageResult<()>;

    /// Creates a student profile. The stored copy starts at version 1.
    ///
    /// # Errors
    ///
    /// * `StorageError::Resource(AlreadyExists)` - the ID is taken in that institution
    /// * `StorageError::Validation` - the principal already has a profile there
    async fn create_student(&self, student: Student) -> StorageResult<Student>;

    /// Creates a course. The stored copy starts at version 1.
    ///
    /// # Errors
    ///
    /// * `StorageError::Resource(AlreadyExists)` - the ID is taken in that institution
    async fn create_course(&self, course: Course) -> StorageResult<Course>;

    /// Reads a student scoped to `institution_id`.
    async fn read_student(
        &self,
        institution_id: &InstitutionId,
        id: &str,
    ) -> StorageResult<Option<Student>>;

    /// Reads a course scoped to `institution_id`.
    async fn read_course(
        &self,
        institution_id: &InstitutionId,
        id: &str,
    ) -> StorageResult<Option<Course>>;

    /// Lists every enrollment row of a student, oldest first.
    async fn enrollments_for_student(
        &self,
        institution_id: &InstitutionId,
        student_id: &str,
    ) -> StorageResult<Vec<Enrollment>>;

    /// Lists every enrollment row of a course, oldest first.
    async fn enrollments_for_course(
        &self,
        institution_id: &InstitutionId,
        course_id: &str,
    ) -> StorageResult<Vec<Enrollment>>;
}
