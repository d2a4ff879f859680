//! Optimistic multi-record transactions.
//!
//! A [`Transaction`] reads committed state without taking locks and stages
//! writes in memory. [`Transaction::commit`] applies every staged write
//! atomically, checking each updated record's version token first. If any
//! record changed since it was read, nothing is written and the commit fails
//! with `ConcurrencyError::VersionConflict`; if a new enrollment collides with
//! an existing `enrolled` row it fails with `ResourceError::UniqueViolation`.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::tenant::{InstitutionId, PrincipalId};
use crate::types::{Course, Enrollment, Student};

/// An optimistic transaction bound to one institution.
///
/// Reads observe committed state only. The `stage_*` methods return the record
/// as it will read after a successful commit (version bumped); staging a record
/// owned by another institution fails with `TenantError::CrossTenantWrite`.
///
/// Dropping a transaction without committing discards its staged writes.
///
/// # Example
///
/// ```ignore
/// use registrar_persistence::core::{Transaction, TransactionProvider};
///
/// async fn bump<S: TransactionProvider>(store: &S, inst: &InstitutionId) -> StorageResult<()> {
///     let mut tx = store.begin_transaction(inst).await?;
///     let course = tx.read_course("c-1").await?.expect("course");
///     tx.stage_course(&course).await?;
///     Box::new(tx).commit().await
/// }
/// ```
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Returns the institution this transaction is bound to.
    fn institution_id(&self) -> &InstitutionId;

    /// Reads a student by ID within the bound institution.
    async fn read_student(&mut self, id: &str) -> StorageResult<Option<Student>>;

    /// Reads the student profile linked to `principal_id` within the bound institution.
    async fn read_student_for_principal(
        &mut self,
        principal_id: &PrincipalId,
    ) -> StorageResult<Option<Student>>;

    /// Reads a course by ID within the bound institution.
    async fn read_course(&mut self, id: &str) -> StorageResult<Option<Course>>;

    /// Finds the `enrolled` row for a student and course.
    ///
    /// With `semester = None` the most recently created `enrolled` row is
    /// returned.
    async fn find_active_enrollment(
        &mut self,
        student_id: &str,
        course_id: &str,
        semester: Option<&str>,
    ) -> StorageResult<Option<Enrollment>>;

    /// Counts the `enrolled` rows of a student in a course, across semesters.
    async fn count_active_enrollments(
        &mut self,
        student_id: &str,
        course_id: &str,
    ) -> StorageResult<usize>;

    /// Stages a new enrollment row.
    async fn stage_new_enrollment(&mut self, enrollment: &Enrollment)
    -> StorageResult<Enrollment>;

    /// Stages an update to an enrollment, guarded by its version token.
    async fn stage_enrollment(&mut self, enrollment: &Enrollment) -> StorageResult<Enrollment>;

    /// Stages an update to a student, guarded by its version token.
    async fn stage_student(&mut self, student: &Student) -> StorageResult<Student>;

    /// Stages an update to a course, guarded by its version token.
    async fn stage_course(&mut self, course: &Course) -> StorageResult<Course>;

    /// Applies every staged write atomically.
    ///
    /// After calling this, the transaction is consumed and cannot be used again.
    async fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discards every staged write.
    ///
    /// After calling this, the transaction is consumed and cannot be used again.
    async fn rollback(self: Box<Self>) -> StorageResult<()>;

    /// Returns whether this transaction is still active.
    fn is_active(&self) -> bool;
}

/// Provider for transaction support.
#[async_trait]
pub trait TransactionProvider: Send + Sync {
    /// The transaction type returned by this provider.
    type Transaction: Transaction + 'static;

    /// Begins a new transaction bound to `institution_id`.
    ///
    /// # Errors
    ///
    /// * `StorageError::Backend` - If a connection cannot be acquired
    async fn begin_transaction(
        &self,
        institution_id: &InstitutionId,
    ) -> StorageResult<Self::Transaction>;
}
