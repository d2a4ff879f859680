//! Deterministic test doubles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use registrar_enrollment::Sleeper;
use registrar_persistence::core::{DirectoryStorage, Transaction, TransactionProvider};
use registrar_persistence::error::{ConcurrencyError, ResourceError};
use registrar_persistence::tenant::{Membership, PrincipalId};
use registrar_persistence::types::{Course, Enrollment, Institution, Student};
use registrar_persistence::{InstitutionId, StorageError, StorageResult};

/// Records every requested delay and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
    }
}

#[derive(Debug, Default)]
struct Injection {
    conflicts: u32,
    unique_violations: u32,
    commits: u32,
}

/// Wraps a store and fails the next N commits.
///
/// Failed commits roll the inner transaction back, so nothing they staged
/// becomes visible.
pub struct ConflictInjectingStore<S> {
    inner: Arc<S>,
    injection: Arc<Mutex<Injection>>,
}

impl<S> ConflictInjectingStore<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            injection: Arc::new(Mutex::new(Injection::default())),
        }
    }

    /// Fails the next `n` commits with a version conflict.
    pub fn fail_next_commits(&self, n: u32) {
        self.injection.lock().conflicts = n;
    }

    /// Fails the next `n` commits with a duplicate-key violation.
    pub fn violate_next_commits(&self, n: u32) {
        self.injection.lock().unique_violations = n;
    }

    /// Commits attempted so far, failed or not.
    pub fn commits_attempted(&self) -> u32 {
        self.injection.lock().commits
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }
}

#[async_trait]
impl<S: DirectoryStorage> DirectoryStorage for ConflictInjectingStore<S> {
    fn backend_name(&self) -> &'static str {
        "conflict-injecting"
    }

    async fn institution(&self, id: &InstitutionId) -> StorageResult<Option<Institution>> {
        self.inner.institution(id).await
    }

    async fn membership(
        &self,
        principal_id: &PrincipalId,
        institution_id: &InstitutionId,
    ) -> StorageResult<Option<Membership>> {
        self.inner.membership(principal_id, institution_id).await
    }

    async fn course_owner(&self, course_id: &str) -> StorageResult<Option<InstitutionId>> {
        self.inner.course_owner(course_id).await
    }
}

#[async_trait]
impl<S: TransactionProvider> TransactionProvider for ConflictInjectingStore<S> {
    type Transaction = InjectingTransaction<S::Transaction>;

    async fn begin_transaction(
        &self,
        institution_id: &InstitutionId,
    ) -> StorageResult<Self::Transaction> {
        Ok(InjectingTransaction {
            inner: self.inner.begin_transaction(institution_id).await?,
            injection: Arc::clone(&self.injection),
        })
    }
}

pub struct InjectingTransaction<T> {
    inner: T,
    injection: Arc<Mutex<Injection>>,
}

impl<T> InjectingTransaction<T> {
    fn injected_failure(&self) -> Option<StorageError> {
        let mut injection = self.injection.lock();
        injection.commits += 1;
        if injection.conflicts > 0 {
            injection.conflicts -= 1;
            return Some(
                ConcurrencyError::VersionConflict {
                    resource_type: "Course".to_string(),
                    id: "injected".to_string(),
                    expected_version: 1,
                    actual_version: 2,
                }
                .into(),
            );
        }
        if injection.unique_violations > 0 {
            injection.unique_violations -= 1;
            return Some(
                ResourceError::UniqueViolation {
                    constraint: "enrollments_one_active".to_string(),
                    key: "injected".to_string(),
                }
                .into(),
            );
        }
        None
    }
}

#[async_trait]
impl<T: Transaction + 'static> Transaction for InjectingTransaction<T> {
    fn institution_id(&self) -> &InstitutionId {
        self.inner.institution_id()
    }

    async fn read_student(&mut self, id: &str) -> StorageResult<Option<Student>> {
        self.inner.read_student(id).await
    }

    async fn read_student_for_principal(
        &mut self,
        principal_id: &PrincipalId,
    ) -> StorageResult<Option<Student>> {
        self.inner.read_student_for_principal(principal_id).await
    }

    async fn read_course(&mut self, id: &str) -> StorageResult<Option<Course>> {
        self.inner.read_course(id).await
    }

    async fn find_active_enrollment(
        &mut self,
        student_id: &str,
        course_id: &str,
        semester: Option<&str>,
    ) -> StorageResult<Option<Enrollment>> {
        self.inner
            .find_active_enrollment(student_id, course_id, semester)
            .await
    }

    async fn count_active_enrollments(
        &mut self,
        student_id: &str,
        course_id: &str,
    ) -> StorageResult<usize> {
        self.inner.count_active_enrollments(student_id, course_id).await
    }

    async fn stage_new_enrollment(
        &mut self,
        enrollment: &Enrollment,
    ) -> StorageResult<Enrollment> {
        self.inner.stage_new_enrollment(enrollment).await
    }

    async fn stage_enrollment(&mut self, enrollment: &Enrollment) -> StorageResult<Enrollment> {
        self.inner.stage_enrollment(enrollment).await
    }

    async fn stage_student(&mut self, student: &Student) -> StorageResult<Student> {
        self.inner.stage_student(student).await
    }

    async fn stage_course(&mut self, course: &Course) -> StorageResult<Course> {
        self.inner.stage_course(course).await
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        if let Some(err) = self.injected_failure() {
            Box::new(self.inner).rollback().await?;
            return Err(err);
        }
        Box::new(self.inner).commit().await
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        Box::new(self.inner).rollback().await
    }

    fn is_active(&self) -> bool {
        self.inner.is_active()
    }
}
