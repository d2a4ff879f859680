//! Optimistic transactions for [`MemoryStore`](super::MemoryStore).

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::storage::{MemoryState, MemoryStore};
use crate::backends::{
    StagedWrite, WriteSet, next_version_of_course, next_version_of_enrollment,
    next_version_of_student,
};
use crate::core::{Transaction, TransactionProvider};
use crate::error::{
    ConcurrencyError, ResourceError, StorageError, StorageResult, TransactionError,
};
use crate::tenant::{InstitutionId, PrincipalId};
use crate::types::{Course, Enrollment, Student, TenantScoped};

/// A transaction against a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    institution_id: InstitutionId,
    writes: WriteSet,
    active: bool,
}

impl MemoryTransaction {
    fn ensure_active(&self) -> StorageResult<()> {
        if self.active {
            Ok(())
        } else {
            Err(StorageError::Transaction(
                TransactionError::InvalidTransaction,
            ))
        }
    }
}

fn version_conflict(resource_type: &str, id: &str, expected: u64, actual: u64) -> StorageError {
    StorageError::Concurrency(ConcurrencyError::VersionConflict {
        resource_type: resource_type.to_string(),
        id: id.to_string(),
        expected_version: expected,
        actual_version: actual,
    })
}

fn not_found(resource_type: &str, id: &str) -> StorageError {
    StorageError::Resource(ResourceError::NotFound {
        resource_type: resource_type.to_string(),
        id: id.to_string(),
    })
}

/// Checks every staged write against committed state without changing it.
fn validate(state: &MemoryState, writes: &WriteSet) -> StorageResult<()> {
    for write in writes.iter() {
        match write {
            StagedWrite::Student(s) => {
                let current = state
                    .student(s.institution_id(), s.id())
                    .ok_or_else(|| not_found("Student", s.id()))?;
                if current.version() != s.version() {
                    return Err(version_conflict(
                        "Student",
                        s.id(),
                        s.version(),
                        current.version(),
                    ));
                }
            }
            StagedWrite::Course(c) => {
                let current = state
                    .course(c.institution_id(), c.id())
                    .ok_or_else(|| not_found("Course", c.id()))?;
                if current.version() != c.version() {
                    return Err(version_conflict(
                        "Course",
                        c.id(),
                        c.version(),
                        current.version(),
                    ));
                }
            }
            StagedWrite::Enrollment(e) => {
                let idx = state
                    .enrollment_index(e.id())
                    .ok_or_else(|| not_found("Enrollment", e.id()))?;
                let current = &state.enrollments[idx];
                if current.version() != e.version() {
                    return Err(version_conflict(
                        "Enrollment",
                        e.id(),
                        e.version(),
                        current.version(),
                    ));
                }
            }
            StagedWrite::NewEnrollment(e) => {
                if state.enrollment_index(e.id()).is_some() {
                    return Err(StorageError::Resource(ResourceError::AlreadyExists {
                        resource_type: "Enrollment".to_string(),
                        id: e.id().to_string(),
                    }));
                }
                if e.is_enrolled() && has_active_duplicate(state, writes, e) {
                    return Err(StorageError::Resource(ResourceError::UniqueViolation {
                        constraint: "enrollments_one_active".to_string(),
                        key: format!("{}/{}/{}", e.student_id(), e.course_id(), e.semester()),
                    }));
                }
            }
        }
    }
    Ok(())
}

/// Returns `true` if another row would also be `enrolled` for the same
/// (institution, student, course, semester) once `writes` are applied.
fn has_active_duplicate(state: &MemoryState, writes: &WriteSet, new: &Enrollment) -> bool {
    let same_slot = |e: &Enrollment| {
        e.id() != new.id()
            && e.is_enrolled()
            && e.institution_id() == new.institution_id()
            && e.student_id() == new.student_id()
            && e.course_id() == new.course_id()
            && e.semester() == new.semester()
    };

    let committed = state.enrollments.iter().any(|e| {
        let replaced = writes.iter().find_map(|w| match w {
            StagedWrite::Enrollment(staged) if staged.id() == e.id() => Some(staged),
            _ => None,
        });
        same_slot(replaced.unwrap_or(e))
    });
    let staged = writes.iter().any(|w| match w {
        StagedWrite::NewEnrollment(other) => same_slot(other),
        _ => false,
    });
    committed || staged
}

fn apply(state: &mut MemoryState, writes: &WriteSet) {
    for write in writes.iter() {
        match write {
            StagedWrite::Student(s) => {
                state.students.insert(
                    (s.institution_id().clone(), s.id().to_string()),
                    next_version_of_student(s),
                );
            }
            StagedWrite::Course(c) => {
                state.courses.insert(
                    (c.institution_id().clone(), c.id().to_string()),
                    next_version_of_course(c),
                );
            }
            StagedWrite::Enrollment(e) => {
                if let Some(idx) = state.enrollment_index(e.id()) {
                    state.enrollments[idx] = next_version_of_enrollment(e);
                }
            }
            StagedWrite::NewEnrollment(e) => {
                state.enrollments.push(next_version_of_enrollment(e));
            }
        }
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn institution_id(&self) -> &InstitutionId {
        &self.institution_id
    }

    async fn read_student(&mut self, id: &str) -> StorageResult<Option<Student>> {
        self.ensure_active()?;
        Ok(self.state.lock().student(&self.institution_id, id).cloned())
    }

    async fn read_student_for_principal(
        &mut self,
        principal_id: &PrincipalId,
    ) -> StorageResult<Option<Student>> {
        self.ensure_active()?;
        let state = self.state.lock();
        Ok(state
            .students
            .values()
            .find(|s| s.institution_id() == &self.institution_id && s.principal_id() == principal_id)
            .cloned())
    }

    async fn read_course(&mut self, id: &str) -> StorageResult<Option<Course>> {
        self.ensure_active()?;
        Ok(self.state.lock().course(&self.institution_id, id).cloned())
    }

    async fn find_active_enrollment(
        &mut self,
        student_id: &str,
        course_id: &str,
        semester: Option<&str>,
    ) -> StorageResult<Option<Enrollment>> {
        self.ensure_active()?;
        let state = self.state.lock();
        Ok(state
            .enrollments
            .iter()
            .rev()
            .find(|e| {
                e.institution_id() == &self.institution_id
                    && e.is_enrolled()
                    && e.student_id() == student_id
                    && e.course_id() == course_id
                    && semester.is_none_or(|s| e.semester() == s)
            })
            .cloned())
    }

    async fn count_active_enrollments(
        &mut self,
        student_id: &str,
        course_id: &str,
    ) -> StorageResult<usize> {
        self.ensure_active()?;
        let state = self.state.lock();
        Ok(state
            .enrollments
            .iter()
            .filter(|e| {
                e.institution_id() == &self.institution_id
                    && e.is_enrolled()
                    && e.student_id() == student_id
                    && e.course_id() == course_id
            })
            .count())
    }

    async fn stage_new_enrollment(
        &mut self,
        enrollment: &Enrollment,
    ) -> StorageResult<Enrollment> {
        self.ensure_active()?;
        self.writes.stage(
            &self.institution_id,
            enrollment,
            StagedWrite::NewEnrollment(enrollment.clone()),
        )?;
        Ok(next_version_of_enrollment(enrollment))
    }

    async fn stage_enrollment(&mut self, enrollment: &Enrollment) -> StorageResult<Enrollment> {
        self.ensure_active()?;
        self.writes.stage(
            &self.institution_id,
            enrollment,
            StagedWrite::Enrollment(enrollment.clone()),
        )?;
        Ok(next_version_of_enrollment(enrollment))
    }

    async fn stage_student(&mut self, student: &Student) -> StorageResult<Student> {
        self.ensure_active()?;
        self.writes.stage(
            &self.institution_id,
            student,
            StagedWrite::Student(student.clone()),
        )?;
        Ok(next_version_of_student(student))
    }

    async fn stage_course(&mut self, course: &Course) -> StorageResult<Course> {
        self.ensure_active()?;
        self.writes.stage(
            &self.institution_id,
            course,
            StagedWrite::Course(course.clone()),
        )?;
        Ok(next_version_of_course(course))
    }

    async fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.ensure_active()?;
        self.active = false;

        let mut state = self.state.lock();
        validate(&state, &self.writes)?;
        apply(&mut state, &self.writes);
        debug!(
            institution = %self.institution_id,
            writes = self.writes.len(),
            "memory transaction committed"
        );
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> StorageResult<()> {
        self.ensure_active()?;
        self.active = false;
        self.writes.clear();
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[async_trait]
impl TransactionProvider for MemoryStore {
    type Transaction = MemoryTransaction;

    async fn begin_transaction(
        &self,
        institution_id: &InstitutionId,
    ) -> StorageResult<Self::Transaction> {
        Ok(MemoryTransaction {
            state: Arc::clone(&self.state),
            institution_id: institution_id.clone(),
            writes: WriteSet::default(),
            active: true,
        })
    }
}
