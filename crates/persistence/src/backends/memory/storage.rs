//! Directory and record storage for [`MemoryStore`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{DirectoryStorage, RecordStorage};
use crate::error::{ResourceError, StorageError, StorageResult, ValidationError};
use crate::tenant::{InstitutionId, Membership, PrincipalId};
use crate::types::{Course, Enrollment, Institution, Student, TenantScoped};

type RecordKey = (InstitutionId, String);

/// Committed state.
#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    pub(crate) institutions: HashMap<InstitutionId, Institution>,
    pub(crate) memberships: HashMap<(PrincipalId, InstitutionId), Membership>,
    pub(crate) students: HashMap<RecordKey, Student>,
    pub(crate) courses: HashMap<RecordKey, Course>,
    /// Enrollment rows in creation order.
    pub(crate) enrollments: Vec<Enrollment>,
}

impl MemoryState {
    pub(crate) fn student(&self, institution_id: &InstitutionId, id: &str) -> Option<&Student> {
        self.students.get(&(institution_id.clone(), id.to_string()))
    }

    pub(crate) fn course(&self, institution_id: &InstitutionId, id: &str) -> Option<&Course> {
        self.courses.get(&(institution_id.clone(), id.to_string()))
    }

    pub(crate) fn enrollment_index(&self, id: &str) -> Option<usize> {
        self.enrollments.iter().position(|e| e.id() == id)
    }
}

/// Process-local store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub(crate) state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of enrollment rows (any status) across all institutions.
    pub fn enrollment_count(&self) -> usize {
        self.state.lock().enrollments.len()
    }
}

#[async_trait]
impl DirectoryStorage for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn institution(&self, id: &InstitutionId) -> StorageResult<Option<Institution>> {
        Ok(self.state.lock().institutions.get(id).cloned())
    }

    async fn membership(
        &self,
        principal_id: &PrincipalId,
        institution_id: &InstitutionId,
    ) -> StorageResult<Option<Membership>> {
        let state = self.state.lock();
        Ok(state
            .memberships
            .get(&(principal_id.clone(), institution_id.clone()))
            .cloned())
    }

    async fn course_owner(&self, course_id: &str) -> StorageResult<Option<InstitutionId>> {
        let state = self.state.lock();
        let mut owners: Vec<&InstitutionId> = state
            .courses
            .keys()
            .filter(|(_, id)| id == course_id)
            .map(|(inst, _)| inst)
            .collect();
        owners.sort();
        Ok(owners.first().map(|inst| (*inst).clone()))
    }
}

#[async_trait]
impl RecordStorage for MemoryStore {
    async fn put_institution(&self, institution: Institution) -> StorageResult<()> {
        self.state
            .lock()
            .institutions
            .insert(institution.id.clone(), institution);
        Ok(())
    }

    async fn put_membership(&self, membership: Membership) -> StorageResult<()> {
        let key = (
            membership.principal_id.clone(),
            membership.institution_id.clone(),
        );
        self.state.lock().memberships.insert(key, membership);
        Ok(())
    }

    async fn create_student(&self, student: Student) -> StorageResult<Student> {
        let mut state = self.state.lock();
        let key = (student.institution_id().clone(), student.id().to_string());
        if state.students.contains_key(&key) {
            return Err(StorageError::Resource(ResourceError::AlreadyExists {
                resource_type: "Student".to_string(),
                id: student.id().to_string(),
            }));
        }
        let principal_taken = state.students.values().any(|s| {
            s.institution_id() == student.institution_id()
                && s.principal_id() == student.principal_id()
        });
        if principal_taken {
            return Err(StorageError::Validation(ValidationError::InvalidRecord {
                resource_type: "Student".to_string(),
                message: format!(
                    "principal {} already has a profile in {}",
                    student.principal_id(),
                    student.institution_id()
                ),
            }));
        }

        let mut stored = student;
        stored.set_version(1);
        state.students.insert(key, stored.clone());
        Ok(stored)
    }

    async fn create_course(&self, course: Course) -> StorageResult<Course> {
        let mut state = self.state.lock();
        let key = (course.institution_id().clone(), course.id().to_string());
        if state.courses.contains_key(&key) {
            return Err(StorageError::Resource(ResourceError::AlreadyExists {
                resource_type: "Course".to_string(),
                id: course.id().to_string(),
            }));
        }

        let mut stored = course;
        stored.set_version(1);
        state.courses.insert(key, stored.clone());
        Ok(stored)
    }

    async fn read_student(
        &self,
        institution_id: &InstitutionId,
        id: &str,
    ) -> StorageResult<Option<Student>> {
        Ok(self.state.lock().student(institution_id, id).cloned())
    }

    async fn read_course(
        &self,
        institution_id: &InstitutionId,
        id: &str,
    ) -> StorageResult<Option<Course>> {
        Ok(self.state.lock().course(institution_id, id).cloned())
    }

    async fn enrollments_for_student(
        &self,
        institution_id: &InstitutionId,
        student_id: &str,
    ) -> StorageResult<Vec<Enrollment>> {
        let state = self.state.lock();
        Ok(state
            .enrollments
            .iter()
            .filter(|e| e.institution_id() == institution_id && e.student_id() == student_id)
            .cloned()
            .collect())
    }

    async fn enrollments_for_course(
        &self,
        institution_id: &InstitutionId,
        course_id: &str,
    ) -> StorageResult<Vec<Enrollment>> {
        let state = self.state.lock();
        Ok(state
            .enrollments
            .iter()
            .filter(|e| e.institution_id() == institution_id && e.course_id() == course_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_student_assigns_version_one() {
        let store = MemoryStore::new();
        let inst = InstitutionId::new("inst-a");
        let stored = store
            .create_student(Student::new("s-1", inst.clone(), PrincipalId::new("u"), 18))
            .await
            .unwrap();
        assert_eq!(stored.version(), 1);

        let dup = store
            .create_student(Student::new("s-1", inst, PrincipalId::new("v"), 18))
            .await;
        assert!(matches!(
            dup,
            Err(StorageError::Resource(ResourceError::AlreadyExists { .. }))
        ));
    }

    #[tokio::test]
    async fn test_one_profile_per_principal_per_institution() {
        let store = MemoryStore::new();
        let inst = InstitutionId::new("inst-a");
        store
            .create_student(Student::new("s-1", inst.clone(), PrincipalId::new("u"), 18))
            .await
            .unwrap();
        let second = store
            .create_student(Student::new("s-2", inst, PrincipalId::new("u"), 18))
            .await;
        assert!(matches!(second, Err(StorageError::Validation(_))));
    }

    #[tokio::test]
    async fn test_reads_are_scoped_by_institution() {
        let store = MemoryStore::new();
        let a = InstitutionId::new("inst-a");
        let b = InstitutionId::new("inst-b");
        store
            .create_course(Course::new("c-1", a.clone(), "CS101", "Intro", 4, 10))
            .await
            .unwrap();

        assert!(store.read_course(&a, "c-1").await.unwrap().is_some());
        assert!(store.read_course(&b, "c-1").await.unwrap().is_none());
        assert_eq!(store.course_owner("c-1").await.unwrap(), Some(a));
        assert_eq!(store.course_owner("c-404").await.unwrap(), None);
    }
}
