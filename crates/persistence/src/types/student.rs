//! Student profile records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{ResourceKind, TenantScoped};
use crate::tenant::{InstitutionId, PrincipalId};

/// A per-institution academic profile linked to a global principal.
///
/// The credit total and course roster are only changed through
/// [`add_course`](Self::add_course) and [`remove_course`](Self::remove_course),
/// which keep them in step with each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    id: String,
    institution_id: InstitutionId,
    principal_id: PrincipalId,
    total_credits: u32,
    max_credits: u32,
    is_active: bool,
    enrolled_courses: BTreeSet<String>,
    /// Optimistic-concurrency version token (0 until first persisted).
    version: u64,
}

impl Student {
    /// Creates an active student with no enrollments.
    pub fn new(
        id: impl Into<String>,
        institution_id: InstitutionId,
        principal_id: PrincipalId,
        max_credits: u32,
    ) -> Self {
        Self {
            id: id.into(),
            institution_id,
            principal_id,
            total_credits: 0,
            max_credits,
            is_active: true,
            enrolled_courses: BTreeSet::new(),
            version: 0,
        }
    }

    /// Rebuilds a student from persisted columns.
    #[allow(clippy::too_many_arguments)]
    pub fn from_storage(
        id: impl Into<String>,
        institution_id: InstitutionId,
        principal_id: PrincipalId,
        total_credits: u32,
        max_credits: u32,
        is_active: bool,
        enrolled_courses: BTreeSet<String>,
        version: u64,
    ) -> Self {
        Self {
            id: id.into(),
            institution_id,
            principal_id,
            total_credits,
            max_credits,
            is_active,
            enrolled_courses,
            version,
        }
    }

    /// Returns a copy marked active or inactive.
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Returns a copy with a preset credit total (seeding only).
    pub fn with_total_credits(mut self, total_credits: u32) -> Self {
        self.total_credits = total_credits;
        self
    }

    /// Returns the student ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the linked principal.
    pub fn principal_id(&self) -> &PrincipalId {
        &self.principal_id
    }

    /// Returns the credits currently held.
    pub fn total_credits(&self) -> u32 {
        self.total_credits
    }

    /// Returns the credit ceiling.
    pub fn max_credits(&self) -> u32 {
        self.max_credits
    }

    /// Returns whether the profile is active.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the IDs of courses currently on the student's roster.
    pub fn enrolled_courses(&self) -> &BTreeSet<String> {
        &self.enrolled_courses
    }

    /// Returns the version token.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns `true` if adding `credits` would exceed the ceiling.
    pub fn would_exceed(&self, credits: u32) -> bool {
        self.total_credits.saturating_add(credits) > self.max_credits
    }

    /// Puts a course on the roster and adds its credits.
    pub fn add_course(&mut self, course_id: &str, credits: u32) {
        self.enrolled_courses.insert(course_id.to_string());
        self.total_credits = self.total_credits.saturating_add(credits);
    }

    /// Takes a course off the roster and subtracts its credits, floored at zero.
    pub fn remove_course(&mut self, course_id: &str, credits: u32) {
        self.enrolled_courses.remove(course_id);
        self.release_credits(credits);
    }

    /// Subtracts credits without touching the roster, floored at zero. Used
    /// when another active row still holds the course.
    pub fn release_credits(&mut self, credits: u32) {
        self.total_credits = self.total_credits.saturating_sub(credits);
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl TenantScoped for Student {
    fn institution_id(&self) -> &InstitutionId {
        &self.institution_id
    }

    fn resource_kind(&self) -> ResourceKind {
        ResourceKind::Student
    }

    fn resource_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> Student {
        Student::new(
            "s-1",
            InstitutionId::new("inst-a"),
            PrincipalId::new("user-1"),
            18,
        )
    }

    #[test]
    fn test_would_exceed_uses_strict_greater_than() {
        let s = student().with_total_credits(14);
        assert!(!s.would_exceed(4));
        assert!(s.would_exceed(5));
    }

    #[test]
    fn test_add_and_remove_course_keep_totals() {
        let mut s = student();
        s.add_course("c-1", 4);
        s.add_course("c-2", 3);
        assert_eq!(s.total_credits(), 7);
        assert_eq!(s.enrolled_courses().len(), 2);

        s.remove_course("c-1", 4);
        assert_eq!(s.total_credits(), 3);
        assert!(!s.enrolled_courses().contains("c-1"));
    }

    #[test]
    fn test_remove_course_floors_at_zero() {
        let mut s = student().with_total_credits(2);
        s.remove_course("c-9", 4);
        assert_eq!(s.total_credits(), 0);
    }
}
