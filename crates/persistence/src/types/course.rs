//! Course records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{ResourceKind, TenantScoped};
use crate::tenant::InstitutionId;

/// A capacity-constrained course roster.
///
/// Every committed roster change bumps [`version`](Self::version); the store
/// rejects a write whose version no longer matches what is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    id: String,
    institution_id: InstitutionId,
    code: String,
    title: String,
    credits: u32,
    max_students: u32,
    is_active: bool,
    enrolled_students: BTreeSet<String>,
    version: u64,
}

/// Denormalized course identity captured when an enrollment is created.
///
/// Later edits to the course do not change existing snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSnapshot {
    /// Course ID.
    pub course_id: String,
    /// Catalog code, e.g. `CS101`.
    pub code: String,
    /// Course title.
    pub title: String,
    /// Credits at enrollment time.
    pub credits: u32,
}

impl Course {
    /// Creates an active course with an empty roster.
    pub fn new(
        id: impl Into<String>,
        institution_id: InstitutionId,
        code: impl Into<String>,
        title: impl Into<String>,
        credits: u32,
        max_students: u32,
    ) -> Self {
        Self {
            id: id.into(),
            institution_id,
            code: code.into(),
            title: title.into(),
            credits,
            max_students,
            is_active: true,
            enrolled_students: BTreeSet::new(),
            version: 0,
        }
    }

    /// Rebuilds a course from persisted columns.
    #[allow(clippy::too_many_arguments)]
    pub fn from_storage(
        id: impl Into<String>,
        institution_id: InstitutionId,
        code: impl Into<String>,
        title: impl Into<String>,
        credits: u32,
        max_students: u32,
        is_active: bool,
        enrolled_students: BTreeSet<String>,
        version: u64,
    ) -> Self {
        Self {
            id: id.into(),
            institution_id,
            code: code.into(),
            title: title.into(),
            credits,
            max_students,
            is_active,
            enrolled_students,
            version,
        }
    }

    /// Returns a copy marked active or inactive.
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Returns the course ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the catalog code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the credit value.
    pub fn credits(&self) -> u32 {
        self.credits
    }

    /// Returns the seat limit.
    pub fn max_students(&self) -> u32 {
        self.max_students
    }

    /// Returns whether the course accepts enrollments.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the IDs of students on the roster.
    pub fn enrolled_students(&self) -> &BTreeSet<String> {
        &self.enrolled_students
    }

    /// Returns the number of students on the roster.
    pub fn enrolled_count(&self) -> usize {
        self.enrolled_students.len()
    }

    /// Returns `true` if no seat is left.
    pub fn is_full(&self) -> bool {
        self.enrolled_count() >= self.max_students as usize
    }

    /// Returns the number of free seats (zero when over capacity).
    pub fn seats_remaining(&self) -> usize {
        (self.max_students as usize).saturating_sub(self.enrolled_count())
    }

    /// Returns the version token.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Adds a student to the roster. Returns `false` if already present.
    pub fn add_student(&mut self, student_id: &str) -> bool {
        self.enrolled_students.insert(student_id.to_string())
    }

    /// Removes a student from the roster. Returns `false` if absent.
    pub fn remove_student(&mut self, student_id: &str) -> bool {
        self.enrolled_students.remove(student_id)
    }

    /// Captures the identity fields stored on an enrollment.
    pub fn snapshot(&self) -> CourseSnapshot {
        CourseSnapshot {
            course_id: self.id.clone(),
            code: self.code.clone(),
            title: self.title.clone(),
            credits: self.credits,
        }
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl TenantScoped for Course {
    fn institution_id(&self) -> &InstitutionId {
        &self.institution_id
    }

    fn resource_kind(&self) -> ResourceKind {
        ResourceKind::Course
    }

    fn resource_id(&self) -> &str {
        &self.id
    }
}
