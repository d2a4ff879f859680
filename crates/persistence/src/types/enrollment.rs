//! Enrollment records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Course, CourseSnapshot, ResourceKind, Student, TenantScoped};
use crate::tenant::InstitutionId;

/// Lifecycle status of an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    /// Holding a seat.
    Enrolled,
    /// Withdrawn; the seat was released.
    Dropped,
    /// Finished the course.
    Completed,
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrollmentStatus::Enrolled => write!(f, "enrolled"),
            EnrollmentStatus::Dropped => write!(f, "dropped"),
            EnrollmentStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for EnrollmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enrolled" => Ok(EnrollmentStatus::Enrolled),
            "dropped" => Ok(EnrollmentStatus::Dropped),
            "completed" => Ok(EnrollmentStatus::Completed),
            other => Err(format!("unknown enrollment status: {}", other)),
        }
    }
}

/// A student's seat in a course for one semester.
///
/// At most one `Enrolled` row may exist per
/// `(institution, student, course, semester)`; the store enforces this at
/// commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    id: String,
    institution_id: InstitutionId,
    student_id: String,
    course_id: String,
    semester: String,
    academic_year: String,
    status: EnrollmentStatus,
    credits: u32,
    course_snapshot: CourseSnapshot,
    enrolled_at: DateTime<Utc>,
    dropped_at: Option<DateTime<Utc>>,
    version: u64,
}

impl Enrollment {
    /// Creates a new `Enrolled` row for `student` in `course`.
    ///
    /// The institution is taken from the course; callers have already checked
    /// that student and course share it.
    pub fn enrolled(
        student: &Student,
        course: &Course,
        semester: impl Into<String>,
        academic_year: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            institution_id: course.institution_id().clone(),
            student_id: student.id().to_string(),
            course_id: course.id().to_string(),
            semester: semester.into(),
            academic_year: academic_year.into(),
            status: EnrollmentStatus::Enrolled,
            credits: course.credits(),
            course_snapshot: course.snapshot(),
            enrolled_at: Utc::now(),
            dropped_at: None,
            version: 0,
        }
    }

    /// Rebuilds an enrollment from persisted columns.
    #[allow(clippy::too_many_arguments)]
    pub fn from_storage(
        id: impl Into<String>,
        institution_id: InstitutionId,
        student_id: impl Into<String>,
        course_id: impl Into<String>,
        semester: impl Into<String>,
        academic_year: impl Into<String>,
        status: EnrollmentStatus,
        credits: u32,
        course_snapshot: CourseSnapshot,
        enrolled_at: DateTime<Utc>,
        dropped_at: Option<DateTime<Utc>>,
        version: u64,
    ) -> Self {
        Self {
            id: id.into(),
            institution_id,
            student_id: student_id.into(),
            course_id: course_id.into(),
            semester: semester.into(),
            academic_year: academic_year.into(),
            status,
            credits,
            course_snapshot,
            enrolled_at,
            dropped_at,
            version,
        }
    }

    /// Returns the enrollment ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the student ID.
    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    /// Returns the course ID.
    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    /// Returns the semester label.
    pub fn semester(&self) -> &str {
        &self.semester
    }

    /// Returns the academic year label.
    pub fn academic_year(&self) -> &str {
        &self.academic_year
    }

    /// Returns the status.
    pub fn status(&self) -> EnrollmentStatus {
        self.status
    }

    /// Returns `true` while the row holds a seat.
    pub fn is_enrolled(&self) -> bool {
        self.status == EnrollmentStatus::Enrolled
    }

    /// Returns the credits granted by this enrollment.
    pub fn credits(&self) -> u32 {
        self.credits
    }

    /// Returns the course identity captured at enrollment time.
    pub fn course_snapshot(&self) -> &CourseSnapshot {
        &self.course_snapshot
    }

    /// Returns when the seat was taken.
    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }

    /// Returns when the seat was released, if it was.
    pub fn dropped_at(&self) -> Option<DateTime<Utc>> {
        self.dropped_at
    }

    /// Returns the version token.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Marks the row dropped at the current time.
    pub fn mark_dropped(&mut self) {
        self.status = EnrollmentStatus::Dropped;
        self.dropped_at = Some(Utc::now());
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl TenantScoped for Enrollment {
    fn institution_id(&self) -> &InstitutionId {
        &self.institution_id
    }

    fn resource_kind(&self) -> ResourceKind {
        ResourceKind::Enrollment
    }

    fn resource_id(&self) -> &str {
        &self.id
    }
}
