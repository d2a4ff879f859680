//! Record types for the persistence layer.
//!
//! - [`Institution`] - A tenant and its lifecycle status
//! - [`Student`] - Per-institution academic profile with credit totals
//! - [`Course`] - Capacity-constrained roster with a version token
//! - [`Enrollment`] - Join record between a student and a course for a term
//!
//! Every tenant-owned record implements [`TenantScoped`], which lets access
//! checks compare a record's own institution against the caller's context
//! regardless of how the record was fetched.
//!
//! # Examples
//!
//! ```
//! use registrar_persistence::tenant::{InstitutionId, PrincipalId};
//! use registrar_persistence::types::{Course, Enrollment, EnrollmentStatus, Student, TenantScoped};
//!
//! let inst = InstitutionId::new("state-u");
//! let student = Student::new("s-1", inst.clone(), PrincipalId::new("user-1"), 18);
//! let course = Course::new("c-1", inst.clone(), "CS101", "Intro to CS", 4, 30);
//!
//! let enrollment = Enrollment::enrolled(&student, &course, "fall", "2026-2027");
//! assert_eq!(enrollment.status(), EnrollmentStatus::Enrolled);
//! assert_eq!(enrollment.credits(), 4);
//! assert_eq!(enrollment.institution_id(), &inst);
//! ```

mod course;
mod enrollment;
mod institution;
mod student;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tenant::InstitutionId;

pub use course::{Course, CourseSnapshot};
pub use enrollment::{Enrollment, EnrollmentStatus};
pub use institution::{Institution, InstitutionStatus};
pub use student::Student;

/// Kinds of records that carry an owning institution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// An institution (tenant) record.
    Institution,
    /// A student profile.
    Student,
    /// A course.
    Course,
    /// An enrollment row.
    Enrollment,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Institution => write!(f, "Institution"),
            ResourceKind::Student => write!(f, "Student"),
            ResourceKind::Course => write!(f, "Course"),
            ResourceKind::Enrollment => write!(f, "Enrollment"),
        }
    }
}

/// A record owned by exactly one institution.
pub trait TenantScoped {
    /// The institution that owns this record.
    fn institution_id(&self) -> &InstitutionId;

    /// The kind of record.
    fn resource_kind(&self) -> ResourceKind;

    /// The record's identifier.
    fn resource_id(&self) -> &str;
}
