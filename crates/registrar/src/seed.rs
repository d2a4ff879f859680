//! JSON seed documents for `registrar init --seed`.
//!
//! ```json
//! {
//!   "institutions": [{ "id": "state-u", "name": "State University", "status": "active" }],
//!   "memberships": [
//!     { "principal_id": "user-1", "institution_id": "state-u", "role": "student", "status": "active" }
//!   ],
//!   "students": [
//!     { "id": "s-1", "institution_id": "state-u", "principal_id": "user-1", "max_credits": 18 }
//!   ],
//!   "courses": [
//!     { "id": "cs101", "institution_id": "state-u", "code": "CS101", "title": "Intro",
//!       "credits": 4, "max_students": 30 }
//!   ]
//! }
//! ```

use std::path::Path;

use anyhow::Context;
use registrar_persistence::RecordStorage;
use registrar_persistence::tenant::Membership;
use registrar_persistence::types::{Course, Institution, Student};
use registrar_persistence::{InstitutionId, PrincipalId};
use serde::Deserialize;
use tracing::info;

/// Records to load into a fresh database.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedDocument {
    pub institutions: Vec<Institution>,
    pub memberships: Vec<Membership>,
    pub students: Vec<SeedStudent>,
    pub courses: Vec<SeedCourse>,
}

/// A student profile without enrollments.
#[derive(Debug, Deserialize)]
pub struct SeedStudent {
    pub id: String,
    pub institution_id: InstitutionId,
    pub principal_id: PrincipalId,
    pub max_credits: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// A course with an empty roster.
#[derive(Debug, Deserialize)]
pub struct SeedCourse {
    pub id: String,
    pub institution_id: InstitutionId,
    pub code: String,
    pub title: String,
    pub credits: u32,
    pub max_students: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Counts of loaded records.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub institutions: usize,
    pub memberships: usize,
    pub students: usize,
    pub courses: usize,
}

impl SeedDocument {
    /// Reads and parses a seed file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing seed file {}", path.display()))
    }

    /// Writes every record to `store`. Institutions go first so that
    /// memberships and profiles never reference a missing tenant.
    pub async fn load<S: RecordStorage>(self, store: &S) -> anyhow::Result<SeedSummary> {
        let mut summary = SeedSummary::default();

        for institution in self.institutions {
            store
                .put_institution(institution)
                .await
                .context("storing institution")?;
            summary.institutions += 1;
        }

        for membership in self.memberships {
            store
                .put_membership(membership)
                .await
                .context("storing membership")?;
            summary.memberships += 1;
        }

        for seed in self.students {
            let student = Student::new(seed.id, seed.institution_id, seed.principal_id, seed.max_credits)
                .with_active(seed.is_active);
            let id = student.id().to_string();
            store
                .create_student(student)
                .await
                .with_context(|| format!("creating student {}", id))?;
            summary.students += 1;
        }

        for seed in self.courses {
            let course = Course::new(
                seed.id,
                seed.institution_id,
                seed.code,
                seed.title,
                seed.credits,
                seed.max_students,
            )
            .with_active(seed.is_active);
            let id = course.id().to_string();
            store
                .create_course(course)
                .await
                .with_context(|| format!("creating course {}", id))?;
            summary.courses += 1;
        }

        info!(
            institutions = summary.institutions,
            memberships = summary.memberships,
            students = summary.students,
            courses = summary.courses,
            "seed loaded"
        );
        Ok(summary)
    }
}
