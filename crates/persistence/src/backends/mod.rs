//! Storage backend implementations.
//!
//! Every backend implements [`DirectoryStorage`](crate::core::DirectoryStorage),
//! [`RecordStorage`](crate::core::RecordStorage),
//! [`TransactionProvider`](crate::core::TransactionProvider) and
//! [`AuditSink`](crate::core::AuditSink).
//!
//! # Available Backends
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Memory | always | Process-local maps behind one mutex, for tests and embedding |
//! | SQLite | `sqlite` | Embedded database with in-memory and file modes |
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! use registrar_persistence::backends::sqlite::SqliteBackend;
//!
//! # #[cfg(feature = "sqlite")]
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Create an in-memory SQLite backend
//! let backend = SqliteBackend::in_memory()?;
//! backend.init_schema()?;
//!
//! // Or use a file-based database
//! let backend = SqliteBackend::open("./data/registrar.db")?;
//! # Ok(())
//! # }
//! ```

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use crate::error::{StorageError, StorageResult, TenantError};
use crate::tenant::InstitutionId;
use crate::types::{Course, Enrollment, Student, TenantScoped};

/// A write held by a transaction until commit.
///
/// Each variant carries the record as read (its version is the expected
/// version for the compare-and-swap).
#[derive(Debug, Clone)]
pub(crate) enum StagedWrite {
    NewEnrollment(Enrollment),
    Enrollment(Enrollment),
    Student(Student),
    Course(Course),
}

impl StagedWrite {
    fn key(&self) -> (&'static str, &str) {
        match self {
            StagedWrite::NewEnrollment(e) | StagedWrite::Enrollment(e) => ("Enrollment", e.id()),
            StagedWrite::Student(s) => ("Student", s.id()),
            StagedWrite::Course(c) => ("Course", c.id()),
        }
    }
}

/// Staged writes of one transaction, in staging order.
#[derive(Debug, Default)]
pub(crate) struct WriteSet {
    writes: Vec<StagedWrite>,
}

impl WriteSet {
    /// Adds a write, replacing an earlier one for the same record.
    ///
    /// Rejects records owned by an institution other than `bound`.
    pub(crate) fn stage<R: TenantScoped>(
        &mut self,
        bound: &InstitutionId,
        record: &R,
        write: StagedWrite,
    ) -> StorageResult<()> {
        if record.institution_id() != bound {
            return Err(StorageError::Tenant(TenantError::CrossTenantWrite {
                transaction_institution: bound.clone(),
                record_institution: record.institution_id().clone(),
                resource_type: record.resource_kind().to_string(),
                resource_id: record.resource_id().to_string(),
            }));
        }

        let key = write.key();
        if let Some(existing) = self.writes.iter_mut().find(|w| w.key() == key) {
            *existing = write;
        } else {
            self.writes.push(write);
        }
        Ok(())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &StagedWrite> {
        self.writes.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.writes.len()
    }

    pub(crate) fn clear(&mut self) {
        self.writes.clear();
    }
}

/// Returns a copy of `record` with its version advanced past the one read.
pub(crate) fn next_version_of_student(student: &Student) -> Student {
    let mut next = student.clone();
    next.set_version(student.version() + 1);
    next
}

pub(crate) fn next_version_of_course(course: &Course) -> Course {
    let mut next = course.clone();
    next.set_version(course.version() + 1);
    next
}

pub(crate) fn next_version_of_enrollment(enrollment: &Enrollment) -> Enrollment {
    let mut next = enrollment.clone();
    next.set_version(enrollment.version() + 1);
    next
}
