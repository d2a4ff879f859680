//! Transaction support for SQLite backend.
//!
//! Reads run on a pooled connection outside any SQL transaction. Writes are
//! staged and applied in [`commit`](Transaction::commit) inside one
//! `BEGIN IMMEDIATE` transaction, each update guarded by
//! `WHERE version = <expected>`. The whole commit runs without an `.await`, so
//! a cancelled caller either sees it complete or never start.

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::debug;

use crate::backends::{
    StagedWrite, WriteSet, next_version_of_course, next_version_of_enrollment,
    next_version_of_student,
};
use crate::core::{Transaction, TransactionProvider};
use crate::error::{
    BackendError, ConcurrencyError, ResourceError, StorageError, StorageResult, TransactionError,
};
use crate::tenant::{InstitutionId, PrincipalId};
use crate::types::{Course, Enrollment, Student, TenantScoped};

use super::SqliteBackend;
use super::storage::{
    ENROLLMENT_COLUMNS, STUDENT_COLUMNS, enrollment_from_row, is_constraint, query_course,
    query_student, student_from_row, to_json,
};

/// A SQLite transaction.
pub struct SqliteTransaction {
    pool: Pool<SqliteConnectionManager>,
    institution_id: InstitutionId,
    writes: WriteSet,
    active: bool,
}

impl std::fmt::Debug for SqliteTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTransaction")
            .field("institution_id", &self.institution_id)
            .field("staged", &self.writes.len())
            .field("active", &self.active)
            .finish()
    }
}

impl SqliteTransaction {
    fn ensure_active(&self) -> StorageResult<()> {
        if self.active {
            Ok(())
        } else {
            Err(StorageError::Transaction(
                TransactionError::InvalidTransaction,
            ))
        }
    }

    fn connection(&self) -> StorageResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.ensure_active()?;
        self.pool.get().map_err(|e| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: "sqlite".to_string(),
                message: e.to_string(),
            })
        })
    }
}

fn current_version(
    conn: &Connection,
    table: &str,
    key_sql: &str,
    key: &[&dyn rusqlite::ToSql],
) -> StorageResult<Option<u64>> {
    let sql = format!("SELECT version FROM {} WHERE {}", table, key_sql);
    let version: Option<i64> = conn.query_row(&sql, key, |row| row.get(0)).optional()?;
    Ok(version.map(|v| v as u64))
}

/// Turns a zero-row CAS update into the right error.
fn cas_failure(
    conn: &Connection,
    resource_type: &str,
    id: &str,
    expected: u64,
    table: &str,
    key_sql: &str,
    key: &[&dyn rusqlite::ToSql],
) -> StorageError {
    match current_version(conn, table, key_sql, key) {
        Ok(Some(actual)) => StorageError::Concurrency(ConcurrencyError::VersionConflict {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            expected_version: expected,
            actual_version: actual,
        }),
        Ok(None) => StorageError::Resource(ResourceError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }),
        Err(e) => e,
    }
}

fn apply_student(conn: &Connection, student: &Student) -> StorageResult<()> {
    let next = next_version_of_student(student);
    let changed = conn.execute(
        "UPDATE students
         SET total_credits = ?1, is_active = ?2, enrolled_courses = ?3, version = ?4
         WHERE institution_id = ?5 AND id = ?6 AND version = ?7",
        params![
            next.total_credits(),
            next.is_active(),
            to_json(next.enrolled_courses())?,
            next.version() as i64,
            student.institution_id().as_str(),
            student.id(),
            student.version() as i64
        ],
    )?;
    if changed == 0 {
        return Err(cas_failure(
            conn,
            "Student",
            student.id(),
            student.version(),
            "students",
            "institution_id = ?1 AND id = ?2",
            params![student.institution_id().as_str(), student.id()],
        ));
    }
    Ok(())
}

fn apply_course(conn: &Connection, course: &Course) -> StorageResult<()> {
    let next = next_version_of_course(course);
    let changed = conn.execute(
        "UPDATE courses
         SET is_active = ?1, enrolled_students = ?2, version = ?3
         WHERE institution_id = ?4 AND id = ?5 AND version = ?6",
        params![
            next.is_active(),
            to_json(next.enrolled_students())?,
            next.version() as i64,
            course.institution_id().as_str(),
            course.id(),
            course.version() as i64
        ],
    )?;
    if changed == 0 {
        return Err(cas_failure(
            conn,
            "Course",
            course.id(),
            course.version(),
            "courses",
            "institution_id = ?1 AND id = ?2",
            params![course.institution_id().as_str(), course.id()],
        ));
    }
    Ok(())
}

fn apply_enrollment_update(conn: &Connection, enrollment: &Enrollment) -> StorageResult<()> {
    let next = next_version_of_enrollment(enrollment);
    let changed = conn.execute(
        "UPDATE enrollments
         SET status = ?1, dropped_at = ?2, version = ?3
         WHERE id = ?4 AND version = ?5",
        params![
            next.status().to_string(),
            next.dropped_at().map(|t| t.to_rfc3339()),
            next.version() as i64,
            enrollment.id(),
            enrollment.version() as i64
        ],
    )?;
    if changed == 0 {
        return Err(cas_failure(
            conn,
            "Enrollment",
            enrollment.id(),
            enrollment.version(),
            "enrollments",
            "id = ?1",
            params![enrollment.id()],
        ));
    }
    Ok(())
}

fn apply_enrollment_insert(conn: &Connection, enrollment: &Enrollment) -> StorageResult<()> {
    let next = next_version_of_enrollment(enrollment);
    let result = conn.execute(
        "INSERT INTO enrollments (id, institution_id, student_id, course_id, semester,
                                  academic_year, status, credits, course_snapshot,
                                  enrolled_at, dropped_at, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            next.id(),
            next.institution_id().as_str(),
            next.student_id(),
            next.course_id(),
            next.semester(),
            next.academic_year(),
            next.status().to_string(),
            next.credits(),
            to_json(next.course_snapshot())?,
            next.enrolled_at().to_rfc3339(),
            next.dropped_at().map(|t| t.to_rfc3339()),
            next.version() as i64
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) => {
            Err(StorageError::Resource(ResourceError::UniqueViolation {
                constraint: "enrollments_one_active".to_string(),
                key: format!(
                    "{}/{}/{}",
                    enrollment.student_id(),
                    enrollment.course_id(),
                    enrollment.semester()
                ),
            }))
        }
        Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) => {
            Err(StorageError::Resource(ResourceError::AlreadyExists {
                resource_type: "Enrollment".to_string(),
                id: enrollment.id().to_string(),
            }))
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    fn institution_id(&self) -> &InstitutionId {
        &self.institution_id
    }

    async fn read_student(&mut self, id: &str) -> StorageResult<Option<Student>> {
        let conn = self.connection()?;
        query_student(&conn, &self.institution_id, id)
    }

    async fn read_student_for_principal(
        &mut self,
        principal_id: &PrincipalId,
    ) -> StorageResult<Option<Student>> {
        let conn = self.connection()?;
        let sql = format!(
            "SELECT {} FROM students WHERE institution_id = ?1 AND principal_id = ?2",
            STUDENT_COLUMNS
        );
        Ok(conn
            .query_row(
                &sql,
                params![self.institution_id.as_str(), principal_id.as_str()],
                student_from_row,
            )
            .optional()?)
    }

    async fn read_course(&mut self, id: &str) -> StorageResult<Option<Course>> {
        let conn = self.connection()?;
        query_course(&conn, &self.institution_id, id)
    }

    async fn find_active_enrollment(
        &mut self,
        student_id: &str,
        course_id: &str,
        semester: Option<&str>,
    ) -> StorageResult<Option<Enrollment>> {
        let conn = self.connection()?;
        let sql = format!(
            "SELECT {} FROM enrollments
             WHERE institution_id = ?1 AND student_id = ?2 AND course_id = ?3
               AND status = 'enrolled' AND (?4 IS NULL OR semester = ?4)
             ORDER BY rowid DESC LIMIT 1",
            ENROLLMENT_COLUMNS
        );
        Ok(conn
            .query_row(
                &sql,
                params![self.institution_id.as_str(), student_id, course_id, semester],
                enrollment_from_row,
            )
            .optional()?)
    }

    async fn count_active_enrollments(
        &mut self,
        student_id: &str,
        course_id: &str,
    ) -> StorageResult<usize> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM enrollments
             WHERE institution_id = ?1 AND student_id = ?2 AND course_id = ?3
               AND status = 'enrolled'",
            params![self.institution_id.as_str(), student_id, course_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
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
        let mut conn = self.connection()?;
        self.active = false;

        // Dropping `tx` on any early return rolls the SQL transaction back.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| {
                StorageError::Transaction(TransactionError::RolledBack {
                    reason: format!("Failed to begin transaction: {}", e),
                })
            })?;

        // Updates before inserts so a drop staged with a re-enroll frees its slot first.
        for write in self.writes.iter() {
            match write {
                StagedWrite::Student(s) => apply_student(&tx, s)?,
                StagedWrite::Course(c) => apply_course(&tx, c)?,
                StagedWrite::Enrollment(e) => apply_enrollment_update(&tx, e)?,
                StagedWrite::NewEnrollment(_) => {}
            }
        }
        for write in self.writes.iter() {
            if let StagedWrite::NewEnrollment(e) = write {
                apply_enrollment_insert(&tx, e)?;
            }
        }

        tx.commit().map_err(|e| {
            StorageError::Transaction(TransactionError::RolledBack {
                reason: format!("Failed to commit transaction: {}", e),
            })
        })?;

        debug!(
            institution = %self.institution_id,
            writes = self.writes.len(),
            "sqlite transaction committed"
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
impl TransactionProvider for SqliteBackend {
    type Transaction = SqliteTransaction;

    async fn begin_transaction(
        &self,
        institution_id: &InstitutionId,
    ) -> StorageResult<Self::Transaction> {
        Ok(SqliteTransaction {
            pool: self.pool().clone(),
            institution_id: institution_id.clone(),
            writes: WriteSet::default(),
            active: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RecordStorage;

    async fn seeded() -> (SqliteBackend, InstitutionId) {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();
        let inst = InstitutionId::new("inst-a");
        backend
            .create_student(Student::new("s-1", inst.clone(), PrincipalId::new("u-1"), 18))
            .await
            .unwrap();
        backend
            .create_course(Course::new("c-1", inst.clone(), "CS101", "Intro", 4, 10))
            .await
            .unwrap();
        (backend, inst)
    }

    #[tokio::test]
    async fn test_commit_bumps_versions() {
        let (backend, inst) = seeded().await;
        let mut tx = backend.begin_transaction(&inst).await.unwrap();
        let mut student = tx.read_student("s-1").await.unwrap().unwrap();
        let mut course = tx.read_course("c-1").await.unwrap().unwrap();
        let enrollment = Enrollment::enrolled(&student, &course, "fall", "2026-2027");
        student.add_course(course.id(), course.credits());
        course.add_student(student.id());

        tx.stage_new_enrollment(&enrollment).await.unwrap();
        tx.stage_student(&student).await.unwrap();
        tx.stage_course(&course).await.unwrap();
        Box::new(tx).commit().await.unwrap();

        let student = backend.read_student(&inst, "s-1").await.unwrap().unwrap();
        assert_eq!(student.version(), 2);
        assert_eq!(student.total_credits(), 4);
        let course = backend.read_course(&inst, "c-1").await.unwrap().unwrap();
        assert_eq!(course.version(), 2);
        assert!(course.enrolled_students().contains("s-1"));

        let rows = backend.enrollments_for_course(&inst, "c-1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].version(), 1);
        assert_eq!(rows[0].institution_id(), &inst);
        assert_eq!(rows[0].course_snapshot().code, "CS101");
    }

    #[tokio::test]
    async fn test_stale_write_is_version_conflict_and_rolls_back() {
        let (backend, inst) = seeded().await;

        let mut first = backend.begin_transaction(&inst).await.unwrap();
        let mut second = backend.begin_transaction(&inst).await.unwrap();
        let c1 = first.read_course("c-1").await.unwrap().unwrap();
        let s2 = second.read_student("s-1").await.unwrap().unwrap();
        let c2 = second.read_course("c-1").await.unwrap().unwrap();

        first.stage_course(&c1).await.unwrap();
        Box::new(first).commit().await.unwrap();

        let mut s2 = s2;
        s2.add_course("c-1", 4);
        second.stage_student(&s2).await.unwrap();
        second.stage_course(&c2).await.unwrap();
        let err = Box::new(second).commit().await.unwrap_err();
        assert!(err.is_version_conflict(), "unexpected error: {err}");

        // The student update ran before the course CAS failed; it must be undone.
        let student = backend.read_student(&inst, "s-1").await.unwrap().unwrap();
        assert_eq!(student.version(), 1);
        assert_eq!(student.total_credits(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_active_enrollment_is_unique_violation() {
        let (backend, inst) = seeded().await;
        let student = backend.read_student(&inst, "s-1").await.unwrap().unwrap();
        let course = backend.read_course(&inst, "c-1").await.unwrap().unwrap();

        let mut tx = backend.begin_transaction(&inst).await.unwrap();
        tx.stage_new_enrollment(&Enrollment::enrolled(&student, &course, "fall", "2026"))
            .await
            .unwrap();
        Box::new(tx).commit().await.unwrap();

        let mut tx = backend.begin_transaction(&inst).await.unwrap();
        tx.stage_new_enrollment(&Enrollment::enrolled(&student, &course, "fall", "2026"))
            .await
            .unwrap();
        let err = Box::new(tx).commit().await.unwrap_err();
        assert!(err.is_unique_violation());

        // Another semester is a different slot.
        let mut tx = backend.begin_transaction(&inst).await.unwrap();
        tx.stage_new_enrollment(&Enrollment::enrolled(&student, &course, "spring", "2026"))
            .await
            .unwrap();
        Box::new(tx).commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_find_active_enrollment_without_semester_returns_latest() {
        let (backend, inst) = seeded().await;
        let student = backend.read_student(&inst, "s-1").await.unwrap().unwrap();
        let course = backend.read_course(&inst, "c-1").await.unwrap().unwrap();

        for semester in ["fall", "spring"] {
            let mut tx = backend.begin_transaction(&inst).await.unwrap();
            tx.stage_new_enrollment(&Enrollment::enrolled(&student, &course, semester, "2026"))
                .await
                .unwrap();
            Box::new(tx).commit().await.unwrap();
        }

        let mut tx = backend.begin_transaction(&inst).await.unwrap();
        let latest = tx
            .find_active_enrollment("s-1", "c-1", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.semester(), "spring");
        let fall = tx
            .find_active_enrollment("s-1", "c-1", Some("fall"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fall.semester(), "fall");
        assert_eq!(tx.count_active_enrollments("s-1", "c-1").await.unwrap(), 2);
        assert_eq!(tx.count_active_enrollments("s-1", "c-9").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cross_institution_stage_is_rejected() {
        let (backend, inst) = seeded().await;
        let other = InstitutionId::new("inst-b");
        let foreign = Course::new("c-1", other.clone(), "CS101", "Intro", 4, 10);

        let mut tx = backend.begin_transaction(&inst).await.unwrap();
        let err = tx.stage_course(&foreign).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Tenant(crate::error::TenantError::CrossTenantWrite { .. })
        ));
    }
}
