//! Directory and record storage for the SQLite backend.

use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::core::{DirectoryStorage, RecordStorage};
use crate::error::{ResourceError, StorageError, StorageResult, ValidationError};
use crate::tenant::{InstitutionId, Membership, PrincipalId};
use crate::types::{Course, CourseSnapshot, Enrollment, Institution, Student, TenantScoped};

use super::SqliteBackend;

pub(crate) const STUDENT_COLUMNS: &str = "institution_id, id, principal_id, total_credits, \
     max_credits, is_active, enrolled_courses, version";

pub(crate) const COURSE_COLUMNS: &str = "institution_id, id, code, title, credits, \
     max_students, is_active, enrolled_students, version";

pub(crate) const ENROLLMENT_COLUMNS: &str = "id, institution_id, student_id, course_id, \
     semester, academic_year, status, credits, course_snapshot, enrolled_at, dropped_at, version";

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_column<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| conversion_error(idx, e))
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

pub(crate) fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    let version: i64 = row.get(7)?;
    Ok(Student::from_storage(
        row.get::<_, String>(1)?,
        InstitutionId::new(row.get::<_, String>(0)?),
        PrincipalId::new(row.get::<_, String>(2)?),
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        json_column::<BTreeSet<String>>(row, 6)?,
        version as u64,
    ))
}

pub(crate) fn course_from_row(row: &Row<'_>) -> rusqlite::Result<Course> {
    let version: i64 = row.get(8)?;
    Ok(Course::from_storage(
        row.get::<_, String>(1)?,
        InstitutionId::new(row.get::<_, String>(0)?),
        row.get::<_, String>(2)?,
        row.get::<_, String>(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        json_column::<BTreeSet<String>>(row, 7)?,
        version as u64,
    ))
}

pub(crate) fn enrollment_from_row(row: &Row<'_>) -> rusqlite::Result<Enrollment> {
    let version: i64 = row.get(11)?;
    let enrolled_at = timestamp_column(row, 9)?
        .ok_or_else(|| conversion_error(9, "enrolled_at is null".to_string()))?;
    Ok(Enrollment::from_storage(
        row.get::<_, String>(0)?,
        InstitutionId::new(row.get::<_, String>(1)?),
        row.get::<_, String>(2)?,
        row.get::<_, String>(3)?,
        row.get::<_, String>(4)?,
        row.get::<_, String>(5)?,
        parse_column(row, 6)?,
        row.get(7)?,
        json_column::<CourseSnapshot>(row, 8)?,
        enrolled_at,
        timestamp_column(row, 10)?,
        version as u64,
    ))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> StorageResult<String> {
    Ok(serde_json::to_string(value)?)
}

pub(crate) fn query_student(
    conn: &Connection,
    institution_id: &InstitutionId,
    id: &str,
) -> StorageResult<Option<Student>> {
    let sql = format!(
        "SELECT {} FROM students WHERE institution_id = ?1 AND id = ?2",
        STUDENT_COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![institution_id.as_str(), id], student_from_row)
        .optional()?)
}

pub(crate) fn query_course(
    conn: &Connection,
    institution_id: &InstitutionId,
    id: &str,
) -> StorageResult<Option<Course>> {
    let sql = format!(
        "SELECT {} FROM courses WHERE institution_id = ?1 AND id = ?2",
        COURSE_COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![institution_id.as_str(), id], course_from_row)
        .optional()?)
}

fn query_enrollments(
    conn: &Connection,
    institution_id: &InstitutionId,
    column: &str,
    value: &str,
) -> StorageResult<Vec<Enrollment>> {
    let sql = format!(
        "SELECT {} FROM enrollments WHERE institution_id = ?1 AND {} = ?2 ORDER BY rowid",
        ENROLLMENT_COLUMNS, column
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![institution_id.as_str(), value], enrollment_from_row)?;
    let mut enrollments = Vec::new();
    for row in rows {
        enrollments.push(row?);
    }
    Ok(enrollments)
}

/// Returns `true` if `err` is a constraint failure with the given extended code.
pub(crate) fn is_constraint(err: &rusqlite::Error, extended_code: std::os::raw::c_int) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == extended_code
    )
}

#[async_trait]
impl DirectoryStorage for SqliteBackend {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn institution(&self, id: &InstitutionId) -> StorageResult<Option<Institution>> {
        let conn = self.get_connection()?;
        Ok(conn
            .query_row(
                "SELECT id, name, status FROM institutions WHERE id = ?1",
                params![id.as_str()],
                |row| {
                    Ok(Institution {
                        id: InstitutionId::new(row.get::<_, String>(0)?),
                        name: row.get(1)?,
                        status: parse_column(row, 2)?,
                    })
                },
            )
            .optional()?)
    }

    async fn membership(
        &self,
        principal_id: &PrincipalId,
        institution_id: &InstitutionId,
    ) -> StorageResult<Option<Membership>> {
        let conn = self.get_connection()?;
        Ok(conn
            .query_row(
                "SELECT role, status FROM memberships WHERE principal_id = ?1 AND institution_id = ?2",
                params![principal_id.as_str(), institution_id.as_str()],
                |row| {
                    Ok(Membership {
                        principal_id: principal_id.clone(),
                        institution_id: institution_id.clone(),
                        role: parse_column(row, 0)?,
                        status: parse_column(row, 1)?,
                    })
                },
            )
            .optional()?)
    }

    async fn course_owner(&self, course_id: &str) -> StorageResult<Option<InstitutionId>> {
        let conn = self.get_connection()?;
        let owner: Option<String> = conn
            .query_row(
                "SELECT institution_id FROM courses WHERE id = ?1 ORDER BY institution_id LIMIT 1",
                params![course_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner.map(InstitutionId::new))
    }
}

#[async_trait]
impl RecordStorage for SqliteBackend {
    async fn put_institution(&self, institution: Institution) -> StorageResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO institutions (id, name, status) VALUES (?1, ?2, ?3)
             ON CONFLICT (id) DO UPDATE SET name = excluded.name, status = excluded.status",
            params![
                institution.id.as_str(),
                institution.name,
                institution.status.to_string()
            ],
        )?;
        Ok(())
    }

    async fn put_membership(&self, membership: Membership) -> StorageResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO memberships (principal_id, institution_id, role, status)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (principal_id, institution_id)
             DO UPDATE SET role = excluded.role, status = excluded.status",
            params![
                membership.principal_id.as_str(),
                membership.institution_id.as_str(),
                membership.role.to_string(),
                membership.status.to_string()
            ],
        )?;
        Ok(())
    }

    async fn create_student(&self, student: Student) -> StorageResult<Student> {
        let conn = self.get_connection()?;
        let courses = to_json(student.enrolled_courses())?;
        let result = conn.execute(
            "INSERT INTO students (institution_id, id, principal_id, total_credits, max_credits,
                                   is_active, enrolled_courses, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
            params![
                student.institution_id().as_str(),
                student.id(),
                student.principal_id().as_str(),
                student.total_credits(),
                student.max_credits(),
                student.is_active(),
                courses
            ],
        );

        match result {
            Ok(_) => {}
            Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) => {
                return Err(StorageError::Resource(ResourceError::AlreadyExists {
                    resource_type: "Student".to_string(),
                    id: student.id().to_string(),
                }));
            }
            Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) => {
                return Err(StorageError::Validation(ValidationError::InvalidRecord {
                    resource_type: "Student".to_string(),
                    message: format!(
                        "principal {} already has a profile in {}",
                        student.principal_id(),
                        student.institution_id()
                    ),
                }));
            }
            Err(e) => return Err(e.into()),
        }

        let mut stored = student;
        stored.set_version(1);
        Ok(stored)
    }

    async fn create_course(&self, course: Course) -> StorageResult<Course> {
        let conn = self.get_connection()?;
        let roster = to_json(course.enrolled_students())?;
        let result = conn.execute(
            "INSERT INTO courses (institution_id, id, code, title, credits, max_students,
                                  is_active, enrolled_students, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)",
            params![
                course.institution_id().as_str(),
                course.id(),
                course.code(),
                course.title(),
                course.credits(),
                course.max_students(),
                course.is_active(),
                roster
            ],
        );

        match result {
            Ok(_) => {}
            Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) => {
                return Err(StorageError::Resource(ResourceError::AlreadyExists {
                    resource_type: "Course".to_string(),
                    id: course.id().to_string(),
                }));
            }
            Err(e) => return Err(e.into()),
        }

        let mut stored = course;
        stored.set_version(1);
        Ok(stored)
    }

    async fn read_student(
        &self,
        institution_id: &InstitutionId,
        id: &str,
    ) -> StorageResult<Option<Student>> {
        let conn = self.get_connection()?;
        query_student(&conn, institution_id, id)
    }

    async fn read_course(
        &self,
        institution_id: &InstitutionId,
        id: &str,
    ) -> StorageResult<Option<Course>> {
        let conn = self.get_connection()?;
        query_course(&conn, institution_id, id)
    }

    async fn enrollments_for_student(
        &self,
        institution_id: &InstitutionId,
        student_id: &str,
    ) -> StorageResult<Vec<Enrollment>> {
        let conn = self.get_connection()?;
        query_enrollments(&conn, institution_id, "student_id", student_id)
    }

    async fn enrollments_for_course(
        &self,
        institution_id: &InstitutionId,
        course_id: &str,
    ) -> StorageResult<Vec<Enrollment>> {
        let conn = self.get_connection()?;
        query_enrollments(&conn, institution_id, "course_id", course_id)
    }
}
