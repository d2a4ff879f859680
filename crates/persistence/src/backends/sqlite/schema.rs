//! SQLite schema definitions and migrations.

use rusqlite::Connection;

use crate::error::{BackendError, StorageError, StorageResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

fn migration_error(what: &str, e: rusqlite::Error) -> StorageError {
    StorageError::Backend(BackendError::MigrationError {
        message: format!("Failed to {}: {}", what, e),
    })
}

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, 1)?;
        migrate_schema(conn, 1)?;
    } else if current_version < SCHEMA_VERSION {
        migrate_schema(conn, current_version)?;
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> StorageResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| migration_error("create schema_version table", e))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> StorageResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| migration_error("clear schema_version", e))?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )
    .map_err(|e| migration_error("set schema_version", e))?;
    Ok(())
}

/// Tenancy and academic record tables.
///
/// Enrollment foreign keys are composite on `(institution_id, ...)`, so a row
/// can only reference a student and a course of its own institution.
fn create_schema_v1(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS institutions (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            status TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS memberships (
            principal_id TEXT NOT NULL,
            institution_id TEXT NOT NULL,
            role TEXT NOT NULL,
            status TEXT NOT NULL,
            PRIMARY KEY (principal_id, institution_id)
        );

        CREATE TABLE IF NOT EXISTS students (
            institution_id TEXT NOT NULL,
            id TEXT NOT NULL,
            principal_id TEXT NOT NULL,
            total_credits INTEGER NOT NULL,
            max_credits INTEGER NOT NULL,
            is_active INTEGER NOT NULL,
            enrolled_courses TEXT NOT NULL,
            version INTEGER NOT NULL,
            PRIMARY KEY (institution_id, id),
            UNIQUE (institution_id, principal_id)
        );

        CREATE TABLE IF NOT EXISTS courses (
            institution_id TEXT NOT NULL,
            id TEXT NOT NULL,
            code TEXT NOT NULL,
            title TEXT NOT NULL,
            credits INTEGER NOT NULL,
            max_students INTEGER NOT NULL,
            is_active INTEGER NOT NULL,
            enrolled_students TEXT NOT NULL,
            version INTEGER NOT NULL,
            PRIMARY KEY (institution_id, id)
        );

        CREATE INDEX IF NOT EXISTS idx_courses_id ON courses (id);

        CREATE TABLE IF NOT EXISTS enrollments (
            id TEXT PRIMARY KEY,
            institution_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            semester TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            status TEXT NOT NULL,
            credits INTEGER NOT NULL,
            course_snapshot TEXT NOT NULL,
            enrolled_at TEXT NOT NULL,
            dropped_at TEXT,
            version INTEGER NOT NULL,
            FOREIGN KEY (institution_id, student_id) REFERENCES students (institution_id, id),
            FOREIGN KEY (institution_id, course_id) REFERENCES courses (institution_id, id)
        );

        CREATE UNIQUE INDEX IF NOT EXISTS enrollments_one_active
            ON enrollments (institution_id, student_id, course_id, semester)
            WHERE status = 'enrolled';

        CREATE INDEX IF NOT EXISTS idx_enrollments_course
            ON enrollments (institution_id, course_id);",
    )
    .map_err(|e| migration_error("create record tables", e))
}

/// Run migrations from the given version to the current version.
fn migrate_schema(conn: &Connection, from_version: i32) -> StorageResult<()> {
    let mut version = from_version;

    while version < SCHEMA_VERSION {
        match version {
            1 => migrate_v1_to_v2(conn)?,
            _ => {
                return Err(StorageError::Backend(BackendError::MigrationError {
                    message: format!("no migration from schema version {}", version),
                }));
            }
        }
        version += 1;
        set_schema_version(conn, version)?;
    }

    Ok(())
}

/// v2: separate audit tables for access decisions and administrative overrides.
fn migrate_v1_to_v2(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS access_audit (
            id TEXT PRIMARY KEY,
            timestamp TEXT NOT NULL,
            principal_id TEXT NOT NULL,
            target_institution_id TEXT NOT NULL,
            action TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_id TEXT,
            allowed INTEGER NOT NULL,
            reason TEXT,
            correlation_id TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_access_audit_institution
            ON access_audit (target_institution_id, timestamp);

        CREATE TABLE IF NOT EXISTS override_audit (
            id TEXT PRIMARY KEY,
            timestamp TEXT NOT NULL,
            principal_id TEXT NOT NULL,
            institution_id TEXT NOT NULL,
            action TEXT NOT NULL,
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            enrollment_id TEXT NOT NULL,
            was_over_capacity INTEGER NOT NULL,
            enrolled_count INTEGER NOT NULL,
            max_students INTEGER NOT NULL,
            correlation_id TEXT
        );",
    )
    .map_err(|e| migration_error("create audit tables", e))
}
