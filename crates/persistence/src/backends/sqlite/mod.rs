//! SQLite backend implementation.
//!
//! This module provides a SQLite implementation of every storage trait. It
//! supports both in-memory databases (for tests) and file-based databases.
//!
//! # Features
//!
//! - In-memory and file-based modes
//! - Institution-scoped reads for students, courses and enrollments
//! - Optimistic transactions with `WHERE version = ?` compare-and-swap
//! - A partial unique index allowing one `enrolled` row per
//!   (institution, student, course, semester)
//! - Separate `access_audit` and `override_audit` tables
//!
//! # Example
//!
//! ```no_run
//! use registrar_persistence::backends::sqlite::SqliteBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::open("./data/registrar.db")?;
//! backend.init_schema()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE courses (
//!     institution_id TEXT NOT NULL,
//!     id TEXT NOT NULL,
//!     ...
//!     enrolled_students TEXT NOT NULL,  -- JSON array
//!     version INTEGER NOT NULL,
//!     PRIMARY KEY (institution_id, id)
//! );
//!
//! CREATE TABLE enrollments (
//!     id TEXT PRIMARY KEY,
//!     institution_id TEXT NOT NULL,
//!     student_id TEXT NOT NULL,
//!     course_id TEXT NOT NULL,
//!     semester TEXT NOT NULL,
//!     status TEXT NOT NULL,
//!     ...
//!     FOREIGN KEY (institution_id, student_id) REFERENCES students (institution_id, id),
//!     FOREIGN KEY (institution_id, course_id) REFERENCES courses (institution_id, id)
//! );
//!
//! CREATE UNIQUE INDEX enrollments_one_active
//!     ON enrollments (institution_id, student_id, course_id, semester)
//!     WHERE status = 'enrolled';
//! ```

mod audit;
mod backend;
mod schema;
mod storage;
mod transaction;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use schema::SCHEMA_VERSION;
pub use transaction::SqliteTransaction;
