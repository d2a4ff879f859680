//! Registrar Persistence Layer
//!
//! This crate stores the records of a multi-institution academic-records
//! backend: institutions (tenants), memberships, student profiles, courses,
//! enrollments and audit trails. Every record is owned by exactly one
//! institution and every read is scoped to one.
//!
//! # Features
//!
//! - **Tenant scoping**: reads take an [`InstitutionId`](tenant::InstitutionId);
//!   transactions are bound to one institution and refuse foreign writes
//! - **Optimistic concurrency**: Student, Course and Enrollment carry a
//!   version token checked by compare-and-swap at commit
//! - **Distinguishable failures**: stale writes surface as
//!   `ConcurrencyError::VersionConflict`, duplicate active enrollments as
//!   `ResourceError::UniqueViolation`
//! - **Audit channels**: access decisions and administrative overrides are
//!   written to separate sinks
//!
//! # Backend Features
//!
//! - `memory` (always built) - process-local store for tests and embedding
//! - `sqlite` (default) - SQLite with in-memory and file modes
//!
//! # Architecture
//!
//! - [`tenant`] - Institution and principal identity, memberships, [`TenantContext`]
//! - [`types`] - Academic record types
//! - [`error`] - Error types for all operations
//! - [`core`] - Storage, transaction and audit traits
//! - [`backends`] - Backend implementations
//!
//! # Quick Start
//!
//! ```
//! use registrar_persistence::backends::memory::MemoryStore;
//! use registrar_persistence::core::{DirectoryStorage, RecordStorage};
//! use registrar_persistence::tenant::{InstitutionId, Membership, MembershipRole, PrincipalId};
//! use registrar_persistence::types::Institution;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! store.put_institution(Institution::active("state-u", "State University")).await?;
//! store
//!     .put_membership(Membership::active("user-1", "state-u", MembershipRole::Student))
//!     .await?;
//!
//! let membership = store
//!     .membership(&PrincipalId::new("user-1"), &InstitutionId::new("state-u"))
//!     .await?;
//! assert!(membership.is_some_and(|m| m.is_active()));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod core;
pub mod error;
pub mod tenant;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{StorageError, StorageResult};
pub use tenant::{InstitutionId, PrincipalId, TenantContext};

// Re-export core traits
pub use core::{AuditSink, DirectoryStorage, RecordStorage, Transaction, TransactionProvider};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
