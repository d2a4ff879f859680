//! Tenant-isolated enrollment transactions.
//!
//! This crate sits on top of `registrar-persistence` and provides:
//!
//! - [`AccessValidator`] - decides and audits whether a principal may act in an
//!   institution, and re-checks ownership of every loaded record
//! - [`TenantContextManager`] - one active [`TenantContext`] per principal,
//!   with atomic institution switching
//! - [`EnrollmentEngine`] - enroll, drop and the administrative override
//!   variants, run as optimistic transactions under bounded retry
//! - [`EnrollmentError`] - the outcome taxonomy every caller matches on
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use registrar_enrollment::{EngineConfig, EnrollRequest, EnrollmentEngine, TracingAuditSink};
//! use registrar_persistence::backends::memory::MemoryStore;
//! use registrar_persistence::core::RecordStorage;
//! use registrar_persistence::tenant::{Membership, MembershipRole};
//! use registrar_persistence::types::{Course, Institution, Student};
//! use registrar_persistence::{InstitutionId, PrincipalId};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let inst = InstitutionId::new("state-u");
//! store.put_institution(Institution::active("state-u", "State University")).await?;
//! store.put_membership(Membership::active("user-1", "state-u", MembershipRole::Student)).await?;
//! store.create_student(Student::new("s-1", inst.clone(), PrincipalId::new("user-1"), 18)).await?;
//! store.create_course(Course::new("cs101", inst, "CS101", "Intro", 4, 30)).await?;
//!
//! let engine = EnrollmentEngine::new(store, Arc::new(TracingAuditSink), EngineConfig::default());
//! let enrollment = engine
//!     .enroll(&EnrollRequest::new("user-1", "state-u", "cs101", "fall", "2026"))
//!     .await?;
//! assert_eq!(enrollment.credits(), 4);
//! # Ok(())
//! # }
//! ```
//!
//! [`TenantContext`]: registrar_persistence::TenantContext

pub mod audit;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod retry;
pub mod validator;

pub use audit::{FanoutAuditSink, TracingAuditSink};
pub use config::{EngineConfig, RetryConfig};
pub use context::TenantContextManager;
pub use engine::{
    AdminEnrollRequest, AdminRemoveRequest, DropRequest, EnrollRequest, EnrollmentEngine,
    EnrollmentStore, OverrideOutcome,
};
pub use error::{ConflictKind, EnrollmentError, EnrollmentResult, ErrorKind};
pub use retry::{RetryError, RetryPolicy, Retryable, Sleeper, TokioSleeper, with_retry};
pub use validator::{AccessDecision, AccessRequest, AccessValidator, DenyReason, ResourceDecision};
