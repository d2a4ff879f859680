//! Core storage traits and abstractions.
//!
//! This module provides the foundational traits for the persistence layer:
//!
//! - [`DirectoryStorage`] - Institutions, memberships and record ownership
//! - [`RecordStorage`] - Committed-state reads and seeding
//! - [`TransactionProvider`] / [`Transaction`] - Optimistic multi-record writes
//! - [`AuditSink`] - Append-only access and override audit channels
//!
//! # Trait Hierarchy
//!
//! Backends implement all four; the enrollment engine only needs the
//! combination below.
//!
//! ```text
//! DirectoryStorage ─┐
//! RecordStorage ────┼── EnrollmentStore (enrollment crate)
//! TransactionProvider ┘
//!
//! AuditSink (independent; may be a different backend)
//! ```

pub mod audit;
pub mod storage;
pub mod transaction;

pub use audit::{AccessAction, AccessAuditRecord, AuditSink, OverrideAuditRecord};
pub use storage::{DirectoryStorage, RecordStorage};
pub use transaction::{Transaction, TransactionProvider};
