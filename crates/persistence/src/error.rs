//! Error types for the persistence layer.
//!
//! This module defines all error types used throughout the persistence layer,
//! following a hierarchy that separates record-state errors, concurrency
//! errors, tenant errors, validation errors, transaction errors and backend
//! errors. Optimistic-lock failures and duplicate-key failures each have their
//! own variant so callers can react to them without inspecting messages.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::tenant::{InstitutionId, PrincipalId};

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Record state errors
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Concurrency and versioning errors
    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    /// Tenant isolation errors
    #[error(transparent)]
    Tenant(#[from] TenantError),

    /// Validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Transaction errors
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StorageError {
    /// Returns `true` if this is an optimistic-lock version conflict.
    pub fn is_version_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::Concurrency(ConcurrencyError::VersionConflict { .. })
        )
    }

    /// Returns `true` if this is a unique-constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Resource(ResourceError::UniqueViolation { .. })
        )
    }
}

/// Errors related to record state.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The requested record was not found.
    #[error("record not found: {resource_type}/{id}")]
    NotFound { resource_type: String, id: String },

    /// A record with the given ID already exists.
    #[error("record already exists: {resource_type}/{id}")]
    AlreadyExists { resource_type: String, id: String },

    /// A uniqueness constraint rejected the write.
    #[error("unique constraint {constraint} violated by {key}")]
    UniqueViolation { constraint: String, key: String },
}

/// Errors related to concurrency control.
#[derive(Error, Debug)]
pub enum ConcurrencyError {
    /// Version conflict detected during optimistic locking.
    #[error(
        "version conflict on {resource_type}/{id}: expected {expected_version}, found {actual_version}"
    )]
    VersionConflict {
        resource_type: String,
        id: String,
        expected_version: u64,
        actual_version: u64,
    },
}

/// Errors related to tenant isolation.
#[derive(Error, Debug)]
pub enum TenantError {
    /// Access to a record denied for the current institution.
    #[error(
        "access denied: institution {institution_id} cannot access {resource_type}/{resource_id}"
    )]
    AccessDenied {
        institution_id: InstitutionId,
        resource_type: String,
        resource_id: String,
    },

    /// The principal holds no usable membership in the institution.
    #[error("principal {principal_id} has no active membership in {institution_id}")]
    NoMembership {
        principal_id: PrincipalId,
        institution_id: InstitutionId,
    },

    /// Institution is suspended or inactive and cannot be acted in.
    #[error("institution {institution_id} is {status}")]
    InstitutionUnavailable {
        institution_id: InstitutionId,
        status: String,
    },

    /// A transaction bound to one institution tried to write another's record.
    #[error(
        "cross-institution write: transaction for {transaction_institution} staged {resource_type}/{resource_id} owned by {record_institution}"
    )]
    CrossTenantWrite {
        transaction_institution: InstitutionId,
        record_institution: InstitutionId,
        resource_type: String,
        resource_id: String,
    },
}

/// Errors related to record validation.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The record failed validation.
    #[error("invalid {resource_type}: {message}")]
    InvalidRecord {
        resource_type: String,
        message: String,
    },

    /// Missing required field.
    #[error("missing required field: {field}")]
    MissingRequiredField { field: String },
}

/// Errors related to transactions.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// Transaction was rolled back.
    #[error("transaction rolled back: {reason}")]
    RolledBack { reason: String },

    /// Transaction is no longer valid (already committed or rolled back).
    #[error("transaction no longer valid")]
    InvalidTransaction,
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Errors raised by an [`AuditSink`](crate::core::AuditSink).
#[derive(Error, Debug)]
pub enum AuditError {
    /// The sink could not persist the record.
    #[error("audit sink {sink} failed: {message}")]
    WriteFailed { sink: String, message: String },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::ConnectionFailed {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
        })
    }
}
