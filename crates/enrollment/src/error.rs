//! Error types returned at the engine boundary.
//!
//! Every failure of an engine, validator or context-manager operation is
//! translated into one [`EnrollmentError`] kind before it reaches a caller.
//! Expected business outcomes (duplicate enrollment, full course, credit
//! limit) are distinct variants so callers can match on them instead of on
//! message text.
//!
//! # Error Mapping
//!
//! | Kind | Status | Retried by caller |
//! |------|--------|-------------------|
//! | Validation | 400 | no |
//! | ContextMissing | 400 | no |
//! | AccessDenied | 403 | no |
//! | Forbidden | 403 | no |
//! | NotFound | 404 | no |
//! | BusinessConflict | 409 | no |
//! | ConcurrencyExhausted | 409 | no |
//! | Unexpected | 500 | no |
//!
//! Optimistic-lock conflicts never appear here directly. They are retried
//! inside the engine and only surface as `ConcurrencyExhausted` once the
//! retry budget is spent.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Message returned for every access denial. It never names the resource or
/// the institution that owns it.
pub const ACCESS_DENIED_MESSAGE: &str = "Access denied for the requested institution";

/// Message returned when the retry budget is exhausted.
pub const HIGH_DEMAND_MESSAGE: &str =
    "The course is in high demand right now; please try again in a moment";

/// Why a business rule rejected the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// An `enrolled` row already exists for the student, course and semester.
    AlreadyEnrolled,
    /// The course roster is at its seat limit.
    CourseFull,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::AlreadyEnrolled => write!(f, "already_enrolled"),
            ConflictKind::CourseFull => write!(f, "course_full"),
        }
    }
}

/// Coarse classification of an [`EnrollmentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    ContextMissing,
    AccessDenied,
    Forbidden,
    NotFound,
    BusinessConflict,
    ConcurrencyExhausted,
    Unexpected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::ContextMissing => "context_missing",
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::BusinessConflict => "business_conflict",
            ErrorKind::ConcurrencyExhausted => "concurrency_exhausted",
            ErrorKind::Unexpected => "unexpected",
        };
        write!(f, "{}", s)
    }
}

/// The error type for engine, validator and context-manager operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentError {
    /// Malformed input or a credit-limit breach.
    #[error("{message}")]
    Validation { message: String },

    /// No tenant context is active for the principal and institution.
    #[error("No active context for institution {institution_id}")]
    ContextMissing { institution_id: String },

    /// Cross-tenant attempt or missing membership.
    #[error("{}", ACCESS_DENIED_MESSAGE)]
    AccessDenied,

    /// Authenticated in the institution but not allowed to act.
    #[error("{message}")]
    Forbidden { message: String },

    /// Absent in the caller's institution (whether or not it exists elsewhere).
    #[error("{message}")]
    NotFound { message: String },

    /// Rejected by a business rule.
    #[error("{message}")]
    BusinessConflict { kind: ConflictKind, message: String },

    /// Optimistic-lock conflicts persisted through every attempt.
    #[error("{}", HIGH_DEMAND_MESSAGE)]
    ConcurrencyExhausted { attempts: u32 },

    /// Any other failure. Details are only in the logs, keyed by `reference`.
    #[error("An unexpected error occurred (reference {reference})")]
    Unexpected { reference: Uuid },
}

impl EnrollmentError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        EnrollmentError::Validation {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        EnrollmentError::NotFound {
            message: message.into(),
        }
    }

    /// Creates a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        EnrollmentError::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a business conflict.
    pub fn conflict(kind: ConflictKind) -> Self {
        let message = match kind {
            ConflictKind::AlreadyEnrolled => "Already enrolled in this course for this semester",
            ConflictKind::CourseFull => "Course is full",
        };
        EnrollmentError::BusinessConflict {
            kind,
            message: message.to_string(),
        }
    }

    /// Logs `source` with a fresh reference ID and returns an opaque error
    /// carrying only that ID.
    pub fn unexpected(operation: &str, source: &dyn std::error::Error) -> Self {
        let reference = Uuid::new_v4();
        error!(
            operation,
            reference = %reference,
            error = %source,
            debug = ?source,
            "unexpected failure"
        );
        EnrollmentError::Unexpected { reference }
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EnrollmentError::Validation { .. } => ErrorKind::Validation,
            EnrollmentError::ContextMissing { .. } => ErrorKind::ContextMissing,
            EnrollmentError::AccessDenied => ErrorKind::AccessDenied,
            EnrollmentError::Forbidden { .. } => ErrorKind::Forbidden,
            EnrollmentError::NotFound { .. } => ErrorKind::NotFound,
            EnrollmentError::BusinessConflict { .. } => ErrorKind::BusinessConflict,
            EnrollmentError::ConcurrencyExhausted { .. } => ErrorKind::ConcurrencyExhausted,
            EnrollmentError::Unexpected { .. } => ErrorKind::Unexpected,
        }
    }

    /// Returns the HTTP-equivalent status code for this error.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::ContextMissing => 400,
            ErrorKind::AccessDenied | ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::BusinessConflict | ErrorKind::ConcurrencyExhausted => 409,
            ErrorKind::Unexpected => 500,
        }
    }

    /// Returns whether a caller should retry. Always `false`: retryable
    /// conflicts are consumed inside the engine.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Returns the conflict kind for business conflicts.
    pub fn conflict_kind(&self) -> Option<ConflictKind> {
        match self {
            EnrollmentError::BusinessConflict { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Renders the caller-facing outcome document.
    pub fn outcome(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status_code(),
            "kind": self.kind(),
            "conflict": self.conflict_kind(),
            "message": self.to_string(),
        })
    }
}

/// Result type alias for engine operations.
pub type EnrollmentResult<T> = Result<T, EnrollmentError>;
