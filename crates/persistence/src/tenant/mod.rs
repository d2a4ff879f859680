//! Tenant management for multi-institution storage.
//!
//! This module provides the identity types that scope every record and every
//! operation to exactly one institution.
//!
//! # Core Types
//!
//! - [`InstitutionId`] - Opaque tenant identifier
//! - [`PrincipalId`] - Opaque identifier of an authenticated actor
//! - [`Membership`] - A principal's role and status inside one institution
//! - [`TenantContext`] - Immutable "principal acting in institution" value
//!
//! # Examples
//!
//! ```
//! use registrar_persistence::tenant::{
//!     InstitutionId, Membership, MembershipRole, TenantContext,
//! };
//!
//! let membership = Membership::active("user-1", "state-u", MembershipRole::Student);
//! let ctx = TenantContext::from_membership(&membership);
//!
//! assert_eq!(ctx.institution_id(), &InstitutionId::new("state-u"));
//! assert!(!ctx.is_admin());
//! ```

mod context;
mod id;
mod membership;

pub use context::{TenantContext, TenantContextBuilder};
pub use id::{InstitutionId, PrincipalId};
pub use membership::{Membership, MembershipRole, MembershipStatus};
