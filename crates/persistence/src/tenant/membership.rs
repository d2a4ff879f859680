//! Membership of a principal in an institution.
//!
//! A membership record links a [`PrincipalId`] to an [`InstitutionId`] with a
//! role and a lifecycle status. Only `active` memberships grant access.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::{InstitutionId, PrincipalId};

/// Role a principal holds inside an institution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    /// Enrolled learner.
    Student,
    /// Teaching staff.
    Instructor,
    /// Institution administrator, may perform roster overrides.
    Admin,
}

impl fmt::Display for MembershipRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipRole::Student => write!(f, "student"),
            MembershipRole::Instructor => write!(f, "instructor"),
            MembershipRole::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for MembershipRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(MembershipRole::Student),
            "instructor" => Ok(MembershipRole::Instructor),
            "admin" => Ok(MembershipRole::Admin),
            other => Err(format!("unknown membership role: {}", other)),
        }
    }
}

/// Lifecycle status of a membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    /// Approved and usable.
    Active,
    /// Awaiting approval.
    Pending,
    /// Temporarily blocked.
    Suspended,
    /// Permanently withdrawn.
    Revoked,
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipStatus::Active => write!(f, "active"),
            MembershipStatus::Pending => write!(f, "pending"),
            MembershipStatus::Suspended => write!(f, "suspended"),
            MembershipStatus::Revoked => write!(f, "revoked"),
        }
    }
}

impl std::str::FromStr for MembershipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MembershipStatus::Active),
            "pending" => Ok(MembershipStatus::Pending),
            "suspended" => Ok(MembershipStatus::Suspended),
            "revoked" => Ok(MembershipStatus::Revoked),
            other => Err(format!("unknown membership status: {}", other)),
        }
    }
}

/// A principal's membership in one institution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// The member.
    pub principal_id: PrincipalId,
    /// The institution the membership grants access to.
    pub institution_id: InstitutionId,
    /// Role inside the institution.
    pub role: MembershipRole,
    /// Lifecycle status.
    pub status: MembershipStatus,
}

impl Membership {
    /// Creates an active membership with the given role.
    pub fn active(
        principal_id: impl Into<PrincipalId>,
        institution_id: impl Into<InstitutionId>,
        role: MembershipRole,
    ) -> Self {
        Self {
            principal_id: principal_id.into(),
            institution_id: institution_id.into(),
            role,
            status: MembershipStatus::Active,
        }
    }

    /// Returns a copy with a different status.
    pub fn with_status(mut self, status: MembershipStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns `true` if the membership currently grants access.
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [
            MembershipRole::Student,
            MembershipRole::Instructor,
            MembershipRole::Admin,
        ] {
            assert_eq!(role.to_string().parse::<MembershipRole>(), Ok(role));
        }
        assert!("dean".parse::<MembershipRole>().is_err());
    }

    #[test]
    fn test_only_active_grants_access() {
        let m = Membership::active("u1", "inst-a", MembershipRole::Student);
        assert!(m.is_active());
        assert!(!m.clone().with_status(MembershipStatus::Pending).is_active());
        assert!(!m.with_status(MembershipStatus::Suspended).is_active());
    }
}
