//! Institution (tenant) records.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ResourceKind, TenantScoped};
use crate::tenant::InstitutionId;

/// Lifecycle status of an institution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstitutionStatus {
    /// Operating normally.
    Active,
    /// Registered but not yet (or no longer) operating.
    Inactive,
    /// Blocked by the platform operator.
    Suspended,
}

impl fmt::Display for InstitutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstitutionStatus::Active => write!(f, "active"),
            InstitutionStatus::Inactive => write!(f, "inactive"),
            InstitutionStatus::Suspended => write!(f, "suspended"),
        }
    }
}

impl std::str::FromStr for InstitutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(InstitutionStatus::Active),
            "inactive" => Ok(InstitutionStatus::Inactive),
            "suspended" => Ok(InstitutionStatus::Suspended),
            other => Err(format!("unknown institution status: {}", other)),
        }
    }
}

/// A tenant of the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    /// Tenant identifier.
    pub id: InstitutionId,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: InstitutionStatus,
}

impl Institution {
    /// Creates an active institution.
    pub fn active(id: impl Into<InstitutionId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: InstitutionStatus::Active,
        }
    }

    /// Returns a copy with a different status.
    pub fn with_status(mut self, status: InstitutionStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns `true` if operations may be performed in this institution.
    pub fn is_active(&self) -> bool {
        self.status == InstitutionStatus::Active
    }
}

impl TenantScoped for Institution {
    fn institution_id(&self) -> &InstitutionId {
        &self.id
    }

    fn resource_kind(&self) -> ResourceKind {
        ResourceKind::Institution
    }

    fn resource_id(&self) -> &str {
        self.id.as_str()
    }
}
