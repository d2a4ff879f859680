//! Identifier types for tenants and principals.
//!
//! [`InstitutionId`] names a tenant boundary and [`PrincipalId`] names an
//! authenticated actor. Both are opaque strings; they are kept as distinct
//! types so a principal id can never be passed where an institution id is
//! expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from the given string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` if the identifier is empty or only whitespace.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self::new(s))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id! {
    /// An opaque institution (tenant) identifier.
    ///
    /// Every student, course and enrollment belongs to exactly one institution.
    ///
    /// # Examples
    ///
    /// ```
    /// use registrar_persistence::tenant::InstitutionId;
    ///
    /// let inst = InstitutionId::new("state-university");
    /// assert_eq!(inst.as_str(), "state-university");
    /// ```
    InstitutionId
}

opaque_id! {
    /// An opaque identifier for an authenticated principal (user account).
    ///
    /// A principal may hold memberships in several institutions.
    PrincipalId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_institution_id_creation() {
        let inst = InstitutionId::new("inst-a");
        assert_eq!(inst.as_str(), "inst-a");
        assert_eq!(inst.to_string(), "inst-a");
    }

    #[test]
    fn test_debug_names_the_type() {
        assert_eq!(format!("{:?}", PrincipalId::new("u1")), "PrincipalId(u1)");
        assert_eq!(
            format!("{:?}", InstitutionId::new("i1")),
            "InstitutionId(i1)"
        );
    }

    #[test]
    fn test_blank_detection() {
        assert!(InstitutionId::new("  ").is_blank());
        assert!(!InstitutionId::new("x").is_blank());
    }

    #[test]
    fn test_serde_is_transparent() {
        let inst = InstitutionId::new("acme");
        let json = serde_json::to_string(&inst).unwrap();
        assert_eq!(json, "\"acme\"");

        let parsed: InstitutionId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, inst);
    }

    #[test]
    fn test_from_string() {
        let principal: PrincipalId = "user-1".into();
        assert_eq!(principal.as_str(), "user-1");

        let principal2: PrincipalId = String::from("user-1").into();
        assert_eq!(principal, principal2);
    }
}
