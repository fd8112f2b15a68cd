//! # Core Identity Entities
//!
//! Caller identity, roles and the primitive id types used by every crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::AccessError;

/// Seconds since the UNIX epoch.
pub type Timestamp = u64;

/// Organization (tenant) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrgId(pub u64);

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an authenticated user (admin or operator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role granted to a caller by the upstream identity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Manages vouchers, batches and instance status.
    Admin,
    /// Validates and redeems tokens at the point of sale.
    Operator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "operator" => Ok(Role::Operator),
            other => Err(AccessError::UnknownRole(other.to_string())),
        }
    }
}

/// The authenticated caller of an engine operation.
///
/// Produced by the session layer; the engine treats it as authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub id: UserId,
    pub org: OrgId,
    pub role: Role,
}

impl CallerIdentity {
    pub fn new(id: UserId, org: OrgId, role: Role) -> Self {
        Self { id, org, role }
    }

    pub fn admin(id: u64, org: u64) -> Self {
        Self::new(UserId(id), OrgId(org), Role::Admin)
    }

    pub fn operator(id: u64, org: u64) -> Self {
        Self::new(UserId(id), OrgId(org), Role::Operator)
    }

    /// Fails with `AccessError::Forbidden` unless the caller holds one of `roles`.
    pub fn require_role(&self, roles: &[Role]) -> Result<(), AccessError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AccessError::Forbidden {
                role: self.role,
                allowed: roles.to_vec(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_role() {
        let admin = CallerIdentity::admin(1, 10);
        let operator = CallerIdentity::operator(2, 10);

        assert!(admin.require_role(&[Role::Admin]).is_ok());
        assert!(operator.require_role(&[Role::Admin, Role::Operator]).is_ok());
        assert!(matches!(
            operator.require_role(&[Role::Admin]),
            Err(AccessError::Forbidden {
                role: Role::Operator,
                ..
            })
        ));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("operator".parse::<Role>().unwrap(), Role::Operator);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Operator).unwrap();
        assert_eq!(json, "\"operator\"");
    }
}
