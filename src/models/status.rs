use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Account role, fixed when the account is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Regular,
    MosqueAdmin,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Regular => "regular",
            Role::MosqueAdmin => "mosque-admin",
            Role::Superadmin => "superadmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moderation state shared by admin accounts and posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ApprovalStatus::Pending),
            "approved" => Some(ApprovalStatus::Approved),
            "rejected" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A moderator's decision. `pending` is only ever set at creation, so it has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    pub fn status(&self) -> ApprovalStatus {
        match self {
            Verdict::Approve => ApprovalStatus::Approved,
            Verdict::Reject => ApprovalStatus::Rejected,
        }
    }
}

impl std::str::FromStr for Verdict {
    type Err = ServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match ApprovalStatus::parse(value) {
            Some(ApprovalStatus::Approved) => Ok(Verdict::Approve),
            Some(ApprovalStatus::Rejected) => Ok(Verdict::Reject),
            Some(ApprovalStatus::Pending) | None => Err(ServiceError::InvalidStatus),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_as_kebab_case() {
        let json = serde_json::to_string(&Role::MosqueAdmin).unwrap();
        assert_eq!(json, "\"mosque-admin\"");
        let role: Role = serde_json::from_str("\"regular\"").unwrap();
        assert_eq!(role, Role::Regular);
    }

    #[test]
    fn pending_is_not_a_verdict() {
        assert!(matches!(
            "pending".parse::<Verdict>(),
            Err(ServiceError::InvalidStatus)
        ));
        assert!(matches!(
            "archived".parse::<Verdict>(),
            Err(ServiceError::InvalidStatus)
        ));
        assert_eq!("approved".parse::<Verdict>().unwrap(), Verdict::Approve);
        assert_eq!("rejected".parse::<Verdict>().unwrap().status(), ApprovalStatus::Rejected);
    }
}
