use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::{ApprovalStatus, Role};

/// A stored account document in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub mosque_id: Option<String>,
    /// Base64 identity proof, mosque admins only.
    pub id_proof: Option<String>,
    #[serde(default)]
    pub favorite_mosques: Vec<String>,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn is_approved_admin(&self) -> bool {
        matches!(
            (self.role, self.status),
            (Role::MosqueAdmin, ApprovalStatus::Approved)
        )
    }

    pub fn public(&self) -> PublicAccount {
        PublicAccount {
            id: self.id.clone(),
            email: self.email.clone(),
            role: self.role,
            mosque_id: self.mosque_id.clone(),
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// What callers get to see of an account. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicAccount {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub mosque_id: Option<String>,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
}
