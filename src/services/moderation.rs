use std::sync::Arc;

use log::info;
use mongodb::bson::doc;

use crate::error::ServiceError;
use crate::models::{ApprovalStatus, Verdict, POSTS, USERS};
use crate::store::DocumentStore;

/// What a moderation decision applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Account,
    Post,
}

impl EntityKind {
    fn collection(&self) -> &'static str {
        match self {
            EntityKind::Account => USERS,
            EntityKind::Post => POSTS,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            EntityKind::Account => "User",
            EntityKind::Post => "Post",
        }
    }
}

/// The pending -> approved | rejected state machine shared by admin accounts and posts.
///
/// Both outcomes are terminal. Re-applying the outcome an entity already has succeeds;
/// moving it to the other outcome fails with `AlreadyModerated`.
#[derive(Clone)]
pub struct ModerationGate {
    store: Arc<dyn DocumentStore>,
}

impl ModerationGate {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn set_approval_status(
        &self,
        kind: EntityKind,
        id: &str,
        new_status: &str,
    ) -> Result<ApprovalStatus, ServiceError> {
        let verdict: Verdict = new_status.parse()?;
        let target = verdict.status();

        let filter = doc! {
            "id": id,
            "status": { "$in": [ApprovalStatus::Pending.as_str(), target.as_str()] },
        };
        let matched = self
            .store
            .update_one(
                kind.collection(),
                filter,
                doc! { "$set": { "status": target.as_str() } },
            )
            .await?;
        if matched > 0 {
            info!("{} {} moderated: {}", kind.label(), id, target);
            return Ok(target);
        }

        // nothing matched: either unknown, or already decided the other way
        match self.store.find_one(kind.collection(), doc! { "id": id }).await? {
            None => Err(ServiceError::NotFound(kind.label())),
            Some(existing) => {
                let current = existing
                    .get_str("status")
                    .ok()
                    .and_then(ApprovalStatus::parse)
                    .unwrap_or(ApprovalStatus::Pending);
                Err(ServiceError::AlreadyModerated {
                    kind: kind.label(),
                    status: current,
                })
            }
        }
    }
}
