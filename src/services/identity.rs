use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::Utc;
use log::{error, info, warn};
use mongodb::bson::doc;
use serde::Deserialize;
use uuid::Uuid;

use super::mosques::MosqueDirectory;
use super::{normalize_base64, require_text, LIST_LIMIT};
use crate::error::ServiceError;
use crate::models::{
    Account, ApprovalStatus, Mosque, NewMosque, PublicAccount, Role, USERS,
};
use crate::store::{from_record, to_record, DocumentStore, StoreError};

/// Self-registration input.
#[derive(Debug, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub role: Role,
    /// Existing mosque a new admin belongs to.
    pub mosque_id: Option<String>,
    /// A mosque to create alongside the admin account when `mosque_id` is absent.
    pub mosque: Option<NewMosque>,
    /// Base64 identity document, required for mosque admins.
    pub id_proof: Option<String>,
}

/// Account creation, credential checks and the admin approval queue.
#[derive(Clone)]
pub struct IdentityEngine {
    store: Arc<dyn DocumentStore>,
    mosques: MosqueDirectory,
    password_cost: u32,
}

impl IdentityEngine {
    pub fn new(store: Arc<dyn DocumentStore>, password_cost: u32) -> Self {
        Self {
            mosques: MosqueDirectory::new(store.clone()),
            store,
            password_cost,
        }
    }

    /// Declares the unique email constraint. Run once at startup.
    pub async fn prepare(&self) -> Result<(), ServiceError> {
        self.store.ensure_unique(USERS, &["email"]).await?;
        Ok(())
    }

    pub async fn register(&self, registration: Registration) -> Result<PublicAccount, ServiceError> {
        let Registration {
            email,
            password,
            role,
            mosque_id,
            mosque,
            id_proof,
        } = registration;

        require_text("email", &email)?;
        require_text("password", &password)?;

        // validate everything role-specific before touching the store
        let admin_proof = match role {
            Role::Superadmin => return Err(ServiceError::RoleNotAllowed(role)),
            Role::Regular => None,
            Role::MosqueAdmin => {
                let proof = id_proof.as_deref().ok_or(ServiceError::MissingField("id_proof"))?;
                Some(normalize_base64("id_proof", proof)?)
            }
        };

        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::DuplicateEmail);
        }

        let password_hash = self.hash_password(&password)?;
        drop(password);

        let mut created_mosque: Option<Mosque> = None;
        let (mosque_id, status) = match role {
            Role::MosqueAdmin => {
                let mosque_id = match (mosque_id, mosque) {
                    (Some(id), _) => self.mosques.require(&id).await?.id,
                    (None, Some(new)) => {
                        let mosque = self.mosques.create(new).await?;
                        let id = mosque.id.clone();
                        created_mosque = Some(mosque);
                        id
                    }
                    (None, None) => return Err(ServiceError::MissingField("mosque_id")),
                };
                (Some(mosque_id), ApprovalStatus::Pending)
            }
            Role::Regular | Role::Superadmin => (None, ApprovalStatus::Approved),
        };

        let account = Account {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash,
            role,
            mosque_id,
            id_proof: admin_proof,
            favorite_mosques: Vec::new(),
            status,
            created_at: Utc::now(),
        };

        if let Err(err) = self.store.insert(USERS, to_record(&account)?).await {
            if let Some(mosque) = created_mosque {
                if let Err(cleanup) = self.mosques.remove(&mosque.id).await {
                    error!(
                        "Could not remove mosque {} after failed registration: {}",
                        mosque.id, cleanup
                    );
                }
            }
            return Err(match err {
                StoreError::Conflict(_) => ServiceError::DuplicateEmail,
                other => other.into(),
            });
        }

        info!(
            "Registered {} account {} with status {}",
            account.role, account.id, account.status
        );
        Ok(account.public())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<PublicAccount, ServiceError> {
        let Some(account) = self.find_by_email(email).await? else {
            warn!("Login rejected: unknown email");
            return Err(ServiceError::InvalidCredentials);
        };

        if !verify(password, &account.password_hash).unwrap_or(false) {
            warn!("Login rejected: bad password for account {}", account.id);
            return Err(ServiceError::InvalidCredentials);
        }

        match (account.role, account.status) {
            (Role::MosqueAdmin, ApprovalStatus::Approved) => {}
            (Role::MosqueAdmin, ApprovalStatus::Pending | ApprovalStatus::Rejected) => {
                warn!("Login blocked for {} admin {}", account.status, account.id);
                return Err(ServiceError::PendingApproval);
            }
            (Role::Regular | Role::Superadmin, _) => {}
        }

        Ok(account.public())
    }

    pub async fn list_pending_admins(&self) -> Result<Vec<PublicAccount>, ServiceError> {
        let documents = self
            .store
            .find_many(
                USERS,
                doc! {
                    "role": Role::MosqueAdmin.as_str(),
                    "status": ApprovalStatus::Pending.as_str(),
                },
                None,
                Some(LIST_LIMIT),
            )
            .await?;
        documents
            .into_iter()
            .map(|d| {
                from_record::<Account>(d)
                    .map(|account| account.public())
                    .map_err(ServiceError::from)
            })
            .collect()
    }

    pub async fn account(&self, user_id: &str) -> Result<Account, ServiceError> {
        match self.store.find_one(USERS, doc! { "id": user_id }).await? {
            Some(document) => Ok(from_record(document)?),
            None => Err(ServiceError::NotFound("User")),
        }
    }

    pub async fn id_proof(&self, user_id: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.account(user_id).await?.id_proof)
    }

    pub async fn add_favorite(&self, user_id: &str, mosque_id: &str) -> Result<(), ServiceError> {
        self.mosques.require(mosque_id).await?;
        self.update_favorites(user_id, doc! { "$addToSet": { "favorite_mosques": mosque_id } })
            .await
    }

    pub async fn remove_favorite(&self, user_id: &str, mosque_id: &str) -> Result<(), ServiceError> {
        self.update_favorites(user_id, doc! { "$pull": { "favorite_mosques": mosque_id } })
            .await
    }

    pub async fn favorites(&self, user_id: &str) -> Result<Vec<Mosque>, ServiceError> {
        let account = self.account(user_id).await?;
        self.mosques.many(&account.favorite_mosques).await
    }

    /// Creates the superadmin account if the email is unused. Returns whether one was created.
    pub async fn bootstrap_superadmin(&self, email: &str, password: &str) -> Result<bool, ServiceError> {
        if self.find_by_email(email).await?.is_some() {
            return Ok(false);
        }
        let account = Account {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash: self.hash_password(password)?,
            role: Role::Superadmin,
            mosque_id: None,
            id_proof: None,
            favorite_mosques: Vec::new(),
            status: ApprovalStatus::Approved,
            created_at: Utc::now(),
        };
        match self.store.insert(USERS, to_record(&account)?).await {
            Ok(()) => {
                info!("Superadmin {} created", email);
                Ok(true)
            }
            Err(StoreError::Conflict(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn update_favorites(
        &self,
        user_id: &str,
        update: mongodb::bson::Document,
    ) -> Result<(), ServiceError> {
        let matched = self
            .store
            .update_one(USERS, doc! { "id": user_id }, update)
            .await?;
        if matched == 0 {
            return Err(ServiceError::NotFound("User"));
        }
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, ServiceError> {
        match self.store.find_one(USERS, doc! { "email": email }).await? {
            Some(document) => Ok(Some(from_record(document)?)),
            None => Ok(None),
        }
    }

    fn hash_password(&self, password: &str) -> Result<String, ServiceError> {
        hash(password, self.password_cost)
            .map_err(|e| ServiceError::Internal(format!("password hashing failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::moderation::{EntityKind, ModerationGate};
    use crate::models::MOSQUES;
    use crate::services::testing::{memory_store, new_mosque, RacingStore};

    const TEST_COST: u32 = 4;

    fn regular(email: &str, password: &str) -> Registration {
        Registration {
            email: email.to_string(),
            password: password.to_string(),
            role: Role::Regular,
            mosque_id: None,
            mosque: None,
            id_proof: None,
        }
    }

    fn admin(email: &str, password: &str, mosque_id: &str) -> Registration {
        Registration {
            role: Role::MosqueAdmin,
            mosque_id: Some(mosque_id.to_string()),
            id_proof: Some("aWQtY2FyZA==".to_string()),
            ..regular(email, password)
        }
    }

    async fn setup() -> (IdentityEngine, ModerationGate, String) {
        let store = memory_store();
        let identity = IdentityEngine::new(store.clone(), TEST_COST);
        identity.prepare().await.unwrap();
        let mosque = MosqueDirectory::new(store.clone())
            .create(new_mosque("Al-Noor"))
            .await
            .unwrap();
        (identity, ModerationGate::new(store), mosque.id)
    }

    #[tokio::test]
    async fn regular_users_are_approved_immediately() {
        let (identity, _, _) = setup().await;
        let mut registration = regular("u@x.com", "pw");
        registration.id_proof = Some("aWQ=".into());

        let account = identity.register(registration).await.unwrap();
        assert_eq!(account.status, ApprovalStatus::Approved);
        assert_eq!(account.role, Role::Regular);
        assert!(account.mosque_id.is_none());

        let stored = identity.account(&account.id).await.unwrap();
        assert!(stored.id_proof.is_none());
        assert_ne!(stored.password_hash, "pw");

        identity.login("u@x.com", "pw").await.unwrap();
    }

    #[tokio::test]
    async fn admin_waits_for_approval_before_login() {
        let (identity, gate, mosque_id) = setup().await;

        let account = identity
            .register(admin("a@x.com", "pw123", &mosque_id))
            .await
            .unwrap();
        assert_eq!(account.status, ApprovalStatus::Pending);
        assert_eq!(account.mosque_id.as_deref(), Some(mosque_id.as_str()));

        assert!(matches!(
            identity.login("a@x.com", "pw123").await,
            Err(ServiceError::PendingApproval)
        ));

        let pending = identity.list_pending_admins().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, account.id);

        gate.set_approval_status(EntityKind::Account, &account.id, "approved")
            .await
            .unwrap();

        let logged_in = identity.login("a@x.com", "pw123").await.unwrap();
        assert_eq!(logged_in.status, ApprovalStatus::Approved);
        assert!(identity.list_pending_admins().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_admin_still_cannot_login() {
        let (identity, gate, mosque_id) = setup().await;
        let account = identity
            .register(admin("a@x.com", "pw123", &mosque_id))
            .await
            .unwrap();
        gate.set_approval_status(EntityKind::Account, &account.id, "rejected")
            .await
            .unwrap();
        assert!(matches!(
            identity.login("a@x.com", "pw123").await,
            Err(ServiceError::PendingApproval)
        ));
    }

    #[tokio::test]
    async fn duplicate_email_leaves_first_account_untouched() {
        let (identity, _, _) = setup().await;
        let first = identity.register(regular("dup@x.com", "first")).await.unwrap();

        assert!(matches!(
            identity.register(regular("dup@x.com", "second")).await,
            Err(ServiceError::DuplicateEmail)
        ));

        let stored = identity.account(&first.id).await.unwrap();
        assert_eq!(stored.public(), first);
        identity.login("dup@x.com", "first").await.unwrap();
        assert!(identity.login("dup@x.com", "second").await.is_err());
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let (identity, _, _) = setup().await;
        identity.register(regular("u@x.com", "pw")).await.unwrap();

        let unknown = identity.login("nobody@x.com", "pw").await.unwrap_err();
        let wrong = identity.login("u@x.com", "nope").await.unwrap_err();
        assert!(matches!(unknown, ServiceError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn superadmin_cannot_self_register() {
        let (identity, _, _) = setup().await;
        let registration = Registration {
            role: Role::Superadmin,
            ..regular("root@x.com", "pw")
        };
        assert!(matches!(
            identity.register(registration).await,
            Err(ServiceError::RoleNotAllowed(Role::Superadmin))
        ));
    }

    #[tokio::test]
    async fn admin_registration_requires_proof_and_mosque() {
        let (identity, _, mosque_id) = setup().await;

        let mut missing_proof = admin("a@x.com", "pw", &mosque_id);
        missing_proof.id_proof = None;
        assert!(matches!(
            identity.register(missing_proof).await,
            Err(ServiceError::MissingField("id_proof"))
        ));

        assert!(matches!(
            identity.register(admin("a@x.com", "pw", "ghost")).await,
            Err(ServiceError::MosqueNotFound)
        ));

        let mut no_mosque = admin("a@x.com", "pw", &mosque_id);
        no_mosque.mosque_id = None;
        assert!(matches!(
            identity.register(no_mosque).await,
            Err(ServiceError::MissingField("mosque_id"))
        ));
    }

    #[tokio::test]
    async fn admin_can_register_a_new_mosque_inline() {
        let store = memory_store();
        let identity = IdentityEngine::new(store.clone(), TEST_COST);
        let mut registration = admin("a@x.com", "pw", "unused");
        registration.mosque_id = None;
        registration.mosque = Some(new_mosque("Masjid Al-Rahman"));

        let account = identity.register(registration).await.unwrap();
        let mosque_id = account.mosque_id.expect("mosque assigned");
        let mosque = MosqueDirectory::new(store).require(&mosque_id).await.unwrap();
        assert_eq!(mosque.name, "Masjid Al-Rahman");
    }

    #[tokio::test]
    async fn favorites_behave_as_a_set() {
        let (identity, _, mosque_id) = setup().await;
        let user = identity.register(regular("u@x.com", "pw")).await.unwrap();

        identity.add_favorite(&user.id, &mosque_id).await.unwrap();
        identity.add_favorite(&user.id, &mosque_id).await.unwrap();
        let favorites = identity.favorites(&user.id).await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, mosque_id);

        assert!(matches!(
            identity.add_favorite(&user.id, "ghost").await,
            Err(ServiceError::MosqueNotFound)
        ));

        identity.remove_favorite(&user.id, &mosque_id).await.unwrap();
        assert!(identity.favorites(&user.id).await.unwrap().is_empty());

        assert!(matches!(
            identity.remove_favorite("ghost", &mosque_id).await,
            Err(ServiceError::NotFound("User"))
        ));
    }

    #[tokio::test]
    async fn superadmin_bootstrap_is_idempotent() {
        let (identity, _, _) = setup().await;
        assert!(identity.bootstrap_superadmin("root@x.com", "pw").await.unwrap());
        assert!(!identity.bootstrap_superadmin("root@x.com", "pw").await.unwrap());

        let root = identity.login("root@x.com", "pw").await.unwrap();
        assert_eq!(root.role, Role::Superadmin);
    }

    async fn racing_setup() -> (IdentityEngine, Arc<RacingStore>) {
        let store = RacingStore::new();
        let identity = IdentityEngine::new(store.clone(), TEST_COST);
        identity.prepare().await.unwrap();
        identity.register(regular("dup@x.com", "first")).await.unwrap();
        // the next registration's email lookup misses, as if both raced past it
        store.hide_lookups(USERS, 1);
        (identity, store)
    }

    fn inline_admin(email: &str) -> Registration {
        Registration {
            role: Role::MosqueAdmin,
            mosque: Some(new_mosque("Inline Masjid")),
            id_proof: Some("aWQtY2FyZA==".to_string()),
            ..regular(email, "second")
        }
    }

    #[tokio::test]
    async fn insert_conflict_reports_duplicate_email() {
        let (identity, _) = racing_setup().await;
        assert!(matches!(
            identity.register(regular("dup@x.com", "second")).await,
            Err(ServiceError::DuplicateEmail)
        ));
        assert!(identity.login("dup@x.com", "first").await.is_ok());
    }

    #[tokio::test]
    async fn failed_registration_removes_inline_mosque() {
        let (identity, store) = racing_setup().await;
        assert!(matches!(
            identity.register(inline_admin("dup@x.com")).await,
            Err(ServiceError::DuplicateEmail)
        ));
        let mosques = store.find_many(MOSQUES, doc! {}, None, None).await.unwrap();
        assert!(mosques.is_empty());
    }

    #[tokio::test]
    async fn cleanup_failure_keeps_the_registration_error() {
        let (identity, store) = racing_setup().await;
        store.fail_deletes(MOSQUES);
        assert!(matches!(
            identity.register(inline_admin("dup@x.com")).await,
            Err(ServiceError::DuplicateEmail)
        ));
        let mosques = store.find_many(MOSQUES, doc! {}, None, None).await.unwrap();
        assert_eq!(mosques.len(), 1);
    }
}
