use std::sync::Arc;

use crate::config::Config;
use crate::error::ServiceError;
use crate::services::identity::IdentityEngine;
use crate::services::moderation::ModerationGate;
use crate::services::mosques::MosqueDirectory;
use crate::services::posts::PostDirectory;
use crate::services::prayer_times::PrayerTimeResolver;
use crate::store::DocumentStore;
use crate::timings_client::TimingProvider;

#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityEngine,
    pub moderation: ModerationGate,
    pub prayer_times: PrayerTimeResolver,
    pub mosques: MosqueDirectory,
    pub posts: PostDirectory,
    pub config: Config,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn TimingProvider>,
        config: Config,
    ) -> Self {
        Self {
            identity: IdentityEngine::new(store.clone(), config.bcrypt_cost),
            moderation: ModerationGate::new(store.clone()),
            prayer_times: PrayerTimeResolver::new(store.clone(), provider),
            mosques: MosqueDirectory::new(store.clone()),
            posts: PostDirectory::new(store),
            config,
        }
    }

    /// Declares store constraints and seeds the configured superadmin.
    pub async fn prepare(&self) -> Result<(), ServiceError> {
        self.identity.prepare().await?;
        self.prayer_times.prepare().await?;
        if let (Some(email), Some(password)) = (
            self.config.superadmin_email.as_deref(),
            self.config.superadmin_password.as_deref(),
        ) {
            self.identity.bootstrap_superadmin(email, password).await?;
        }
        Ok(())
    }
}
