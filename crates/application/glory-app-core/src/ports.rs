use async_trait::async_trait;
use glory_core::{most_recent, Identity, RecordPayload, RemoteRecord, Scope};

use crate::domain::GlorySettings;
use crate::error::RemoteError;

/// Remote store of CV records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_candidates_by_owner_and_name(
        &self,
        owner_id: &str,
        name: &str,
    ) -> Result<Vec<RemoteRecord>, RemoteError>;

    /// The most recently updated record with this owner and name.
    async fn find_by_owner_and_name(
        &self,
        owner_id: &str,
        name: &str,
    ) -> Result<Option<RemoteRecord>, RemoteError> {
        let candidates = self
            .find_candidates_by_owner_and_name(owner_id, name)
            .await?;
        Ok(most_recent(candidates))
    }

    async fn create(&self, payload: &RecordPayload) -> Result<RemoteRecord, RemoteError>;

    async fn update(
        &self,
        id: &str,
        payload: &RecordPayload,
        scope: &Scope,
    ) -> Result<RemoteRecord, RemoteError>;

    async fn get_by_id(&self, id: &str, scope: &Scope)
        -> Result<Option<RemoteRecord>, RemoteError>;
}

pub type IdentityCallback = Box<dyn Fn(Option<&Identity>) + Send + Sync>;

/// Keeps an identity-change listener registered until dropped.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_identity(&self) -> Result<Option<Identity>, RemoteError>;

    fn on_identity_change(&self, callback: IdentityCallback) -> Subscription;

    /// Best-effort remote session invalidation.
    async fn sign_out(&self) -> Result<(), RemoteError>;
}

pub trait SettingsRepo: Send + Sync + 'static {
    fn load(&self) -> anyhow::Result<GlorySettings>;
    fn save(&self, settings: &GlorySettings) -> anyhow::Result<()>;
}
