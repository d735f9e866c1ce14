use std::sync::Arc;
use std::time::Duration;

use glory_core::Identity;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::app_core::DomainEvent;
use crate::domain::GlorySettings;
use crate::error::IdentityTimeout;
use crate::flags::{FlagKey, FlagStore};
use crate::ports::{IdentityProvider, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Provider,
    /// The provider was slow or failing; the cached marker was used.
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityCheck {
    pub logged_in: bool,
    /// May be `None` while `logged_in` holds when only the cached marker
    /// survived.
    pub identity: Option<Identity>,
    pub source: IdentitySource,
}

/// Asks the identity provider with a bounded wait, keeps `authCache` and
/// `authIdentity` in step and publishes the current identity on a watch
/// channel.
pub struct IdentityGate {
    provider: Arc<dyn IdentityProvider>,
    flags: FlagStore,
    timeout: Duration,
    current: Arc<watch::Sender<Option<Identity>>>,
    events: Option<mpsc::Sender<DomainEvent>>,
}

impl IdentityGate {
    pub fn new(provider: Arc<dyn IdentityProvider>, flags: FlagStore) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            provider,
            flags,
            timeout: Duration::from_millis(glory_config::IDENTITY_CHECK_TIMEOUT_MS),
            current: Arc::new(current),
            events: None,
        }
    }

    pub fn from_settings(
        provider: Arc<dyn IdentityProvider>,
        flags: FlagStore,
        settings: &GlorySettings,
    ) -> Self {
        Self::new(provider, flags).with_timeout(settings.identity_timeout())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Report identity changes as [`DomainEvent::IdentityChanged`].
    pub fn with_events(mut self, events: mpsc::Sender<DomainEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    pub fn current(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    /// Whether the durable marker says a user was logged in.
    pub fn cached_login(&self) -> bool {
        self.flags.is_set(FlagKey::AuthCache)
    }

    /// The identity stored next to the login marker, if both are present.
    pub fn cached(&self) -> Option<Identity> {
        if !self.cached_login() {
            return None;
        }
        let raw = self.flags.get::<String>(FlagKey::AuthIdentity)?;
        match serde_json::from_str(&raw) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!("ignoring unreadable cached identity: {}", e);
                None
            }
        }
    }

    pub async fn check(&self) -> IdentityCheck {
        let answer = match tokio::time::timeout(self.timeout, self.provider.current_identity()).await
        {
            Ok(Ok(identity)) => Some(identity),
            Ok(Err(e)) => {
                warn!("identity provider failed: {}", e);
                None
            }
            Err(_) => {
                warn!("{}", IdentityTimeout(self.timeout));
                None
            }
        };

        let check = match answer {
            Some(identity) => {
                remember(&self.flags, identity.as_ref());
                IdentityCheck {
                    logged_in: identity.is_some(),
                    identity,
                    source: IdentitySource::Provider,
                }
            }
            None => IdentityCheck {
                logged_in: self.cached_login(),
                identity: self.cached(),
                source: IdentitySource::Cache,
            },
        };
        publish(&self.current, self.events.as_ref(), check.identity.clone());
        check
    }

    /// Mirror provider-side changes (sign-in elsewhere, token expiry) until
    /// the returned subscription is dropped.
    pub fn follow_provider(&self) -> Subscription {
        let flags = self.flags.clone();
        let current = self.current.clone();
        let events = self.events.clone();
        self.provider
            .on_identity_change(Box::new(move |identity: Option<&Identity>| {
                remember(&flags, identity);
                publish(&current, events.as_ref(), identity.cloned());
            }))
    }
}

fn publish(
    current: &watch::Sender<Option<Identity>>,
    events: Option<&mpsc::Sender<DomainEvent>>,
    identity: Option<Identity>,
) {
    let previous = current.send_replace(identity.clone());
    if previous == identity {
        return;
    }
    if let Some(events) = events {
        if let Err(e) = events.try_send(DomainEvent::IdentityChanged(identity)) {
            debug!("identity change not delivered: {}", e);
        }
    }
}

fn remember(flags: &FlagStore, identity: Option<&Identity>) {
    let Some(identity) = identity else {
        forget(flags);
        return;
    };
    if let Err(e) = flags.raise(FlagKey::AuthCache) {
        warn!("could not update auth cache: {}", e);
        return;
    }
    let res = match serde_json::to_string(identity) {
        Ok(json) => flags.set(FlagKey::AuthIdentity, &json),
        Err(e) => {
            warn!("could not encode identity for cache: {}", e);
            flags.clear(FlagKey::AuthIdentity)
        }
    };
    if let Err(e) = res {
        warn!("could not update cached identity: {}", e);
    }
}

/// Drop the login marker and the identity stored with it.
pub(crate) fn forget(flags: &FlagStore) {
    for key in [FlagKey::AuthCache, FlagKey::AuthIdentity] {
        if let Err(e) = flags.clear(key) {
            warn!("could not clear {}: {}", key, e);
        }
    }
}

/// A single delayed identity re-check, cancelled on drop.
pub struct AuthRecheck {
    cancel: CancellationToken,
    task: Option<JoinHandle<Option<IdentityCheck>>>,
}

impl AuthRecheck {
    /// Re-check after the configured delay, used right after a sign-in
    /// redirect.
    pub fn from_settings(gate: Arc<IdentityGate>, settings: &GlorySettings) -> Self {
        Self::schedule(gate, settings.auth_recheck_delay())
    }

    pub fn schedule(gate: Arc<IdentityGate>, delay: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("auth re-check cancelled");
                    None
                }
                _ = tokio::time::sleep(delay) => Some(gate.check().await),
            }
        });
        Self {
            cancel,
            task: Some(task),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the re-check; `None` if it was cancelled first.
    pub async fn finished(mut self) -> Option<IdentityCheck> {
        match self.task.take() {
            Some(task) => task.await.ok().flatten(),
            None => None,
        }
    }
}

impl Drop for AuthRecheck {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
