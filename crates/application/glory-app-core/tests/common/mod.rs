#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use glory_app_core::{
    DocumentStore, IdentityCallback, IdentityProvider, RemoteError, Subscription,
};
use glory_core::{Identity, RecordPayload, RemoteRecord, Scope};

pub fn user(id: &str) -> Identity {
    Identity {
        user_id: id.into(),
        email: format!("{id}@example.com"),
        is_admin: false,
    }
}

pub fn admin(id: &str) -> Identity {
    Identity {
        is_admin: true,
        ..user(id)
    }
}

/// In-memory document store that counts calls and can be slowed down or
/// made to fail.
#[derive(Default)]
pub struct MemoryDocumentStore {
    records: Mutex<Vec<RemoteRecord>>,
    next_id: AtomicU64,
    ticks: AtomicU64,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    pub lookups: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    fail_with: Mutex<Option<RemoteError>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_with(&self, err: Option<RemoteError>) {
        *self.fail_with.lock().unwrap() = err;
    }

    pub fn records(&self) -> Vec<RemoteRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn record(&self, id: &str) -> Option<RemoteRecord> {
        self.records().into_iter().find(|r| r.id == id)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Put a record in place as if another session had written it.
    pub fn seed(&self, owner_id: &str, name: &str) -> RemoteRecord {
        self.seed_with(owner_id, name, serde_json::json!({}))
    }

    pub fn seed_with(&self, owner_id: &str, name: &str, content: serde_json::Value) -> RemoteRecord {
        let record = self.new_record(&RecordPayload {
            owner_id: owner_id.into(),
            name: name.into(),
            template_id: glory_core::DEFAULT_TEMPLATE_ID.into(),
            content,
        });
        self.records.lock().unwrap().push(record.clone());
        record
    }

    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) as i64;
        Utc.timestamp_opt(1_700_000_000 + tick, 0).unwrap()
    }

    fn new_record(&self, payload: &RecordPayload) -> RemoteRecord {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.now();
        RemoteRecord {
            id: format!("cv-{id}"),
            owner_id: payload.owner_id.clone(),
            name: payload.name.clone(),
            template_id: payload.template_id.clone(),
            content: payload.content.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn before_call(&self) -> Result<(), RemoteError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.fail_with.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_candidates_by_owner_and_name(
        &self,
        owner_id: &str,
        name: &str,
    ) -> Result<Vec<RemoteRecord>, RemoteError> {
        self.before_call().await?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records()
            .into_iter()
            .filter(|r| r.owner_id == owner_id && r.name == name)
            .collect())
    }

    async fn create(&self, payload: &RecordPayload) -> Result<RemoteRecord, RemoteError> {
        self.before_call().await?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        let record = self.new_record(payload);
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        id: &str,
        payload: &RecordPayload,
        scope: &Scope,
    ) -> Result<RemoteRecord, RemoteError> {
        self.before_call().await?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        let now = self.now();
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id && scope.permits(&r.owner_id))
            .ok_or_else(|| RemoteError::Rejected {
                status: 404,
                message: format!("CV {id} not found"),
            })?;
        record.owner_id = payload.owner_id.clone();
        record.name = payload.name.clone();
        record.template_id = payload.template_id.clone();
        record.content = payload.content.clone();
        record.updated_at = now;
        Ok(record.clone())
    }

    async fn get_by_id(
        &self,
        id: &str,
        scope: &Scope,
    ) -> Result<Option<RemoteRecord>, RemoteError> {
        self.before_call().await?;
        Ok(self
            .records()
            .into_iter()
            .find(|r| r.id == id && scope.permits(&r.owner_id)))
    }
}

type Listeners = Arc<Mutex<Vec<(u64, IdentityCallback)>>>;

/// Identity provider with a settable answer, an optional response delay and
/// change listeners.
#[derive(Default)]
pub struct FakeIdentityProvider {
    identity: Mutex<Option<Identity>>,
    delay: Mutex<Option<Duration>>,
    listeners: Listeners,
    next_listener: AtomicU64,
    pub sign_outs: AtomicUsize,
}

impl FakeIdentityProvider {
    pub fn signed_in(identity: Identity) -> Arc<Self> {
        let provider = Self::default();
        *provider.identity.lock().unwrap() = Some(identity);
        Arc::new(provider)
    }

    pub fn signed_out() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn sign_outs(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    /// Change the identity and notify listeners.
    pub fn emit(&self, identity: Option<Identity>) {
        *self.identity.lock().unwrap() = identity.clone();
        for (_, cb) in self.listeners.lock().unwrap().iter() {
            cb(identity.as_ref());
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn current_identity(&self) -> Result<Option<Identity>, RemoteError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.identity.lock().unwrap().clone())
    }

    fn on_identity_change(&self, callback: IdentityCallback) -> Subscription {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().unwrap().push((id, callback));
        let listeners = self.listeners.clone();
        Subscription::new(move || {
            listeners.lock().unwrap().retain(|(l, _)| *l != id);
        })
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        *self.identity.lock().unwrap() = None;
        Ok(())
    }
}
