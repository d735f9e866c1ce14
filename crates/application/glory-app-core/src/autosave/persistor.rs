use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use glory_core::{
    duplicate_display_name, most_recent, Attachment, CvDraft, CvFields, DraftKey, Identity,
    RecordPayload, RemoteRecord, DEFAULT_TEMPLATE_ID,
};
use glory_infra::DraftDigest;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::handle::DraftHandle;
use super::status::{FailReason, SaveOutcome, SaveStatus, SkipReason};
use crate::error::{FlagError, RemoteError, SaveError};
use crate::flags::{FlagKey, FlagStore};
use crate::ports::DocumentStore;

const PROFILE_IMAGE_FIELD: &str = "profileImage";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    /// `None` when the draft was only saved locally.
    pub remote_id: Option<String>,
    pub created: bool,
}

/// Marks a draft as having a write in flight until dropped.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<DraftKey>>>,
    key: DraftKey,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<DraftKey>>>, key: DraftKey) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
        inserted.then(|| Self {
            set: set.clone(),
            key,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Writes drafts to the document store, one write per draft at a time.
pub struct AutoSavePersistor {
    store: Arc<dyn DocumentStore>,
    flags: FlagStore,
    template_id: String,
    in_flight: Arc<Mutex<HashSet<DraftKey>>>,
    status: watch::Sender<SaveStatus>,
}

impl AutoSavePersistor {
    pub fn new(store: Arc<dyn DocumentStore>, flags: FlagStore) -> Self {
        let (status, _) = watch::channel(SaveStatus::Ready);
        Self {
            store,
            flags,
            template_id: DEFAULT_TEMPLATE_ID.to_string(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            status,
        }
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = template_id.into();
        self
    }

    /// Live save status, including the transient "Saving..." state.
    pub fn status(&self) -> watch::Receiver<SaveStatus> {
        self.status.subscribe()
    }

    pub fn flags(&self) -> &FlagStore {
        &self.flags
    }

    /// One periodic attempt. Never fails; see [`SaveOutcome`].
    pub async fn tick(&self, draft: &DraftHandle, identity: Option<&Identity>) -> SaveOutcome {
        self.run(draft, identity, false).await
    }

    /// Explicit save from the user. Writes even when nothing changed.
    pub async fn save_now(
        &self,
        draft: &DraftHandle,
        identity: Option<&Identity>,
    ) -> Result<SaveReceipt, SaveError> {
        match self.run(draft, identity, true).await {
            SaveOutcome::Saved { remote_id, created } => Ok(SaveReceipt {
                remote_id: Some(remote_id),
                created,
            }),
            SaveOutcome::SavedLocally => Ok(SaveReceipt {
                remote_id: None,
                created: false,
            }),
            SaveOutcome::Skipped(SkipReason::NoName) => Err(SaveError::NoName),
            SaveOutcome::Skipped(SkipReason::InFlight) => Err(SaveError::InFlight),
            SaveOutcome::Skipped(SkipReason::Unchanged) => Ok(SaveReceipt {
                remote_id: draft.lock().remote_id.clone(),
                created: false,
            }),
            SaveOutcome::Failed(FailReason::AuthMissing) => Err(SaveError::AuthMissing),
            SaveOutcome::Failed(FailReason::Encode(msg)) => Err(SaveError::Encode(msg)),
            SaveOutcome::Failed(FailReason::Remote(msg) | FailReason::Storage(msg)) => {
                Err(SaveError::Failed(msg))
            }
            SaveOutcome::Discarded => Err(SaveError::Discarded),
        }
    }

    async fn run(&self, draft: &DraftHandle, identity: Option<&Identity>, force: bool) -> SaveOutcome {
        let snapshot = draft.snapshot();
        if !snapshot.has_name() {
            debug!("auto-save skipped: no name");
            return SaveOutcome::Skipped(SkipReason::NoName);
        }

        let digest = match DraftDigest::of(&snapshot) {
            Ok(d) => d,
            Err(e) => {
                error!("auto-save could not hash draft {}: {}", snapshot.key, e);
                return self.publish(SaveOutcome::Failed(FailReason::Encode(e.to_string())));
            }
        };
        if !force && digest.matches_persisted(&snapshot) {
            debug!("auto-save skipped: no changes since last save");
            return SaveOutcome::Skipped(SkipReason::Unchanged);
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, snapshot.key) else {
            debug!("auto-save skipped: write already in flight for {}", snapshot.key);
            return SaveOutcome::Skipped(SkipReason::InFlight);
        };
        self.status.send_replace(SaveStatus::Saving);

        if self.flags.is_set(FlagKey::GuestMode) {
            let outcome = match self.save_locally(&snapshot) {
                Ok(()) if self.commit(draft, &snapshot, &digest, None) => SaveOutcome::SavedLocally,
                Ok(()) => SaveOutcome::Discarded,
                Err(e) => SaveOutcome::Failed(e),
            };
            return self.publish(outcome);
        }

        let Some(identity) = identity else {
            debug!("auto-save: no authenticated user");
            return self.publish(SaveOutcome::Failed(FailReason::AuthMissing));
        };

        let outcome = match self.write_remote(&snapshot, identity).await {
            Ok((record, created)) => {
                if self.commit(draft, &snapshot, &digest, Some(&record.id)) {
                    info!(
                        "saved CV {:?} as {} ({})",
                        snapshot.trimmed_name(),
                        record.id,
                        if created { "created" } else { "updated" }
                    );
                    SaveOutcome::Saved {
                        remote_id: record.id,
                        created,
                    }
                } else {
                    debug!("draft {} changed during save; result discarded", snapshot.key);
                    SaveOutcome::Discarded
                }
            }
            Err(e) => {
                if self.is_stale(draft, &snapshot) {
                    SaveOutcome::Discarded
                } else {
                    error!("auto-save failed for {:?}: {}", snapshot.trimmed_name(), e);
                    SaveOutcome::Failed(FailReason::Remote(e.to_string()))
                }
            }
        };
        self.publish(outcome)
    }

    fn publish(&self, outcome: SaveOutcome) -> SaveOutcome {
        match outcome.status() {
            Some(status) => {
                self.status.send_replace(status);
            }
            None if outcome == SaveOutcome::Discarded => {
                self.status.send_replace(SaveStatus::Ready);
            }
            None => {}
        }
        outcome
    }

    fn save_locally(&self, snapshot: &CvDraft) -> Result<(), FailReason> {
        let json =
            serde_json::to_string(snapshot).map_err(|e| FailReason::Encode(e.to_string()))?;
        self.flags
            .set(FlagKey::GuestDraft, &json)
            .map_err(|e| FailReason::Storage(e.to_string()))
    }

    fn is_stale(&self, draft: &DraftHandle, snapshot: &CvDraft) -> bool {
        draft.is_retired() || draft.lock().key != snapshot.key
    }

    /// Record a finished write on the live draft, unless it moved on.
    fn commit(
        &self,
        draft: &DraftHandle,
        snapshot: &CvDraft,
        digest: &DraftDigest,
        remote_id: Option<&str>,
    ) -> bool {
        {
            let mut live = draft.lock();
            if draft.is_retired() || live.key != snapshot.key {
                return false;
            }
            if let Some(id) = remote_id {
                live.remote_id = Some(id.to_string());
            }
            live.last_persisted_hash = Some(digest.content.clone());
            live.last_persisted_image = digest.image.clone();
        }
        if let Some(id) = remote_id {
            self.remember(id);
        }
        true
    }

    fn remember(&self, id: &str) {
        if let Err(e) = self.flags.set(FlagKey::CurrentDraftId, id) {
            warn!("could not persist current CV id {}: {}", id, e);
        }
    }

    fn payload(&self, snapshot: &CvDraft, owner_id: &str) -> RecordPayload {
        let mut content = snapshot.fields.clone();
        if let Some(image) = &snapshot.profile_image {
            match serde_json::to_value(image) {
                Ok(v) => {
                    content.insert(PROFILE_IMAGE_FIELD.to_string(), v);
                }
                Err(e) => warn!(
                    "leaving profile image out of {:?}: {}",
                    snapshot.trimmed_name(),
                    e
                ),
            }
        }
        RecordPayload {
            owner_id: owner_id.to_string(),
            name: snapshot.trimmed_name().to_string(),
            template_id: self.template_id.clone(),
            content: Value::Object(content),
        }
    }

    async fn write_remote(
        &self,
        snapshot: &CvDraft,
        identity: &Identity,
    ) -> Result<(RemoteRecord, bool), RemoteError> {
        let scope = identity.scope();
        let mut payload = self.payload(snapshot, &identity.user_id);

        if let Some(id) = snapshot.remote_id.as_deref() {
            match self.store.get_by_id(id, &scope).await? {
                Some(existing) => {
                    // Admins editing someone else's CV must not take it over.
                    payload.owner_id = existing.owner_id;
                    let record = self.store.update(id, &payload, &scope).await?;
                    return Ok((record, false));
                }
                None => warn!("CV {} is no longer reachable; matching by name", id),
            }
        }

        let candidates = self
            .store
            .find_candidates_by_owner_and_name(&identity.user_id, &payload.name)
            .await?;
        if candidates.len() > 1 {
            warn!(
                count = candidates.len(),
                name = %payload.name,
                "DuplicateRiskDetected: several CVs share this name, updating the most recent"
            );
        }
        match most_recent(candidates) {
            Some(existing) => {
                let record = self.store.update(&existing.id, &payload, &scope).await?;
                Ok((record, false))
            }
            None => Ok((self.store.create(&payload).await?, true)),
        }
    }

    /// Restore the remote id remembered from an earlier session.
    pub fn recover_remote_id(&self, draft: &DraftHandle) -> Option<String> {
        let remembered = self.flags.get::<String>(FlagKey::CurrentDraftId);
        let mut live = draft.lock();
        if live.remote_id.is_none() {
            live.remote_id = remembered.filter(|id| !id.trim().is_empty());
        }
        live.remote_id.clone()
    }

    /// Give a named draft without an id the id of its existing remote record.
    pub async fn adopt_existing(
        &self,
        draft: &DraftHandle,
        identity: &Identity,
    ) -> Result<Option<String>, RemoteError> {
        let snapshot = draft.snapshot();
        if snapshot.remote_id.is_some() || !snapshot.has_name() {
            return Ok(snapshot.remote_id);
        }
        let found = self
            .store
            .find_by_owner_and_name(&identity.user_id, snapshot.trimmed_name())
            .await?;
        let Some(record) = found else {
            return Ok(None);
        };
        {
            let mut live = draft.lock();
            if draft.is_retired() || live.key != snapshot.key {
                return Ok(None);
            }
            live.remote_id = Some(record.id.clone());
        }
        self.remember(&record.id);
        Ok(Some(record.id))
    }

    /// Replace the draft with a stored CV.
    pub async fn load(
        &self,
        draft: &DraftHandle,
        id: &str,
        identity: &Identity,
    ) -> Result<(), SaveError> {
        let record = self
            .store
            .get_by_id(id, &identity.scope())
            .await?
            .ok_or_else(|| SaveError::NotFound(id.to_string()))?;

        let mut loaded = draft_from_record(&record);
        let digest = DraftDigest::of(&loaded).map_err(|e| SaveError::Encode(e.to_string()))?;
        loaded.last_persisted_hash = Some(digest.content);
        loaded.last_persisted_image = digest.image;
        *draft.lock() = loaded;

        self.flags.set(FlagKey::CurrentDraftId, &record.id)?;
        self.status.send_replace(SaveStatus::Ready);
        Ok(())
    }

    /// Start over with an empty draft that is not linked to any record.
    pub fn new_draft(&self, draft: &DraftHandle) -> Result<(), FlagError> {
        draft.lock().reset();
        self.status.send_replace(SaveStatus::Ready);
        self.flags.clear(FlagKey::CurrentDraftId)
    }

    /// Turn the draft into a renamed copy of itself. Signed in, the copy is
    /// created as a new record and becomes the current one; in guest mode it
    /// replaces the locally kept draft.
    pub async fn duplicate(
        &self,
        draft: &DraftHandle,
        identity: Option<&Identity>,
    ) -> Result<SaveReceipt, SaveError> {
        let snapshot = draft.snapshot();
        if !snapshot.has_name() {
            return Err(SaveError::NoName);
        }
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, snapshot.key) else {
            return Err(SaveError::InFlight);
        };
        let mut copy = snapshot.clone();
        copy.name = duplicate_display_name(&snapshot.name);

        if self.flags.is_set(FlagKey::GuestMode) {
            copy.remote_id = None;
            self.save_locally(&copy).map_err(|e| match e {
                FailReason::AuthMissing => SaveError::AuthMissing,
                FailReason::Encode(msg) => SaveError::Encode(msg),
                FailReason::Remote(msg) | FailReason::Storage(msg) => SaveError::Failed(msg),
            })?;
            self.adopt_copy(draft, &snapshot, &copy)?;
            if let Err(e) = self.flags.clear(FlagKey::CurrentDraftId) {
                warn!("could not forget current CV id: {}", e);
            }
            info!("duplicated CV {:?} locally (guest mode)", snapshot.trimmed_name());
            self.status.send_replace(SaveStatus::DuplicatedLocally);
            return Ok(SaveReceipt {
                remote_id: None,
                created: true,
            });
        }

        let identity = identity.ok_or(SaveError::AuthMissing)?;
        self.status.send_replace(SaveStatus::Saving);
        let payload = self.payload(&copy, &identity.user_id);
        let record = match self.store.create(&payload).await {
            Ok(record) => record,
            Err(e) => {
                error!("duplicating {:?} failed: {}", snapshot.trimmed_name(), e);
                self.status.send_replace(SaveStatus::Failed(e.to_string()));
                return Err(e.into());
            }
        };
        copy.remote_id = Some(record.id.clone());
        if let Err(e) = self.adopt_copy(draft, &snapshot, &copy) {
            warn!("copy {} created but the draft moved on", record.id);
            self.status.send_replace(SaveStatus::Ready);
            return Err(e);
        }
        self.remember(&record.id);
        info!("duplicated CV {:?} as {}", snapshot.trimmed_name(), record.id);
        self.status.send_replace(SaveStatus::Duplicated);
        Ok(SaveReceipt {
            remote_id: Some(record.id),
            created: true,
        })
    }

    /// Point the live draft at its copy. The copy counts as persisted unless
    /// the content was edited while it was being written.
    fn adopt_copy(
        &self,
        draft: &DraftHandle,
        snapshot: &CvDraft,
        copy: &CvDraft,
    ) -> Result<(), SaveError> {
        let digest = DraftDigest::of(copy).map_err(|e| SaveError::Encode(e.to_string()))?;
        let mut live = draft.lock();
        if draft.is_retired() || live.key != snapshot.key {
            return Err(SaveError::Discarded);
        }
        let untouched =
            live.fields == snapshot.fields && live.profile_image == snapshot.profile_image;
        live.name = copy.name.clone();
        live.remote_id = copy.remote_id.clone();
        if untouched {
            live.last_persisted_hash = Some(digest.content);
            live.last_persisted_image = digest.image;
        }
        Ok(())
    }

    /// Bring back the draft kept locally in guest mode.
    pub fn restore_guest_draft(&self, draft: &DraftHandle) -> bool {
        let Some(json) = self.flags.get::<String>(FlagKey::GuestDraft) else {
            return false;
        };
        match serde_json::from_str::<CvDraft>(&json) {
            Ok(restored) => {
                *draft.lock() = restored;
                true
            }
            Err(e) => {
                warn!("discarding unreadable guest draft: {}", e);
                false
            }
        }
    }
}

fn draft_from_record(record: &RemoteRecord) -> CvDraft {
    let mut fields: CvFields = match &record.content {
        Value::Object(map) => map.clone(),
        _ => CvFields::new(),
    };
    let profile_image = fields.remove(PROFILE_IMAGE_FIELD).and_then(|v| {
        serde_json::from_value::<Attachment>(v)
            .map_err(|e| warn!("ignoring unreadable profile image on CV {}: {}", record.id, e))
            .ok()
    });
    CvDraft {
        remote_id: Some(record.id.clone()),
        name: record.name.clone(),
        fields,
        profile_image,
        ..CvDraft::default()
    }
}
