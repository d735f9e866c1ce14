//! Persisted navigation and session flags.
//!
//! Two scopes back the store: the durable scope survives restarts, the
//! session scope lives as long as the tab. One-shot flags have exactly one
//! owner allowed to consume them; everyone else may only set them.

use std::str::FromStr;
use std::sync::Arc;

use glory_persistence::{MemoryScopeStore, ScopeBackend, ScopeWrite};
use tracing::warn;

use crate::clock::Clock;
use crate::error::{FlagError, SignalReadError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagScope {
    Durable,
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagOwner {
    Resolver,
    SessionGuard,
}

impl std::fmt::Display for FlagOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FlagOwner::Resolver => "resolver",
            FlagOwner::SessionGuard => "session guard",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagKey {
    // durable
    SelectedSection,
    CvViewMode,
    IdCardViewMode,
    CurrentDraftId,
    AuthCache,
    AuthIdentity,
    GuestMode,
    GuestDraft,
    AdminAccess,
    // session
    NavigateToSectionA,
    NavigateToSectionB,
    NavigateHome,
    NavigatingSince,
    ReloadingSince,
    JustAuthenticatedAt,
    ContinueEditing,
    ContinuePrinting,
}

impl FlagKey {
    pub const ALL: [FlagKey; 17] = [
        FlagKey::SelectedSection,
        FlagKey::CvViewMode,
        FlagKey::IdCardViewMode,
        FlagKey::CurrentDraftId,
        FlagKey::AuthCache,
        FlagKey::AuthIdentity,
        FlagKey::GuestMode,
        FlagKey::GuestDraft,
        FlagKey::AdminAccess,
        FlagKey::NavigateToSectionA,
        FlagKey::NavigateToSectionB,
        FlagKey::NavigateHome,
        FlagKey::NavigatingSince,
        FlagKey::ReloadingSince,
        FlagKey::JustAuthenticatedAt,
        FlagKey::ContinueEditing,
        FlagKey::ContinuePrinting,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            FlagKey::SelectedSection => "selectedSection",
            FlagKey::CvViewMode => "cvViewMode",
            FlagKey::IdCardViewMode => "idCardViewMode",
            FlagKey::CurrentDraftId => "currentDraftId",
            FlagKey::AuthCache => "authCache",
            FlagKey::AuthIdentity => "authIdentity",
            FlagKey::GuestMode => "guestMode",
            FlagKey::GuestDraft => "guestDraft",
            FlagKey::AdminAccess => "adminAccess",
            FlagKey::NavigateToSectionA => "navigateToSectionA",
            FlagKey::NavigateToSectionB => "navigateToSectionB",
            FlagKey::NavigateHome => "navigateHome",
            FlagKey::NavigatingSince => "navigatingSince",
            FlagKey::ReloadingSince => "reloadingSince",
            FlagKey::JustAuthenticatedAt => "justAuthenticatedAt",
            FlagKey::ContinueEditing => "continueEditing",
            FlagKey::ContinuePrinting => "continuePrinting",
        }
    }

    pub const fn scope(self) -> FlagScope {
        match self {
            FlagKey::SelectedSection
            | FlagKey::CvViewMode
            | FlagKey::IdCardViewMode
            | FlagKey::CurrentDraftId
            | FlagKey::AuthCache
            | FlagKey::AuthIdentity
            | FlagKey::GuestMode
            | FlagKey::GuestDraft
            | FlagKey::AdminAccess => FlagScope::Durable,
            _ => FlagScope::Session,
        }
    }

    /// The only component allowed to clear this flag, for one-shot flags.
    pub const fn owner(self) -> Option<FlagOwner> {
        match self {
            FlagKey::NavigateToSectionA
            | FlagKey::NavigateToSectionB
            | FlagKey::NavigateHome
            | FlagKey::ContinueEditing
            | FlagKey::ContinuePrinting => Some(FlagOwner::Resolver),
            FlagKey::NavigatingSince | FlagKey::ReloadingSince | FlagKey::JustAuthenticatedAt => {
                Some(FlagOwner::SessionGuard)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for FlagKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending write produced by a pure decision and applied later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagMutation {
    Set { key: FlagKey, value: String },
    Clear(FlagKey),
}

impl FlagMutation {
    pub fn set(key: FlagKey, value: impl Into<String>) -> Self {
        Self::Set {
            key,
            value: value.into(),
        }
    }

    pub fn key(&self) -> FlagKey {
        match self {
            FlagMutation::Set { key, .. } | FlagMutation::Clear(key) => *key,
        }
    }

    fn to_write(&self) -> ScopeWrite {
        match self {
            FlagMutation::Set { key, value } => ScopeWrite::set(key.as_str(), value.as_str()),
            FlagMutation::Clear(key) => ScopeWrite::remove(key.as_str()),
        }
    }
}

#[derive(Clone)]
pub struct FlagStore {
    durable: Arc<dyn ScopeBackend>,
    session: Arc<dyn ScopeBackend>,
}

impl std::fmt::Debug for FlagStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlagStore").finish_non_exhaustive()
    }
}

impl FlagStore {
    pub fn new(durable: Arc<dyn ScopeBackend>, session: Arc<dyn ScopeBackend>) -> Self {
        Self { durable, session }
    }

    /// Both scopes in memory. Nothing outlives the process.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryScopeStore::new()),
            Arc::new(MemoryScopeStore::new()),
        )
    }

    fn backend(&self, scope: FlagScope) -> &dyn ScopeBackend {
        match scope {
            FlagScope::Durable => self.durable.as_ref(),
            FlagScope::Session => self.session.as_ref(),
        }
    }

    pub fn get_raw(&self, key: FlagKey) -> Result<Option<String>, FlagError> {
        Ok(self.backend(key.scope()).get(key.as_str())?)
    }

    /// Typed read that separates "absent" from "unreadable".
    pub fn read<T>(&self, key: FlagKey) -> Result<Option<T>, SignalReadError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.get_raw(key).map_err(|e| SignalReadError {
            key,
            value: String::new(),
            reason: e.to_string(),
        })?;
        match raw {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| SignalReadError {
                    key,
                    value,
                    reason: e.to_string(),
                }),
        }
    }

    /// Typed read where an unreadable value counts as absent.
    pub fn get<T>(&self, key: FlagKey) -> Option<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.read(key) {
            Ok(v) => v,
            Err(e) => {
                warn!("{e}");
                None
            }
        }
    }

    pub fn is_set(&self, key: FlagKey) -> bool {
        self.get::<bool>(key).unwrap_or(false)
    }

    pub fn set(&self, key: FlagKey, value: &str) -> Result<(), FlagError> {
        Ok(self.backend(key.scope()).set(key.as_str(), value)?)
    }

    pub fn raise(&self, key: FlagKey) -> Result<(), FlagError> {
        self.set(key, "true")
    }

    pub fn stamp(&self, key: FlagKey, clock: &dyn Clock) -> Result<i64, FlagError> {
        let now = clock.now_ms();
        self.set(key, &now.to_string())?;
        Ok(now)
    }

    /// Remove a flag nobody owns. One-shot flags go through [`Self::consume`].
    pub fn clear(&self, key: FlagKey) -> Result<(), FlagError> {
        if let Some(owner) = key.owner() {
            return Err(FlagError::NotOwner { key, owner });
        }
        self.remove(key)
    }

    fn remove(&self, key: FlagKey) -> Result<(), FlagError> {
        Ok(self.backend(key.scope()).remove(key.as_str())?)
    }

    /// Read a one-shot flag and clear it. Only the flag's owner may do this.
    pub fn consume(&self, key: FlagKey, by: FlagOwner) -> Result<bool, FlagError> {
        check_owner(key, by)?;
        let was_set = self.get_raw(key)?.is_some();
        if was_set {
            self.remove(key)?;
        }
        Ok(was_set)
    }

    /// Apply a batch on behalf of `by`. Nothing is written unless `by` may
    /// clear every owned flag in the batch. Each scope commits its share in
    /// one write; a failed session write restores the durable scope.
    pub fn apply(&self, mutations: &[FlagMutation], by: FlagOwner) -> Result<(), FlagError> {
        for m in mutations {
            if let FlagMutation::Clear(key) = m {
                check_owner(*key, by)?;
            }
        }

        let writes_for = |scope: FlagScope| -> Vec<ScopeWrite> {
            mutations
                .iter()
                .filter(|m| m.key().scope() == scope)
                .map(FlagMutation::to_write)
                .collect()
        };
        let durable = writes_for(FlagScope::Durable);
        let session = writes_for(FlagScope::Session);

        let undo = if durable.is_empty() || session.is_empty() {
            Vec::new()
        } else {
            self.undo_writes(&durable)?
        };
        if !durable.is_empty() {
            self.durable.apply(&durable)?;
        }
        if !session.is_empty() {
            if let Err(e) = self.session.apply(&session) {
                if !undo.is_empty() {
                    if let Err(rollback) = self.durable.apply(&undo) {
                        warn!("could not restore durable flags: {}", rollback);
                    }
                }
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Writes that put the durable keys touched by `writes` back as they are now.
    fn undo_writes(&self, writes: &[ScopeWrite]) -> Result<Vec<ScopeWrite>, FlagError> {
        let mut undo = Vec::with_capacity(writes.len());
        for w in writes {
            let key = w.key();
            undo.push(match self.durable.get(key)? {
                Some(prev) => ScopeWrite::set(key, prev),
                None => ScopeWrite::remove(key),
            });
        }
        Ok(undo)
    }
}

fn check_owner(key: FlagKey, by: FlagOwner) -> Result<(), FlagError> {
    match key.owner() {
        Some(owner) if owner != by => Err(FlagError::NotOwner { key, owner }),
        _ => Ok(()),
    }
}
