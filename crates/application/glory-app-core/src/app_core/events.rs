use glory_core::{DraftKey, Identity, ViewState};

use crate::autosave::{SaveOutcome, SaveStatus};
use crate::domain::GlorySettings;
use crate::session::SessionState;

#[derive(Debug, Clone)]
pub enum DomainEvent {
    // Boot state
    BootLoadingStarted,
    SettingsLoaded(GlorySettings),
    BootFailed { message: String },

    // Navigation
    ViewResolved(ViewState),

    // Auto-save
    ActiveDraftChanged(Option<DraftKey>),
    AutoSave { key: DraftKey, outcome: SaveOutcome },
    SaveStatusChanged(SaveStatus),

    // Identity & session
    IdentityChanged(Option<Identity>),
    SessionChanged(SessionState),

    // User-visible errors
    UserError(String),
}
