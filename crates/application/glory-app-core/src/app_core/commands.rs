use glory_core::{DraftKey, Section};

use crate::domain::GlorySettings;
use crate::navigator::{AuthView, Location};

#[derive(Debug, Clone)]
pub enum AppCommand {
    // Boot
    LoadInitialState,

    // Navigation
    ResolveView { location: Location, auth: AuthView },
    RequestSection(Section),
    VisitMarketplace,
    ContinueEditing,
    ContinuePrinting,
    ShowDashboard(Section),
    GoHome,

    // Drafts
    SetActiveDraft(Option<DraftKey>),

    // Settings
    SaveSettings(GlorySettings),
}
