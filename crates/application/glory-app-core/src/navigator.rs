use std::sync::Arc;

use glory_core::{IntentFlags, Section, SignalSnapshot, SubView, UserActions, ViewState};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::FlagError;
use crate::flags::{FlagKey, FlagOwner, FlagStore};
use crate::resolver::{resolve, Resolution};

/// Where the document currently is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub fragment: String,
}

impl Location {
    pub fn new(path: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fragment: fragment.into(),
        }
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self::new(path, "")
    }
}

/// Authentication as seen by the renderer at capture time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthView {
    pub authenticated: bool,
    pub loading: bool,
}

/// Owns the effectful half of navigation: capturing signals, applying the
/// resolver's mutations, and remembering the last section shown.
pub struct Navigator {
    flags: FlagStore,
    clock: Arc<dyn Clock>,
    last_known: Option<Section>,
    visited_marketplace: bool,
}

impl Navigator {
    pub fn new(flags: FlagStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            flags,
            clock,
            last_known: None,
            visited_marketplace: false,
        }
    }

    pub fn flags(&self) -> &FlagStore {
        &self.flags
    }

    pub fn last_known_section(&self) -> Option<Section> {
        self.last_known
    }

    pub fn capture(&self, location: &Location, auth: AuthView) -> SignalSnapshot {
        let f = &self.flags;
        SignalSnapshot {
            path: location.path.clone(),
            fragment: location.fragment.clone(),
            intents: IntentFlags {
                navigate_to_section_a: f.is_set(FlagKey::NavigateToSectionA),
                navigate_to_section_b: f.is_set(FlagKey::NavigateToSectionB),
                navigate_home: f.is_set(FlagKey::NavigateHome),
            },
            actions: UserActions {
                continue_editing: f.is_set(FlagKey::ContinueEditing),
                continue_printing: f.is_set(FlagKey::ContinuePrinting),
            },
            durable_section: f.get::<Section>(FlagKey::SelectedSection),
            last_known_section: self.last_known,
            cv_view_mode: f.get::<SubView>(FlagKey::CvViewMode),
            id_card_view_mode: f.get::<SubView>(FlagKey::IdCardViewMode),
            explicitly_visited_marketplace: self.visited_marketplace,
            authenticated: auth.authenticated,
            loading: auth.loading,
        }
    }

    /// Capture, resolve, apply. Mutations land before the view is returned,
    /// so the next capture already sees them.
    pub fn resolve_and_apply(
        &mut self,
        location: &Location,
        auth: AuthView,
    ) -> Result<ViewState, FlagError> {
        let snapshot = self.capture(location, auth);
        let Resolution { view, mutations } = resolve(&snapshot);
        if !mutations.is_empty() {
            debug!(?mutations, "applying navigation mutations");
            self.flags.apply(&mutations, FlagOwner::Resolver)?;
        }
        if !view.is_special() && view.section.is_restorable() {
            self.last_known = Some(view.section);
        }
        Ok(view)
    }

    fn mark_navigation(&self) -> Result<(), FlagError> {
        self.flags
            .stamp(FlagKey::NavigatingSince, self.clock.as_ref())
            .map(|_| ())
    }

    /// In-app request for a section. The intent and the navigation marker are
    /// written before this returns.
    pub fn request_section(&mut self, section: Section) -> Result<(), FlagError> {
        let intent = match section {
            Section::CvBuilder => FlagKey::NavigateToSectionA,
            Section::IdCardPrint => FlagKey::NavigateToSectionB,
            Section::Home => FlagKey::NavigateHome,
            Section::Marketplace => return self.visit_marketplace(),
            Section::Admin | Section::Shopkeeper => {
                warn!("{section} is only reachable through its route");
                return Ok(());
            }
        };
        self.visited_marketplace = false;
        self.mark_navigation()?;
        self.flags.raise(intent)
    }

    pub fn visit_marketplace(&mut self) -> Result<(), FlagError> {
        self.visited_marketplace = true;
        self.mark_navigation()?;
        self.flags
            .set(FlagKey::SelectedSection, Section::Marketplace.as_str())
    }

    pub fn continue_editing(&mut self) -> Result<(), FlagError> {
        self.flags.raise(FlagKey::ContinueEditing)?;
        self.request_section(Section::CvBuilder)
    }

    pub fn continue_printing(&mut self) -> Result<(), FlagError> {
        self.flags.raise(FlagKey::ContinuePrinting)?;
        self.request_section(Section::IdCardPrint)
    }

    /// Leave the editor or print view for the section's dashboard.
    pub fn show_dashboard(&self, section: Section) -> Result<(), FlagError> {
        let key = match section {
            Section::CvBuilder => FlagKey::CvViewMode,
            Section::IdCardPrint => FlagKey::IdCardViewMode,
            _ => return Ok(()),
        };
        self.flags.set(key, SubView::Dashboard.as_str())
    }

    pub fn go_home(&mut self) -> Result<(), FlagError> {
        self.request_section(Section::Home)
    }
}
