//! Tells a closing tab apart from a reload or an in-app navigation.
//!
//! In-app triggers stamp `navigatingSince` / `reloadingSince` right before
//! they leave the page. When an unload signal arrives within the window of
//! such a stamp, the session is kept; otherwise the cached authentication is
//! dropped and the remote session is signed out.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app_core::DomainEvent;
use crate::clock::Clock;
use crate::domain::GlorySettings;
use crate::flags::{FlagKey, FlagOwner, FlagStore};
use crate::ports::IdentityProvider;

const MARKERS: [FlagKey; 3] = [
    FlagKey::NavigatingSince,
    FlagKey::ReloadingSince,
    FlagKey::JustAuthenticatedAt,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    BeforeUnload,
    PageHide,
    HiddenAndUnloading,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Active,
    RecentNavigation {
        expires_at_ms: i64,
    },
    /// Terminal until a new session starts.
    LoggedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadDecision {
    Navigation,
    AdminPreserved,
    SignedOut,
}

pub struct SessionGuard {
    flags: FlagStore,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    window_ms: i64,
    preserve_admin: bool,
    state: SessionState,
    events: Option<mpsc::Sender<DomainEvent>>,
}

impl SessionGuard {
    pub fn new(
        flags: FlagStore,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            flags,
            identity,
            clock,
            window_ms: glory_config::SESSION_NAVIGATION_WINDOW_MS,
            preserve_admin: true,
            state: SessionState::Active,
            events: None,
        }
    }

    pub fn from_settings(
        flags: FlagStore,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        settings: &GlorySettings,
    ) -> Self {
        Self::new(flags, identity, clock)
            .with_window_ms(settings.session_window_ms())
            .preserve_admin_sessions(settings.preserve_admin_sessions)
    }

    /// Report every state change as [`DomainEvent::SessionChanged`].
    pub fn with_events(mut self, events: mpsc::Sender<DomainEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_window_ms(mut self, window_ms: i64) -> Self {
        self.window_ms = window_ms.max(0);
        self
    }

    pub fn preserve_admin_sessions(mut self, preserve: bool) -> Self {
        self.preserve_admin = preserve;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        self.state = state;
        if let Some(events) = &self.events {
            if let Err(e) = events.try_send(DomainEvent::SessionChanged(state)) {
                debug!("session change not delivered: {}", e);
            }
        }
    }

    fn stamp(&mut self, key: FlagKey) {
        match self.flags.stamp(key, self.clock.as_ref()) {
            Ok(now) => {
                if self.state != SessionState::LoggedOut {
                    self.set_state(SessionState::RecentNavigation {
                        expires_at_ms: now + self.window_ms,
                    });
                }
            }
            Err(e) => warn!("could not stamp {}: {}", key, e),
        }
    }

    pub fn mark_navigation(&mut self) {
        self.stamp(FlagKey::NavigatingSince);
    }

    pub fn mark_reload(&mut self) {
        self.stamp(FlagKey::ReloadingSince);
    }

    /// A sign-in redirect is about to reload the page.
    pub fn mark_authenticated(&mut self) {
        self.stamp(FlagKey::JustAuthenticatedAt);
    }

    /// Start over after a fresh sign-in.
    pub fn restart(&mut self) {
        self.set_state(SessionState::Active);
    }

    /// Newest marker still inside the window, if any.
    fn recent_marker(&self, now: i64) -> Option<i64> {
        MARKERS
            .iter()
            .filter_map(|key| self.flags.get::<i64>(*key))
            .filter(|ts| now - ts < self.window_ms)
            .max()
    }

    pub fn on_lifecycle(&mut self, signal: LifecycleSignal) -> UnloadDecision {
        if self.state == SessionState::LoggedOut {
            return UnloadDecision::SignedOut;
        }
        let now = self.clock.now_ms();

        if let Some(ts) = self.recent_marker(now) {
            debug!(?signal, age_ms = now - ts, "unload during navigation, keeping session");
            self.set_state(SessionState::RecentNavigation {
                expires_at_ms: ts + self.window_ms,
            });
            return UnloadDecision::Navigation;
        }

        if self.preserve_admin && self.flags.is_set(FlagKey::AdminAccess) {
            debug!(?signal, "admin session preserved on close");
            return UnloadDecision::AdminPreserved;
        }

        info!(?signal, "tab closed, signing out");
        crate::identity::forget(&self.flags);
        if let Err(e) = self.flags.clear(FlagKey::CurrentDraftId) {
            warn!("could not clear {} on close: {}", FlagKey::CurrentDraftId, e);
        }
        self.sign_out_in_background();
        self.set_state(SessionState::LoggedOut);
        UnloadDecision::SignedOut
    }

    fn sign_out_in_background(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no async runtime, skipping remote sign-out");
            return;
        };
        let identity = self.identity.clone();
        runtime.spawn(async move {
            if let Err(e) = identity.sign_out().await {
                debug!("remote sign-out failed: {}", e);
            }
        });
    }

    /// The page became visible again: drop markers whose window has passed.
    pub fn on_page_shown(&mut self) {
        let now = self.clock.now_ms();
        for key in MARKERS {
            let Some(ts) = self.flags.get::<i64>(key) else {
                continue;
            };
            if now - ts >= self.window_ms {
                if let Err(e) = self.flags.consume(key, FlagOwner::SessionGuard) {
                    warn!("could not clear {}: {}", key, e);
                }
            }
        }
        if let SessionState::RecentNavigation { expires_at_ms } = self.state {
            if now >= expires_at_ms {
                self.set_state(SessionState::Active);
            }
        }
    }
}
