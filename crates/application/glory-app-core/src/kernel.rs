use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::app_core::{AppCommand, AppStore, DomainEvent};
use crate::error::FlagError;
use crate::navigator::{AuthView, Location, Navigator};
use crate::ports::SettingsRepo;

pub struct AppKernel<S> {
    pub store: AppStore,
    settings: Arc<S>,
    navigator: Navigator,
    location: Location,
    auth: AuthView,

    tx: mpsc::Sender<DomainEvent>,
    rx: mpsc::Receiver<DomainEvent>,
}

impl<S> AppKernel<S>
where
    S: SettingsRepo,
{
    pub fn new(store: AppStore, settings: S, navigator: Navigator) -> Self {
        let (tx, rx) = mpsc::channel(glory_config::EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            settings: Arc::new(settings),
            navigator,
            location: Location::path("/"),
            auth: AuthView::default(),
            tx,
            rx,
        }
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn dispatch(&mut self, cmd: AppCommand) {
        match cmd {
            AppCommand::LoadInitialState => {
                self.store.apply(DomainEvent::BootLoadingStarted);
                let tx = self.tx.clone();
                let settings = self.settings.clone();
                let spawn_res = std::thread::Builder::new()
                    .name("glory-load-initial-state".into())
                    .spawn(move || {
                        let ev = match settings.load() {
                            Ok(s) => DomainEvent::SettingsLoaded(s),
                            Err(e) => DomainEvent::BootFailed {
                                message: format!("{e:#}"),
                            },
                        };
                        let _ = tx.blocking_send(ev);
                    });

                if let Err(e) = spawn_res {
                    self.store.apply(DomainEvent::BootFailed {
                        message: format!("Failed to start boot worker thread: {e}"),
                    });
                }
            }

            AppCommand::ResolveView { location, auth } => {
                self.location = location;
                self.auth = auth;
                self.resolve();
            }

            AppCommand::RequestSection(section) => {
                let res = self.navigator.request_section(section);
                self.after_navigation(res);
            }
            AppCommand::VisitMarketplace => {
                let res = self.navigator.visit_marketplace();
                self.after_navigation(res);
            }
            AppCommand::ContinueEditing => {
                let res = self.navigator.continue_editing();
                self.after_navigation(res);
            }
            AppCommand::ContinuePrinting => {
                let res = self.navigator.continue_printing();
                self.after_navigation(res);
            }
            AppCommand::GoHome => {
                let res = self.navigator.go_home();
                self.after_navigation(res);
            }
            AppCommand::ShowDashboard(section) => {
                let res = self.navigator.show_dashboard(section);
                match res {
                    Ok(()) => self.resolve(),
                    Err(e) => self.store.apply(DomainEvent::UserError(e.to_string())),
                }
            }

            AppCommand::SetActiveDraft(key) => {
                self.store.apply(DomainEvent::ActiveDraftChanged(key));
            }

            AppCommand::SaveSettings(settings) => {
                self.store.apply(DomainEvent::SettingsLoaded(settings.clone()));
                let repo = self.settings.clone();
                let tx = self.tx.clone();
                let spawn_res = std::thread::Builder::new()
                    .name("glory-save-settings".into())
                    .spawn(move || {
                        if let Err(e) = repo.save(&settings) {
                            let _ = tx.blocking_send(DomainEvent::UserError(format!("{e:#}")));
                        }
                    });
                if let Err(e) = spawn_res {
                    self.store.apply(DomainEvent::UserError(format!(
                        "Failed to start settings save worker thread: {e}"
                    )));
                }
            }
        }
    }

    /// In-app navigation reloads the bare root, where the written intents
    /// are picked up.
    fn after_navigation(&mut self, res: Result<(), FlagError>) {
        match res {
            Ok(()) => {
                self.location = Location::path("/");
                self.resolve();
            }
            Err(e) => self.store.apply(DomainEvent::UserError(e.to_string())),
        }
    }

    fn resolve(&mut self) {
        match self.navigator.resolve_and_apply(&self.location, self.auth) {
            Ok(view) => self.store.apply(DomainEvent::ViewResolved(view)),
            Err(e) => self.store.apply(DomainEvent::UserError(format!(
                "Could not persist navigation state: {e}"
            ))),
        }
    }

    pub fn tick(&mut self) {
        while let Ok(ev) = self.rx.try_recv() {
            if let DomainEvent::AutoSave { key, .. } = &ev {
                if self.store.state().active_draft != Some(*key) {
                    debug!(%key, "dropping auto-save result for inactive draft");
                    continue;
                }
            }
            self.store.apply(ev);
        }
    }

    pub fn sender(&self) -> mpsc::Sender<DomainEvent> {
        self.tx.clone()
    }
}
