use crate::domain::{AppState, BootState};

use super::events::DomainEvent;

pub fn reduce(mut state: AppState, ev: DomainEvent) -> AppState {
    match ev {
        DomainEvent::BootLoadingStarted => {
            state.boot = BootState::Loading;
        }

        DomainEvent::SettingsLoaded(settings) => {
            state.settings = settings;
            state.boot = BootState::Ready;
        }

        DomainEvent::BootFailed { message } => {
            state.boot = BootState::Failed(message);
        }

        DomainEvent::ViewResolved(view) => state.view = view,

        DomainEvent::ActiveDraftChanged(key) => {
            state.active_draft = key;
            state.save_status = Default::default();
        }

        DomainEvent::AutoSave { key: _, outcome } => {
            if let Some(status) = outcome.status() {
                state.save_status = status;
            }
        }

        DomainEvent::SaveStatusChanged(status) => state.save_status = status,

        DomainEvent::IdentityChanged(identity) => state.identity = identity,

        DomainEvent::SessionChanged(session) => state.session = session,

        DomainEvent::UserError(msg) => {
            state.error = Some(msg);
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autosave::{FailReason, SaveOutcome, SaveStatus, SkipReason};
    use glory_core::DraftKey;

    #[test]
    fn skipped_saves_keep_the_previous_status() {
        let key = DraftKey::new();
        let state = reduce(
            AppState::default(),
            DomainEvent::AutoSave {
                key,
                outcome: SaveOutcome::Saved {
                    remote_id: "cv-1".into(),
                    created: true,
                },
            },
        );
        assert_eq!(state.save_status, SaveStatus::Saved);

        let state = reduce(
            state,
            DomainEvent::AutoSave {
                key,
                outcome: SaveOutcome::Skipped(SkipReason::Unchanged),
            },
        );
        assert_eq!(state.save_status, SaveStatus::Saved);

        let state = reduce(
            state,
            DomainEvent::AutoSave {
                key,
                outcome: SaveOutcome::Failed(FailReason::Remote("offline".into())),
            },
        );
        assert_eq!(state.save_status.to_string(), "Auto-save failed: offline");
    }
}
