use std::sync::Arc;
use std::time::Duration;

use glory_core::Identity;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::handle::DraftHandle;
use super::persistor::AutoSavePersistor;
use super::status::SaveOutcome;
use crate::app_core::DomainEvent;
use crate::domain::GlorySettings;

/// Fixed-period auto-save timer for one draft.
///
/// Each tick runs in its own task so stopping the timer never aborts a write
/// that already started; such a write finishes against a retired draft and
/// its result is dropped.
pub struct AutoSaveScheduler {
    cancel: CancellationToken,
    nudge: Arc<Notify>,
    draft: DraftHandle,
    task: Option<JoinHandle<()>>,
}

impl AutoSaveScheduler {
    /// [`Self::spawn`] with the configured period.
    pub fn from_settings(
        persistor: Arc<AutoSavePersistor>,
        draft: DraftHandle,
        identity: watch::Receiver<Option<Identity>>,
        settings: &GlorySettings,
        events: mpsc::Sender<DomainEvent>,
    ) -> Self {
        Self::spawn(persistor, draft, identity, settings.autosave_period(), events)
    }

    /// Save statuses published by the persistor, including "Saving...", are
    /// forwarded as [`DomainEvent::SaveStatusChanged`].
    pub fn spawn(
        persistor: Arc<AutoSavePersistor>,
        draft: DraftHandle,
        identity: watch::Receiver<Option<Identity>>,
        period: Duration,
        events: mpsc::Sender<DomainEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let nudge = Arc::new(Notify::new());
        let token = cancel.clone();
        let wake = nudge.clone();
        let handle = draft.clone();

        let mut status = persistor.status();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    Ok(()) = status.changed() => {
                        let current = status.borrow_and_update().clone();
                        let _ = events.send(DomainEvent::SaveStatusChanged(current)).await;
                        continue;
                    }
                    _ = ticker.tick() => {}
                    _ = wake.notified() => {}
                }
                let persistor = persistor.clone();
                let draft = handle.clone();
                let identity = identity.borrow().clone();
                let events = events.clone();
                tokio::spawn(async move {
                    let key = draft.lock().key;
                    let outcome = persistor.tick(&draft, identity.as_ref()).await;
                    if !matches!(outcome, SaveOutcome::Skipped(_)) {
                        let _ = events.send(DomainEvent::AutoSave { key, outcome }).await;
                    }
                });
            }
            debug!("auto-save timer stopped");
        });

        Self {
            cancel,
            nudge,
            draft,
            task: Some(task),
        }
    }

    /// Run a tick now instead of waiting for the timer.
    pub fn save_soon(&self) {
        self.nudge.notify_one();
    }

    pub fn draft(&self) -> &DraftHandle {
        &self.draft
    }

    /// Stop the timer and retire the draft, waiting for the timer task to end.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        self.draft.retire();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for AutoSaveScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.draft.retire();
    }
}
