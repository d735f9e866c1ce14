use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glory_core::CvDraft;

/// Shared handle to the draft being edited.
///
/// Retiring the handle marks the draft as gone; saves that finish afterwards
/// leave it untouched.
#[derive(Debug, Clone, Default)]
pub struct DraftHandle {
    draft: Arc<Mutex<CvDraft>>,
    retired: Arc<AtomicBool>,
}

impl DraftHandle {
    pub fn new(draft: CvDraft) -> Self {
        Self {
            draft: Arc::new(Mutex::new(draft)),
            retired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, CvDraft> {
        self.draft.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> CvDraft {
        self.lock().clone()
    }

    pub fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }
}
