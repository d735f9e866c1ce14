mod handle;
mod persistor;
mod scheduler;
mod status;

pub use handle::DraftHandle;
pub use persistor::{AutoSavePersistor, SaveReceipt};
pub use scheduler::AutoSaveScheduler;
pub use status::{FailReason, SaveOutcome, SaveStatus, SkipReason};
