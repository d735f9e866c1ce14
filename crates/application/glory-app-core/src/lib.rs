pub mod app_core;
pub mod approval;
pub mod autosave;
pub mod clock;
pub mod domain;
pub mod error;
pub mod flags;
pub mod identity;
pub mod kernel;
pub mod navigator;
pub mod persistence;
pub mod ports;
pub mod remote;
pub mod resolver;
pub mod session;

pub use app_core::*;
pub use approval::{
    ApprovalPolicy, ApprovalPoller, ApprovalState, ApprovalStatus, PaymentStatusSource,
    PendingApproval,
};
pub use autosave::{
    AutoSavePersistor, AutoSaveScheduler, DraftHandle, FailReason, SaveOutcome, SaveReceipt,
    SaveStatus, SkipReason,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{AppState, BootState, GlorySettings, RemoteSettings};
pub use error::{FlagError, IdentityTimeout, RemoteError, SaveError, SignalReadError};
pub use flags::{FlagKey, FlagMutation, FlagOwner, FlagScope, FlagStore};
pub use identity::{AuthRecheck, IdentityCheck, IdentityGate, IdentitySource};
pub use kernel::AppKernel;
pub use navigator::{AuthView, Location, Navigator};
pub use persistence::FilePersistence;
pub use ports::*;
pub use remote::RestDocumentStore;
pub use resolver::{resolve, Resolution};
pub use session::{LifecycleSignal, SessionGuard, SessionState, UnloadDecision};

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// `info` filter. Safe to call more than once.
pub fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
