use glory_infra::NetError;
use glory_persistence::StorageError;

use crate::flags::{FlagKey, FlagOwner};

#[derive(Debug, thiserror::Error)]
pub enum FlagError {
    #[error("flag storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error("{key} may only be cleared by the {owner}")]
    NotOwner { key: FlagKey, owner: FlagOwner },
}

/// A persisted flag held a value that does not parse. Readers treat the flag
/// as absent.
#[derive(Debug, thiserror::Error)]
#[error("unreadable value {value:?} for {key}: {reason}")]
pub struct SignalReadError {
    pub key: FlagKey,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("{0}")]
    Unavailable(String),
    #[error("{message} (status {status})")]
    Rejected { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<NetError> for RemoteError {
    fn from(value: NetError) -> Self {
        match value {
            NetError::Status { status, body } => Self::Rejected {
                status,
                message: body,
            },
            NetError::Decode(msg) => Self::Decode(msg),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("identity provider did not answer within {0:?}")]
pub struct IdentityTimeout(pub std::time::Duration);

/// Errors from explicit save actions. The periodic path never surfaces these;
/// it reports a [`crate::autosave::SaveOutcome`] instead.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("Please enter a name before saving")]
    NoName,
    #[error("Please log in to save")]
    AuthMissing,
    #[error("A save is already in progress")]
    InFlight,
    #[error("CV {0} was not found")]
    NotFound(String),
    #[error("the draft was replaced while saving")]
    Discarded,
    #[error("could not encode draft: {0}")]
    Encode(String),
    #[error("Save failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Flags(#[from] FlagError),
}
