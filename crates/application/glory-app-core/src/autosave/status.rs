use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoName,
    Unchanged,
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailReason {
    AuthMissing,
    Remote(String),
    Storage(String),
    Encode(String),
}

/// Result of one auto-save attempt. Never an error: failures are data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { remote_id: String, created: bool },
    SavedLocally,
    Skipped(SkipReason),
    Failed(FailReason),
    /// The draft was reset or retired while the write was in flight.
    Discarded,
}

impl SaveOutcome {
    /// Status to show for this outcome; `None` keeps the previous one.
    pub fn status(&self) -> Option<SaveStatus> {
        match self {
            SaveOutcome::Saved { .. } => Some(SaveStatus::Saved),
            SaveOutcome::SavedLocally => Some(SaveStatus::SavedLocally),
            SaveOutcome::Failed(FailReason::AuthMissing) => Some(SaveStatus::LoginRequired),
            SaveOutcome::Failed(
                FailReason::Remote(msg) | FailReason::Storage(msg) | FailReason::Encode(msg),
            ) => Some(SaveStatus::Failed(msg.clone())),
            SaveOutcome::Skipped(_) | SaveOutcome::Discarded => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SaveStatus {
    #[default]
    Ready,
    Saving,
    Saved,
    SavedLocally,
    Duplicated,
    DuplicatedLocally,
    LoginRequired,
    Failed(String),
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveStatus::Ready => f.write_str("Ready"),
            SaveStatus::Saving => f.write_str("Saving..."),
            SaveStatus::Saved => f.write_str("Saved"),
            SaveStatus::SavedLocally => f.write_str("Saved locally (Guest mode)"),
            SaveStatus::Duplicated => f.write_str("Duplicated - Saved"),
            SaveStatus::DuplicatedLocally => f.write_str("Duplicated (Guest mode)"),
            SaveStatus::LoginRequired => f.write_str("Please log in to save"),
            SaveStatus::Failed(msg) => write!(f, "Auto-save failed: {msg}"),
        }
    }
}
