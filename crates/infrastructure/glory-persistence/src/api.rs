pub const FLAGS_REDB_FILENAME: &str = "flags.redb";
pub const CURRENT_SCHEMA: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbState {
    Missing,
    Valid,
    Busy,
    Corrupt,
    NewerSchema { found: u32, supported: u32 },
}

/// One write in a batch applied by [`ScopeBackend::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeWrite {
    Set { key: String, value: String },
    Remove { key: String },
}

impl ScopeWrite {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self::Remove { key: key.into() }
    }

    pub fn key(&self) -> &str {
        match self {
            ScopeWrite::Set { key, .. } | ScopeWrite::Remove { key } => key,
        }
    }
}

/// Raw string key/value storage for one persistence scope.
///
/// Values are opaque here; typing and parsing happen one layer up.
pub trait ScopeBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, crate::StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), crate::StorageError>;

    fn remove(&self, key: &str) -> Result<(), crate::StorageError>;

    /// Apply every write or none of them.
    fn apply(&self, writes: &[ScopeWrite]) -> Result<(), crate::StorageError>;

    fn keys(&self) -> Result<Vec<String>, crate::StorageError>;

    fn clear(&self) -> Result<(), crate::StorageError>;
}

pub(crate) fn validate_key(key: &str) -> Result<(), crate::StorageError> {
    if key.is_empty() || key.chars().any(char::is_control) {
        return Err(crate::StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
