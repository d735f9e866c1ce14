use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::api::{validate_key, ScopeBackend, ScopeWrite};
use crate::StorageError;

/// Volatile scope. Used for the session scope, which must vanish together
/// with the scripting context, and as a test double for the durable scope.
#[derive(Debug, Default)]
pub struct MemoryScopeStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryScopeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ScopeBackend for MemoryScopeStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }

    fn apply(&self, writes: &[ScopeWrite]) -> Result<(), StorageError> {
        for w in writes {
            validate_key(w.key())?;
        }
        let mut entries = self.lock();
        for w in writes {
            match w {
                ScopeWrite::Set { key, value } => {
                    entries.insert(key.clone(), value.clone());
                }
                ScopeWrite::Remove { key } => {
                    entries.remove(key);
                }
            }
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.lock().keys().cloned().collect())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.lock().clear();
        Ok(())
    }
}
