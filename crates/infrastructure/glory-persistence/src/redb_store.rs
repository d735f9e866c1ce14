use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};

use crate::api::{validate_key, DbState, ScopeBackend, ScopeWrite, CURRENT_SCHEMA};
use crate::maintenance::quarantine_corrupt_file;
use crate::StorageError;

const META: TableDefinition<&str, &str> = TableDefinition::new("meta");
const FLAGS: TableDefinition<&str, &str> = TableDefinition::new("flags");

const META_FORMAT_KEY: &str = "format";
const META_FORMAT_VALUE: &str = "glory-flags";
const META_SCHEMA_VERSION: &str = "schema_version";
const META_CREATED_AT: &str = "created_at";
const META_LAST_WRITE_AT: &str = "last_write_at";

type DbCache = Mutex<HashMap<Utf8PathBuf, Arc<Database>>>;

/// Durable scope backed by a single redb file. Survives restarts.
#[derive(Clone)]
pub struct RedbScopeStore {
    path: Utf8PathBuf,
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbScopeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbScopeStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RedbScopeStore {
    fn is_corrupt_open_error(err: &redb::DatabaseError) -> bool {
        match err {
            redb::DatabaseError::Storage(storage) => match storage {
                redb::StorageError::Corrupted(_) => true,
                redb::StorageError::Io(ioe) => matches!(
                    ioe.kind(),
                    std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof
                ),
                _ => false,
            },
            _ => false,
        }
    }

    fn db_cache() -> MutexGuard<'static, HashMap<Utf8PathBuf, Arc<Database>>> {
        static CACHE: OnceLock<DbCache> = OnceLock::new();
        CACHE
            .get_or_init(|| Mutex::new(HashMap::new()))
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the store at `path`, creating it when absent.
    ///
    /// A corrupt file is quarantined and [`StorageError::Corrupt`] returned;
    /// calling `open` again then starts from an empty store.
    pub fn open(path: impl Into<Utf8PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut cache = Self::db_cache();
        if let Some(existing) = cache.get(&path) {
            if path.exists() {
                return Ok(Self {
                    path,
                    db: existing.clone(),
                });
            }
            cache.remove(&path);
        }

        let db = if path.exists() {
            match Database::open(path.as_std_path()) {
                Ok(db) => db,
                Err(redb::DatabaseError::DatabaseAlreadyOpen) => {
                    return Err(StorageError::DatabaseAlreadyOpen);
                }
                Err(e) if Self::is_corrupt_open_error(&e) => {
                    let _ = quarantine_corrupt_file(&path);
                    return Err(StorageError::Corrupt);
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            tracing::debug!("creating flag store at {}", path);
            Database::create(path.as_std_path())?
        };

        if let Err(e) = Self::ensure_schema(&db) {
            drop(db);
            if matches!(e, StorageError::Corrupt) {
                let _ = quarantine_corrupt_file(&path);
            }
            return Err(e);
        }
        let db = Arc::new(db);
        cache.insert(path.clone(), db.clone());
        Ok(Self { path, db })
    }

    /// Open the store, recovering once from a quarantined corrupt file.
    pub fn open_or_recover(path: impl Into<Utf8PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        match Self::open(path.clone()) {
            Err(StorageError::Corrupt) => {
                tracing::warn!("flag store at {} was corrupt, starting empty", path);
                Self::open(path)
            }
            other => other,
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Inspect the file at `path` without keeping it open.
    pub fn validate(path: &Utf8Path) -> Result<DbState, StorageError> {
        if !path.exists() {
            return Ok(DbState::Missing);
        }
        {
            let mut cache = Self::db_cache();
            if cache.contains_key(path) {
                if !path.exists() {
                    cache.remove(path);
                    return Ok(DbState::Missing);
                }
                return Ok(DbState::Valid);
            }
        }

        match Database::open(path.as_std_path()) {
            Ok(db) => match Self::ensure_schema(&db) {
                Ok(()) => Ok(DbState::Valid),
                Err(StorageError::NewerSchema { found, supported }) => {
                    Ok(DbState::NewerSchema { found, supported })
                }
                Err(StorageError::DatabaseAlreadyOpen) => Ok(DbState::Busy),
                Err(StorageError::Corrupt) => {
                    drop(db);
                    let _ = quarantine_corrupt_file(path);
                    Ok(DbState::Corrupt)
                }
                Err(e) => Err(e),
            },
            Err(redb::DatabaseError::DatabaseAlreadyOpen) => Ok(DbState::Busy),
            Err(e) if Self::is_corrupt_open_error(&e) => {
                let _ = quarantine_corrupt_file(path);
                Ok(DbState::Corrupt)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn ensure_schema(db: &Database) -> Result<(), StorageError> {
        let write_tx = db.begin_write()?;
        {
            let mut meta = write_tx.open_table(META)?;
            let format: Option<String> = meta.get(META_FORMAT_KEY)?.map(|g| g.value().to_string());
            if format.is_none() {
                let schema_version = CURRENT_SCHEMA.to_string();
                let created_at = Utc::now().to_rfc3339();
                meta.insert(META_FORMAT_KEY, META_FORMAT_VALUE)?;
                meta.insert(META_SCHEMA_VERSION, schema_version.as_str())?;
                meta.insert(META_CREATED_AT, created_at.as_str())?;
            } else if format.as_deref() != Some(META_FORMAT_VALUE) {
                return Err(StorageError::Corrupt);
            }
        }
        let _ = write_tx.open_table(FLAGS)?;
        write_tx.commit()?;

        let read_tx = db.begin_read()?;
        let meta = read_tx.open_table(META)?;
        let schema_version = meta
            .get(META_SCHEMA_VERSION)?
            .and_then(|g| g.value().parse::<u32>().ok())
            .unwrap_or(0);
        if schema_version == 0 {
            return Err(StorageError::Corrupt);
        }
        if schema_version > CURRENT_SCHEMA {
            return Err(StorageError::NewerSchema {
                found: schema_version,
                supported: CURRENT_SCHEMA,
            });
        }
        if schema_version != CURRENT_SCHEMA {
            return Err(StorageError::Corrupt);
        }
        Ok(())
    }

    fn stamp_write(write_tx: &redb::WriteTransaction) -> Result<(), StorageError> {
        let ts = Utc::now().to_rfc3339();
        let mut meta = write_tx.open_table(META)?;
        meta.insert(META_LAST_WRITE_AT, ts.as_str())?;
        Ok(())
    }
}

impl ScopeBackend for RedbScopeStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let read_tx = self.db.begin_read()?;
        let table = read_tx.open_table(FLAGS)?;
        let value = table.get(key)?.map(|g| g.value().to_string());
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.apply(&[ScopeWrite::set(key, value)])
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.apply(&[ScopeWrite::remove(key)])
    }

    fn apply(&self, writes: &[ScopeWrite]) -> Result<(), StorageError> {
        for w in writes {
            validate_key(w.key())?;
        }
        if writes.is_empty() {
            return Ok(());
        }
        let write_tx = self.db.begin_write()?;
        {
            let mut table = write_tx.open_table(FLAGS)?;
            for w in writes {
                match w {
                    ScopeWrite::Set { key, value } => {
                        table.insert(key.as_str(), value.as_str())?;
                    }
                    ScopeWrite::Remove { key } => {
                        let _ = table.remove(key.as_str())?;
                    }
                }
            }
        }
        Self::stamp_write(&write_tx)?;
        write_tx.commit()?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let read_tx = self.db.begin_read()?;
        let table = read_tx.open_table(FLAGS)?;
        let mut out = Vec::new();
        for row in table.iter()? {
            let (k, _) = row?;
            out.push(k.value().to_string());
        }
        Ok(out)
    }

    fn clear(&self) -> Result<(), StorageError> {
        let write_tx = self.db.begin_write()?;
        {
            let mut table = write_tx.open_table(FLAGS)?;
            let mut keys = Vec::new();
            for row in table.iter()? {
                let (k, _) = row?;
                keys.push(k.value().to_string());
            }
            for k in keys {
                let _ = table.remove(k.as_str())?;
            }
        }
        Self::stamp_write(&write_tx)?;
        write_tx.commit()?;
        Ok(())
    }
}
