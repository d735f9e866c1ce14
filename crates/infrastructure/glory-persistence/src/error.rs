/// Failures of a flag scope backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("flag store schema is invalid or corrupt")]
    Corrupt,
    #[error("flag store is from a newer build (schema_version={found}, supported={supported})")]
    NewerSchema { found: u32, supported: u32 },
    #[error("flag store is already open in another process")]
    DatabaseAlreadyOpen,
    #[error("invalid flag key: {0:?}")]
    InvalidKey(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("flag store backend error: {0}")]
    Backend(Box<redb::Error>),
}

impl From<redb::Error> for StorageError {
    fn from(value: redb::Error) -> Self {
        match value {
            redb::Error::DatabaseAlreadyOpen => Self::DatabaseAlreadyOpen,
            other => Self::Backend(Box::new(other)),
        }
    }
}

macro_rules! via_redb_error {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for StorageError {
                fn from(value: $ty) -> Self {
                    redb::Error::from(value).into()
                }
            }
        )+
    };
}

via_redb_error!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
