use camino::Utf8PathBuf;
use directories::ProjectDirs;

use crate::{StorageError, FLAGS_REDB_FILENAME};

const QUALIFIER: &str = "com";
const ORG: &str = "getglory";
const APP: &str = "studio";

/// Location of the durable flag store inside the platform data directory.
pub fn default_durable_path() -> Result<Utf8PathBuf, StorageError> {
    let dirs = ProjectDirs::from(QUALIFIER, ORG, APP).ok_or_else(|| {
        StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "could not determine data directory",
        ))
    })?;
    let dir = Utf8PathBuf::from_path_buf(dirs.data_dir().to_path_buf())
        .map_err(|p| StorageError::InvalidKey(p.to_string_lossy().to_string()))?;
    Ok(dir.join(FLAGS_REDB_FILENAME))
}
