//! Session persistence backends
//!
//! - `FileStorage` keeps one file per key in a directory, so the session
//!   survives process restarts.
//! - `MemoryStorage` keeps keys in a `DashMap`, for tests and for callers that
//!   do not want anything written to disk.

use dashmap::DashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::core::traits::SessionStorage;
use crate::types::LedgerError;

/// One file per key under `dir`
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// The directory is created on the first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl SessionStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, LedgerError> {
        match fs::read_to_string(self.path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LedgerError::storage(format!("cannot read {key}: {e}"))),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), LedgerError> {
        fs::create_dir_all(&self.dir)?;
        let write_error =
            |e: std::io::Error| LedgerError::storage(format!("cannot write {key}: {e}"));
        let path = self.path(key);

        let mut file = owner_only()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(write_error)?;
        // A file left by an earlier run keeps its mode on open
        restrict_permissions(&path)?;
        file.write_all(value.as_bytes()).map_err(write_error)
    }

    fn remove(&self, key: &str) -> Result<(), LedgerError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LedgerError::storage(format!("cannot remove {key}: {e}"))),
        }
    }
}

// The token is a credential: owner read/write only, from creation on
fn owner_only() -> OpenOptions {
    let mut options = OpenOptions::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), LedgerError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), LedgerError> {
    Ok(())
}

/// Keys held in memory only
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
        }
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, LedgerError> {
        Ok(self.values.get(key).map(|entry| entry.value().clone()))
    }

    fn save(&self, key: &str, value: &str) -> Result<(), LedgerError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LedgerError> {
        self.values.remove(key);
        Ok(())
    }
}
