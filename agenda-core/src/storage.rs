//! File-per-key backend with advisory locking for rudimentary multi-session
//! support. Each key lives in its own file under a data directory.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::store::KvStore;

/// Resolves the data directory: the `AGENDA_DATA_DIR` environment variable
/// when set, otherwise `~/.agenda-requests`.
pub fn default_data_dir() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("AGENDA_DATA_DIR") {
        return Ok(PathBuf::from(path));
    }

    let home_dir = dirs::home_dir().context("Failed to determine home directory")?;
    Ok(home_dir.join(".agenda-requests"))
}

/// Key-value backend storing each key as a file in `dir`.
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Acquire an exclusive lock for writing. Returns the lock file handle,
    /// which must be held during the operation.
    fn acquire_write_lock(&self, key: &str) -> Result<File> {
        let lock_path = self.dir.join(format!("{key}.lock"));
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to create lock file: {lock_path:?}"))?;

        let start = std::time::Instant::now();
        let timeout = Duration::from_secs(5);

        loop {
            match lock_file.try_lock_exclusive() {
                Ok(()) => return Ok(lock_file),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() > timeout {
                        anyhow::bail!(
                            "Timeout waiting for file lock - another session may be writing: {:?}",
                            lock_path
                        );
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to acquire lock on {lock_path:?}"))
                }
            }
        }
    }
}

impl KvStore for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.key_path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read {:?}", self.key_path(key)))
            }
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data directory {:?}", self.dir))?;

        let mut lock_file = self.acquire_write_lock(key)?;
        let _ = writeln!(
            lock_file,
            "Locked by PID {} at {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );

        fs::write(self.key_path(key), value)
            .with_context(|| format!("Failed to write {:?}", self.key_path(key)))?;

        // Lock is released when lock_file is dropped.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RequestStore, LAST_NUMBER_KEY, REQUESTS_KEY};

    #[test]
    fn test_get_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKv::new(dir.path());
        assert_eq!(kv.get(REQUESTS_KEY).unwrap(), None);
    }

    #[test]
    fn test_set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut kv = FileKv::new(dir.path());
        kv.set(LAST_NUMBER_KEY, "3/2025").unwrap();
        assert_eq!(kv.get(LAST_NUMBER_KEY).unwrap().as_deref(), Some("3/2025"));
    }

    #[test]
    fn test_set_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deep").join("data");
        let mut kv = FileKv::new(&nested);
        kv.set(REQUESTS_KEY, "[]").unwrap();
        assert_eq!(kv.get(REQUESTS_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_request_store_over_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RequestStore::new(FileKv::new(dir.path()));

        let outcome = store.load_at(2025);
        assert!(outcome.book.is_empty());
        assert_eq!(store.next_request_number(2025).unwrap(), "1/2025");

        // A second store over the same directory sees the reservation.
        let mut second = RequestStore::new(FileKv::new(dir.path()));
        assert_eq!(second.next_request_number(2025).unwrap(), "2/2025");
    }
}
