//! Exclusive write sessions over a JSONL curation store.
//!
//! A session holds a sidecar `<store>.lock` file for its whole lifetime.
//! The lock is created with `create_new`, so a second writer sees
//! [`StoreError::LockBusy`] rather than interleaving its rewrite with ours.

use crate::contract::StoreError;
use crate::memory::MemoryStore;
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sidecar lock path for a store file: `store.jsonl` → `store.jsonl.lock`.
pub fn store_lock_path(store_path: &Path) -> PathBuf {
    let mut name = store_path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Load the store under its lock, hand it to `edit`, and persist it if
/// `edit` reports a change. The lock is released on every exit path.
///
/// `edit` returns `(value, changed)`. An error from `edit` discards the
/// in-memory copy without touching the file.
pub fn mutate_store_jsonl<T, F>(path: impl AsRef<Path>, edit: F) -> Result<T, StoreError>
where
    F: FnOnce(&mut MemoryStore) -> Result<(T, bool), StoreError>,
{
    let path = path.as_ref();
    let session = WriteSession::begin(path)?;

    let mut store = MemoryStore::load_jsonl(path)?;
    let (value, changed) = edit(&mut store)?;
    if changed {
        store.save_jsonl(path)?;
        debug!(store = %path.display(), lock = %session.lock_path.display(), "store rewritten");
    }
    Ok(value)
}

struct WriteSession {
    lock_path: PathBuf,
    _handle: File,
}

impl WriteSession {
    fn begin(store_path: &Path) -> Result<Self, StoreError> {
        let lock_path = store_lock_path(store_path);
        let lock_io = |message: String| StoreError::LockIo {
            lock_path: lock_path.display().to_string(),
            message,
        };

        if let Some(dir) = lock_path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).map_err(|e| lock_io(e.to_string()))?;
        }

        let opened = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path);
        let mut handle = match opened {
            Ok(handle) => handle,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::LockBusy {
                    lock_path: lock_path.display().to_string(),
                });
            }
            Err(e) => return Err(lock_io(e.to_string())),
        };

        // Owner stamp for whoever finds a stale lock.
        let _ = writeln!(
            handle,
            "pid={} acquired={}",
            std::process::id(),
            Utc::now().to_rfc3339()
        );
        Ok(Self {
            lock_path,
            _handle: handle,
        })
    }
}

impl Drop for WriteSession {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}
