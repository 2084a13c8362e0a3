//! Exclusive writer lock for the snapshot file.
//!
//! Only the holder of a [`WriterLock`] may write the snapshot through the
//! registry builder or the store owner. The lock is an OS advisory lock on
//! `<snapshot>.lock`, taken non-blocking, and released when dropped (also when
//! the process dies).

use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};

use super::StoreError;

#[derive(Debug)]
pub struct WriterLock {
    _file: File,
    lock_path: PathBuf,
    snapshot_path: PathBuf,
}

impl WriterLock {
    /// Fails with [`StoreError::Locked`] if another writer holds the lock.
    pub fn acquire(snapshot_path: &Path) -> Result<Self, StoreError> {
        let lock_path = lock_path_for(snapshot_path);
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StoreError::io(&lock_path, e))?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(StoreError::Locked {
                    path: lock_path.display().to_string(),
                });
            }
            Err(TryLockError::Error(e)) => return Err(StoreError::io(&lock_path, e)),
        }

        tracing::debug!(lock = %lock_path.display(), "snapshot writer lock acquired");
        Ok(Self {
            _file: file,
            lock_path,
            snapshot_path: snapshot_path.to_path_buf(),
        })
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

fn lock_path_for(snapshot_path: &Path) -> PathBuf {
    let mut name = snapshot_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    name.push(".lock");
    snapshot_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_path_sits_next_to_snapshot() {
        assert_eq!(
            lock_path_for(Path::new("/var/lib/qc/snapshot.bin")),
            PathBuf::from("/var/lib/qc/snapshot.bin.lock")
        );
        assert_eq!(
            lock_path_for(Path::new("snapshot.bin")),
            PathBuf::from("snapshot.bin.lock")
        );
    }
}
