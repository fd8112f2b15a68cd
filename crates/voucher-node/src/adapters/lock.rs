//! # Data Directory Locking
//!
//! Prevents two node processes from opening the same data directory. The
//! file and RocksDB backends assume a single writer process; a second one
//! would interleave snapshot renames or fail to open the database.
//!
//! Uses `fs2` for cross-platform file locking (flock on Unix, LockFile on Windows).

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;

/// Errors from data directory locking.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to create lock file: {0}")]
    CreateFailed(#[source] io::Error),

    #[error("data directory already in use ({}), holder pid {:?}", .path.display(), .pid)]
    AlreadyLocked { pid: Option<u32>, path: PathBuf },

    #[error("failed to write PID to lock file: {0}")]
    WriteFailed(#[source] io::Error),
}

/// Exclusive lock on a data directory, released on drop.
///
/// ```ignore
/// let lock = DataDirLock::acquire(Path::new("/var/lib/vouchers"), Duration::ZERO)?;
/// // Lock is held until `lock` goes out of scope
/// ```
#[derive(Debug)]
pub struct DataDirLock {
    file: File,
    path: PathBuf,
    pid: u32,
}

impl DataDirLock {
    pub const LOCK_FILE: &'static str = "LOCK";

    /// Acquire the lock, retrying with backoff until `timeout` elapses.
    ///
    /// A lock file left behind by a process that is no longer running does
    /// not block acquisition.
    pub fn acquire(data_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        std::fs::create_dir_all(data_dir).map_err(LockError::CreateFailed)?;
        let lock_path = data_dir.join(Self::LOCK_FILE);
        let deadline = Instant::now() + timeout;
        let mut retry_delay = Duration::from_millis(50);

        loop {
            // No truncate on open: the holder's PID must stay readable.
            let mut file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&lock_path)
                .map_err(LockError::CreateFailed)?;

            if file.try_lock_exclusive().is_ok() {
                let pid = std::process::id();
                file.set_len(0).map_err(LockError::WriteFailed)?;
                file.seek(SeekFrom::Start(0)).map_err(LockError::WriteFailed)?;
                writeln!(file, "{}", pid).map_err(LockError::WriteFailed)?;
                file.sync_all().map_err(LockError::WriteFailed)?;

                tracing::debug!(path = %lock_path.display(), pid, "[node] data directory locked");
                return Ok(Self {
                    file,
                    path: lock_path,
                    pid,
                });
            }

            let holder = read_pid(&mut file);
            if Instant::now() >= deadline {
                return Err(LockError::AlreadyLocked {
                    pid: holder,
                    path: lock_path,
                });
            }
            drop(file);
            std::thread::sleep(retry_delay);
            retry_delay = (retry_delay * 2).min(Duration::from_millis(500));
        }
    }

    /// PID of the process holding the lock.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        // fs2::FileExt::unlock, not the std method of the same name. The file
        // stays: unlinking it would let a waiter lock an orphaned inode.
        let _ = FileExt::unlock(&self.file);
    }
}

fn read_pid(file: &mut File) -> Option<u32> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut content).ok()?;
    content.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_acquire_writes_pid() {
        let dir = TempDir::new().unwrap();

        let lock = DataDirLock::acquire(dir.path(), Duration::ZERO).expect("should acquire lock");
        assert!(lock.path().exists());
        assert_eq!(lock.pid(), std::process::id());

        let content = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(content.trim().parse::<u32>().unwrap(), std::process::id());
    }

    #[test]
    fn test_double_lock_fails_with_holder_pid() {
        let dir = TempDir::new().unwrap();
        let _held = DataDirLock::acquire(dir.path(), Duration::ZERO).unwrap();

        let result = DataDirLock::acquire(dir.path(), Duration::from_millis(100));
        match result {
            Err(LockError::AlreadyLocked { pid, .. }) => {
                assert_eq!(pid, Some(std::process::id()));
            }
            other => panic!("expected AlreadyLocked, got {:?}", other),
        }
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        {
            let _lock = DataDirLock::acquire(dir.path(), Duration::ZERO).unwrap();
        }
        assert!(DataDirLock::acquire(dir.path(), Duration::ZERO).is_ok());
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let lock = DataDirLock::acquire(&nested, Duration::ZERO).unwrap();
        assert!(lock.path().starts_with(&nested));
    }
}
