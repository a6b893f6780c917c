//! Single-instance guard
//!
//! The lock file carries an exclusive advisory lock for as long as the guard
//! lives, and holds the owning PID for operators. The kernel drops the lock
//! when the process dies, so a file left behind by a crash or a kill does not
//! block later runs. On a clean exit the guard also removes the file.

use std::fs::{File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{BuilderError, Result};

#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    file: File,
}

impl InstanceLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(BuilderError::AlreadyRunning(path.to_path_buf()))
            }
            Err(TryLockError::Error(e)) => return Err(e.into()),
        }

        // Whatever is in there belongs to a process that no longer holds it
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        tracing::debug!("Acquired instance lock '{}'", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // Remove while still locked; the lock goes with the handle
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Released instance lock '{}'", self.path.display()),
            Err(e) => tracing::warn!(
                "Failed to remove lock file '{}': {}",
                self.path.display(),
                e
            ),
        }
        let _ = self.file.unlock();
    }
}
