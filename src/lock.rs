/*
 * This file is part of edeploy-hook.
 *
 * Copyright (C) 2025 edeploy-hook contributors
 *
 * edeploy-hook is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * edeploy-hook is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with edeploy-hook. If not, see <https://www.gnu.org/licenses/>.
 */

//! Named cross-process locking for the profile catalog
//!
//! Only one discovery event may read and update the catalog at a time, and
//! events may run in separate processes. `FileLock` takes an exclusive
//! `flock(2)` on a well-known path; tests swap in a mock provider.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use edeploy_error::{DiscoveryError, Result};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Acquire/release semantics for a named lock
#[cfg_attr(test, mockall::automock)]
pub trait LockProvider {
    /// Block until the lock is held
    fn acquire(&self) -> Result<()>;

    /// Give the lock back
    fn release(&self) -> Result<()>;
}

/// Scoped acquisition: the lock is released exactly once, either through
/// [`LockGuard::release`] or when the guard is dropped.
pub struct LockGuard<'a> {
    provider: &'a dyn LockProvider,
    released: bool,
}

impl<'a> LockGuard<'a> {
    pub fn acquire(provider: &'a dyn LockProvider) -> Result<Self> {
        provider.acquire()?;
        Ok(Self {
            provider,
            released: false,
        })
    }

    /// Release now and report the outcome
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.provider.release()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.provider.release() {
            warn!(error = %e, "Failed to release catalog lock");
        }
    }
}

/// Exclusive `flock(2)` on a lock file
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    held: Mutex<Option<File>>,
}

impl FileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            held: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.held.lock().is_some()
    }

    fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| DiscoveryError::lock(&self.path, format!("cannot create parent: {}", e)))?;
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| DiscoveryError::lock(&self.path, e.to_string()))
    }
}

impl LockProvider for FileLock {
    fn acquire(&self) -> Result<()> {
        let mut held = self.held.lock();
        if held.is_some() {
            return Err(DiscoveryError::lock(&self.path, "already held by this process"));
        }

        let file = self.open()?;
        loop {
            // SAFETY: the descriptor belongs to `file`, which outlives this call.
            let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if rc == 0 {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(DiscoveryError::lock(&self.path, err.to_string()));
        }

        debug!(path = ?self.path, "Catalog lock acquired");
        *held = Some(file);
        Ok(())
    }

    fn release(&self) -> Result<()> {
        let file = self
            .held
            .lock()
            .take()
            .ok_or_else(|| DiscoveryError::LockNotHeld(self.path.clone()))?;

        // SAFETY: the descriptor belongs to `file`, which is still open here.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
        if rc != 0 {
            // Closing `file` drops the lock anyway
            return Err(DiscoveryError::lock(&self.path, io::Error::last_os_error().to_string()));
        }

        debug!(path = ?self.path, "Catalog lock released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn try_lock_elsewhere(path: &Path) -> bool {
        let file = File::open(path).unwrap();
        // SAFETY: `file` is open for the duration of the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        rc == 0
    }

    #[test]
    fn test_file_lock_excludes_other_descriptions() {
        let dir = TempDir::new().unwrap();
        let lock = FileLock::new(dir.path().join("locks").join("discoverd.lock"));

        lock.acquire().unwrap();
        assert!(lock.is_held());
        assert!(!try_lock_elsewhere(lock.path()));

        lock.release().unwrap();
        assert!(!lock.is_held());
        assert!(try_lock_elsewhere(lock.path()));
    }

    #[test]
    fn test_file_lock_release_without_acquire() {
        let dir = TempDir::new().unwrap();
        let lock = FileLock::new(dir.path().join("discoverd.lock"));
        assert!(matches!(lock.release(), Err(DiscoveryError::LockNotHeld(_))));
    }

    #[test]
    fn test_file_lock_double_acquire_rejected() {
        let dir = TempDir::new().unwrap();
        let lock = FileLock::new(dir.path().join("discoverd.lock"));
        lock.acquire().unwrap();
        assert!(lock.acquire().is_err());
        lock.release().unwrap();
    }

    #[test]
    fn test_file_lock_unopenable_path() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();
        let lock = FileLock::new(blocker.join("discoverd.lock"));
        assert!(matches!(lock.acquire(), Err(DiscoveryError::Lock { .. })));
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let mut provider = MockLockProvider::new();
        provider.expect_acquire().times(1).returning(|| Ok(()));
        provider.expect_release().times(1).returning(|| Ok(()));

        let guard = LockGuard::acquire(&provider).unwrap();
        drop(guard);
    }

    #[test]
    fn test_guard_explicit_release_is_not_repeated() {
        let mut provider = MockLockProvider::new();
        provider.expect_acquire().times(1).returning(|| Ok(()));
        provider.expect_release().times(1).returning(|| Ok(()));

        let guard = LockGuard::acquire(&provider).unwrap();
        guard.release().unwrap();
    }

    #[test]
    fn test_failed_acquire_does_not_release() {
        let mut provider = MockLockProvider::new();
        provider
            .expect_acquire()
            .times(1)
            .returning(|| Err(DiscoveryError::lock("/var/lock/discoverd.lock", "busy")));
        provider.expect_release().times(0);

        assert!(LockGuard::acquire(&provider).is_err());
    }
}
