//! Process-wide registry of lock instances.
//!
//! Every `(namespace, name)` maps to exactly one open lock file and one
//! reentrancy count per `LockManager`. Handing out clones of the same shared
//! state is what makes a second `lock()` call for the same key re-enter instead
//! of opening a second descriptor: with fcntl locks, closing *any* descriptor
//! on the file would silently drop the process's lock.

use super::flock::FcntlLock;
use super::guard::LockGuard;
use super::handle::Lock;
use super::types::{LockInfo, LockKey, namespace_dir};
use crate::config::Config;
use crate::error::{Result, SmError};
use crate::fs::{mkdirs, remove_dir_quiet, remove_file_quiet, validate_component};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared state behind every handle for one key.
#[derive(Debug)]
pub(super) struct LockState {
    pub(super) lock: FcntlLock,
    pub(super) count: u32,
    pub(super) path: PathBuf,
}

impl Drop for LockState {
    fn drop(&mut self) {
        // Closing the descriptor releases the kernel lock.
        log::debug!("lock: closed {}", self.path.display());
    }
}

/// Owns the lock instance cache for one lock base directory.
#[derive(Debug)]
pub struct LockManager {
    base_dir: PathBuf,
    open_retries: u32,
    verbose: bool,
    instances: Mutex<HashMap<LockKey, Arc<Mutex<LockState>>>>,
}

impl LockManager {
    /// Create a manager rooted at `base_dir` with default tuning.
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
            open_retries: 10,
            verbose: true,
            instances: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            base_dir: config.lock_dir.clone(),
            open_retries: config.lock_open_retries,
            verbose: config.verbose_locks,
            instances: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn instances(&self) -> MutexGuard<'_, HashMap<LockKey, Arc<Mutex<LockState>>>> {
        self.instances
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Get the handle for `(namespace, name)`, opening the lock file on first use.
    ///
    /// The namespace directory and lock file are created if absent. The lock is
    /// not taken.
    pub fn lock(&self, name: &str, namespace: Option<&str>) -> Result<Lock> {
        let key = LockKey::new(name, namespace)?;
        let mut instances = self.instances();

        if let Some(state) = instances.get(&key) {
            return Ok(Lock::new(key, Arc::clone(state), self.verbose));
        }

        let state = Arc::new(Mutex::new(self.open(&key)?));
        instances.insert(key.clone(), Arc::clone(&state));
        Ok(Lock::new(key, state, self.verbose))
    }

    /// Blocking acquire, returning an RAII guard.
    pub fn acquire(&self, name: &str, namespace: Option<&str>) -> Result<LockGuard> {
        self.lock(name, namespace)?.guard()
    }

    /// Non-blocking acquire. `Ok(None)` means another process holds the lock.
    pub fn try_acquire(&self, name: &str, namespace: Option<&str>) -> Result<Option<LockGuard>> {
        self.lock(name, namespace)?.try_guard()
    }

    /// Non-blocking acquire that reports a busy lock as
    /// `SmError::LockHeldByOther`, naming the holder when it is known.
    pub fn acquire_or_fail(&self, name: &str, namespace: Option<&str>) -> Result<LockGuard> {
        let lock = self.lock(name, namespace)?;
        if let Some(guard) = lock.try_guard()? {
            return Ok(guard);
        }

        let holder = match lock.test()? {
            Some(pid) => format!("pid {}", pid),
            None => "a process that has since released it".to_string(),
        };
        Err(SmError::LockHeldByOther(format!("{} (held by {})", lock.key(), holder)))
    }

    /// Open (creating if needed) the lock file for `key`.
    ///
    /// Another lock in the same namespace may prune the namespace directory
    /// between our mkdir and our open, so `ENOENT` is retried a bounded number
    /// of times.
    fn open(&self, key: &LockKey) -> Result<LockState> {
        let path = key.path_under(&self.base_dir);
        let ns_path = self.base_dir.join(key.namespace_dir());
        let mut retries = self.open_retries;

        loop {
            mkdirs(&ns_path)?;

            if self.verbose {
                log::debug!("lock: opening lock file {}", path.display());
            }
            match OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)
            {
                Ok(file) => {
                    return Ok(LockState {
                        lock: FcntlLock::write(file),
                        count: 0,
                        path,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound && retries > 0 => {
                    retries -= 1;
                    continue;
                }
                Err(e) => {
                    return Err(SmError::io(
                        format!("failed to open lock file '{}'", path.display()),
                        e,
                    ));
                }
            }
        }
    }

    /// Forget the cached instance for `(namespace, name)` and remove its file.
    ///
    /// Handles still held elsewhere keep their descriptor open until dropped.
    /// A file that is already gone is not an error.
    pub fn cleanup(&self, name: &str, namespace: Option<&str>) -> Result<()> {
        let key = LockKey::new(name, namespace)?;
        self.instances().remove(&key);

        let path = key.path_under(&self.base_dir);
        log::debug!("lock: unlinking lock file {}", path.display());
        remove_file_quiet(&path);
        Ok(())
    }

    /// Remove every lock file in a namespace, then the namespace directory.
    pub fn cleanup_all(&self, namespace: Option<&str>) -> Result<()> {
        if let Some(ns) = namespace {
            validate_component("lock namespace", ns)?;
        }
        let ns_dir = namespace_dir(namespace);
        self.instances()
            .retain(|key, _| key.namespace_dir() != ns_dir);

        let ns_path = self.base_dir.join(ns_dir);
        let entries = match fs::read_dir(&ns_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(SmError::io(
                    format!("failed to read lock directory '{}'", ns_path.display()),
                    e,
                ));
            }
        };

        for entry in entries.flatten() {
            log::debug!("lock: unlinking lock file {}", entry.path().display());
            remove_file_quiet(entry.path());
        }

        log::debug!("lock: removing lock dir {}", ns_path.display());
        remove_dir_quiet(&ns_path);
        Ok(())
    }

    /// Drop every cached instance, e.g. in a child after fork without exec.
    pub fn clear_all(&self) {
        self.instances().clear();
    }

    /// List the lock files of a namespace together with their current holder.
    pub fn list(&self, namespace: Option<&str>) -> Result<Vec<LockInfo>> {
        if let Some(ns) = namespace {
            validate_component("lock namespace", ns)?;
        }
        let ns_path = self.base_dir.join(namespace_dir(namespace));

        let entries = match fs::read_dir(&ns_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SmError::io(
                    format!("failed to read lock directory '{}'", ns_path.display()),
                    e,
                ));
            }
        };

        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();

        let mut locks = Vec::with_capacity(names.len());
        for name in names {
            let lock = self.lock(&name, namespace)?;
            locks.push(LockInfo {
                path: lock.path(),
                owner: lock.test()?,
                key: lock.key().clone(),
            });
        }
        Ok(locks)
    }
}
