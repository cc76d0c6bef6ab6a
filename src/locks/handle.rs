//! Reentrant lock handle.

use super::guard::LockGuard;
use super::registry::LockState;
use super::types::LockKey;
use crate::error::{Result, SmError};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// Handle to a named, host-local exclusive lock.
///
/// All handles for the same key obtained from one `LockManager` share one
/// count: acquiring while held increments it, and the kernel lock is dropped
/// only when `release` brings it back to zero. Threads of one process using
/// the same key serialize on the shared state while a blocking acquire waits.
#[derive(Debug, Clone)]
pub struct Lock {
    key: LockKey,
    state: Arc<Mutex<LockState>>,
    verbose: bool,
}

impl Lock {
    pub(super) fn new(key: LockKey, state: Arc<Mutex<LockState>>, verbose: bool) -> Self {
        Self {
            key,
            state,
            verbose,
        }
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    pub fn key(&self) -> &LockKey {
        &self.key
    }

    /// Path of the backing lock file.
    pub fn path(&self) -> PathBuf {
        self.state().path.clone()
    }

    /// Blocking acquisition.
    ///
    /// Tries once without blocking so that contention is logged together with
    /// the PID we are waiting on.
    pub fn acquire(&self) -> Result<()> {
        let mut state = self.state();

        if !state.lock.held() {
            if !state.lock.try_lock()? {
                let blocker = state
                    .lock
                    .test()?
                    .map_or_else(|| "unknown".to_string(), |pid| pid.to_string());
                log::debug!(
                    "Failed to lock {} on first attempt, blocked by PID {}",
                    state.path.display(),
                    blocker
                );
                state.lock.lock()?;
            }
            if self.verbose {
                log::debug!("lock: acquired {}", state.path.display());
            }
        }

        state.count += 1;
        Ok(())
    }

    /// Non-blocking acquisition. Returns `false` if another process holds it.
    pub fn try_acquire(&self) -> Result<bool> {
        let mut state = self.state();

        let acquired = if state.lock.held() {
            true
        } else {
            let exists = state.path.exists();
            let acquired = state.lock.try_lock()?;
            if self.verbose {
                log::debug!(
                    "lock: tried lock {}, acquired: {} (exists: {})",
                    state.path.display(),
                    acquired,
                    exists
                );
            }
            acquired
        };

        if acquired {
            state.count += 1;
        }
        Ok(acquired)
    }

    /// Release one level of acquisition.
    ///
    /// Releasing a lock this process does not hold is a programming error.
    pub fn release(&self) -> Result<()> {
        let mut state = self.state();

        if state.count == 0 || !state.lock.held() {
            return Err(SmError::ReentrancyViolation(format!(
                "attempt to release lock '{}' which is not held",
                self.key
            )));
        }

        state.count -= 1;
        if state.count > 0 {
            return Ok(());
        }

        state.lock.unlock()?;
        if self.verbose {
            log::debug!("lock: released {}", state.path.display());
        }
        Ok(())
    }

    /// True if this process holds the lock. Local state, not a kernel query.
    pub fn held(&self) -> bool {
        self.state().lock.held()
    }

    /// Current reentrancy depth.
    pub fn count(&self) -> u32 {
        self.state().count
    }

    /// PID of the holder, or `None` when nobody holds it.
    ///
    /// Our own PID when held locally, otherwise asks the kernel.
    pub fn test(&self) -> Result<Option<u32>> {
        self.state().lock.test()
    }

    /// Acquire and return a guard that releases on drop.
    pub fn guard(&self) -> Result<LockGuard> {
        self.acquire()?;
        Ok(LockGuard::new(self.clone()))
    }

    /// Non-blocking variant of [`guard`](Self::guard).
    pub fn try_guard(&self) -> Result<Option<LockGuard>> {
        if self.try_acquire()? {
            Ok(Some(LockGuard::new(self.clone())))
        } else {
            Ok(None)
        }
    }
}
