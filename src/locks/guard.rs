//! RAII lock guard implementation.

use super::handle::Lock;
use crate::error::Result;

/// RAII guard for one level of a held [`Lock`].
///
/// When dropped, the level is released. If the release fails, a warning is
/// logged but no panic occurs.
#[derive(Debug)]
pub struct LockGuard {
    lock: Lock,

    /// Whether the lock has been released manually.
    released: bool,
}

impl LockGuard {
    pub(super) fn new(lock: Lock) -> Self {
        Self {
            lock,
            released: false,
        }
    }

    /// The guarded lock.
    pub fn lock(&self) -> &Lock {
        &self.lock
    }

    /// Manually release the lock.
    ///
    /// This is useful when you want to release the lock before the guard
    /// goes out of scope, and want to handle errors explicitly.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.lock.release()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = self.lock.release()
        {
            log::warn!("failed to release lock '{}': {}", self.lock.key(), e);
        }
    }
}
