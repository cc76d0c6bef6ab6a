//! Advisory locking subsystem.
//!
//! Process- and host-scoped mutual exclusion over shared storage resources:
//! - SR lock (`sr` in the SR uuid namespace)
//! - GC running flag (`running` in the SR uuid namespace)
//! - Per-object locks (one name per VDI chain)
//!
//! # Lock Files
//!
//! Each lock is an fcntl write lock on `BASE_DIR/namespace/name`. The namespace
//! directory and file are created on first use; concurrent creators and
//! concurrent pruning of the namespace directory are tolerated.
//!
//! # Reentrancy
//!
//! A [`LockManager`] hands out one shared instance per key, so acquiring a
//! lock this process already holds only bumps a count. The low-level
//! [`FcntlLock`] is deliberately not reentrant and reports misuse as
//! `SmError::ReentrancyViolation`.
//!
//! # RAII Guards
//!
//! [`LockGuard`] releases one level when dropped; failures are logged, never
//! panicked on.

mod flock;
mod guard;
mod handle;
mod registry;
mod types;


pub use flock::{FcntlLock, LockKind};
pub use guard::LockGuard;
pub use handle::Lock;
pub use registry::LockManager;
pub use types::{
    LOCK_TYPE_GC_RUNNING, LOCK_TYPE_ISCSIADM_RUNNING, LOCK_TYPE_SR, LockInfo, LockKey,
    NIL_NAMESPACE,
};
