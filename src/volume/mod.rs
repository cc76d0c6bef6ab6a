//! Copy-on-write volume chains and their journaled operations.
//!
//! A VDI is the leaf of a chain of volumes linked by `parent`. Interior
//! nodes are hidden, read-only bases produced by snapshots. Every operation
//! that needs more than one metadata write is bracketed by a journal entry
//! so that a crash at any point can be undone or finished by
//! [`VolumeManager::recover`]:
//!
//! | operation  | journal      | value                | recovery       |
//! |------------|--------------|----------------------|----------------|
//! | snapshot   | `clone`      | `base` / `base.snap` | undo           |
//! | resize     | `inflate`    | size before growing  | undo (shrink)  |
//! | coalesce   | `coalesce`   | parent id            | finish         |
//!
//! The journal entry is always removed last, and every recovery step checks
//! the current state before acting, so replaying recovery is harmless.

mod dir_store;
mod gc;
mod manager;
mod recovery;
mod store;

#[cfg(test)]
mod tests;

pub use dir_store::DirVolumeStore;
pub use gc::GcReport;
pub use manager::{SnapshotKind, SnapshotOutcome, VolumeManager};
pub use recovery::RecoveryReport;
pub use store::{VolumeInfo, VolumeStore};

use crate::error::{Result, SmError};

/// Volume ids are letters, digits and `-` (uuids in practice).
///
/// This keeps them usable as lock names, refcount keys, file names and
/// journal ids in both journal backends.
pub fn validate_volume_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(SmError::InvalidName("volume id must be non-empty".to_string()));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(SmError::InvalidName(format!(
            "volume id '{}' may only contain letters, digits and '-'",
            id
        )));
    }
    Ok(())
}
