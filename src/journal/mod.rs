//! Intent journals for multi-step storage operations.
//!
//! Before a clone, inflate or coalesce starts mutating storage it records a
//! journal entry `(type, id) -> value`. The entry is removed only after the
//! operation completes; anything left behind after a crash tells recovery
//! what to undo or finish.
//!
//! # Backends
//!
//! - [`FileJournaler`]: one file per entry, named `<type>_<id>`, the value
//!   being the file's single line.
//! - [`TaggedJournaler`]: one small tagged volume per entry, named
//!   `<type>_<id>_<value>`, for repositories without a shared filesystem.
//!
//! Both backends give the same guarantees: at most one entry per
//! `(type, id)`, an entry is visible only once fully persisted, and empty
//! values are left out of [`Journaler::get_all`].

mod file;
mod tagged;


pub use file::FileJournaler;
pub use tagged::{JOURNAL_TAG, JOURNAL_VOLUME_SIZE, TaggedJournaler};

use crate::error::{Result, SmError};
use std::collections::BTreeMap;

/// Separates type, id and (for tagged volumes) value in stored names.
pub const SEPARATOR: char = '_';

/// Snapshot/clone in progress; value is the base copy (and snapshot) ids.
pub const JRN_CLONE: &str = "clone";

/// Volume growth in progress; value is the size before growing.
pub const JRN_INFLATE: &str = "inflate";

/// Coalesce in progress; value is the parent being coalesced into.
pub const JRN_COALESCE: &str = "coalesce";

/// Durable intent records keyed by `(type, id)`.
pub trait Journaler: Send + Sync {
    /// Record an intent. Fails with `AlreadyExists` if `(kind, id)` is taken.
    fn create(&self, kind: &str, id: &str, value: &str) -> Result<()>;

    /// The value for `(kind, id)`, if present.
    fn get(&self, kind: &str, id: &str) -> Result<Option<String>>;

    /// Delete `(kind, id)`. Fails with `NotFound` if absent.
    fn remove(&self, kind: &str, id: &str) -> Result<()>;

    /// Every entry of `kind` with a non-empty value, keyed by id.
    fn get_all(&self, kind: &str) -> Result<BTreeMap<String, String>>;

    /// True if any type has an entry for `id`.
    fn has_journals(&self, id: &str) -> Result<bool>;
}

/// Split a stored name into exactly `parts` pieces on [`SEPARATOR`].
///
/// Names that split into any other number of pieces are corrupt.
pub(crate) fn split_entry_name(name: &str, parts: usize) -> Result<Vec<&str>> {
    let pieces: Vec<&str> = name.split(SEPARATOR).collect();
    if pieces.len() != parts {
        return Err(SmError::CorruptState(format!(
            "bad journal entry name '{}': expected {} parts, found {}",
            name,
            parts,
            pieces.len()
        )));
    }
    Ok(pieces)
}

/// Types and ids must be non-empty and separator-free.
pub(crate) fn validate_key(kind: &str, id: &str) -> Result<()> {
    for (what, value) in [("journal type", kind), ("journal id", id)] {
        crate::fs::validate_component(what, value)?;
        if value.contains(SEPARATOR) {
            return Err(SmError::InvalidName(format!(
                "{} '{}' must not contain '{}'",
                what, value, SEPARATOR
            )));
        }
    }
    Ok(())
}

pub(crate) fn describe(kind: &str, id: &str) -> String {
    format!("{}:{}", kind, id)
}
