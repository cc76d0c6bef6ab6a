//! Journal entries as small tagged volumes.
//!
//! The whole entry lives in the volume name, `<type>_<id>_<value>`, so
//! reading every journal is a single tagged listing. Volume names are
//! restricted, which in turn restricts what can be journaled here.

use super::{Journaler, SEPARATOR, describe, split_entry_name, validate_key};
use crate::error::{Result, SmError};
use crate::volume::{VolumeInfo, VolumeStore};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Size of each journal volume.
pub const JOURNAL_VOLUME_SIZE: u64 = 4 * 1024 * 1024;

/// Tag marking journal volumes.
pub const JOURNAL_TAG: &str = "journaler";

const MAX_VOLUME_NAME_LEN: usize = 127;

/// Journal backed by a [`VolumeStore`].
#[derive(Clone)]
pub struct TaggedJournaler {
    store: Arc<dyn VolumeStore>,
}

impl TaggedJournaler {
    pub fn new(store: Arc<dyn VolumeStore>) -> Self {
        Self { store }
    }

    fn volume_name(kind: &str, id: &str, value: &str) -> String {
        format!("{kind}{SEPARATOR}{id}{SEPARATOR}{value}")
    }

    /// `type -> id -> value` for every journal volume, empty values included.
    fn entries(&self) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
        let mut entries: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for name in self.store.list_tagged(JOURNAL_TAG)? {
            let parts = split_entry_name(&name, 3)?;
            entries
                .entry(parts[0].to_string())
                .or_default()
                .insert(parts[1].to_string(), parts[2].to_string());
        }
        Ok(entries)
    }
}

fn validate_volume_chars(what: &str, value: &str) -> Result<()> {
    let ok = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'));
    if !ok {
        return Err(SmError::InvalidName(format!(
            "{} '{}' may only contain [A-Za-z0-9+.-]",
            what, value
        )));
    }
    Ok(())
}

impl Journaler for TaggedJournaler {
    fn create(&self, kind: &str, id: &str, value: &str) -> Result<()> {
        validate_key(kind, id)?;
        validate_volume_chars("journal type", kind)?;
        validate_volume_chars("journal id", id)?;
        validate_volume_chars("journal value", value)?;

        let name = Self::volume_name(kind, id, value);
        if name.len() > MAX_VOLUME_NAME_LEN {
            return Err(SmError::InvalidName(format!(
                "journal volume name '{}' exceeds {} bytes",
                name, MAX_VOLUME_NAME_LEN
            )));
        }

        if let Some(existing) = self.get(kind, id)? {
            return Err(SmError::AlreadyExists(format!(
                "journal '{}' already exists with value '{}'",
                describe(kind, id),
                existing
            )));
        }

        let mut info = VolumeInfo::new(&name, JOURNAL_VOLUME_SIZE);
        info.tag = Some(JOURNAL_TAG.to_string());
        self.store.create(&info)?;

        log::debug!("journal: created volume {}", name);
        Ok(())
    }

    fn get(&self, kind: &str, id: &str) -> Result<Option<String>> {
        validate_key(kind, id)?;
        Ok(self
            .entries()?
            .get(kind)
            .and_then(|ids| ids.get(id))
            .cloned())
    }

    fn remove(&self, kind: &str, id: &str) -> Result<()> {
        let Some(value) = self.get(kind, id)? else {
            return Err(SmError::NotFound(format!("journal '{}'", describe(kind, id))));
        };

        let name = Self::volume_name(kind, id, &value);
        self.store.remove(&name)?;
        log::debug!("journal: removed volume {}", name);
        Ok(())
    }

    fn get_all(&self, kind: &str) -> Result<BTreeMap<String, String>> {
        Ok(self
            .entries()?
            .remove(kind)
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .collect())
    }

    fn has_journals(&self, id: &str) -> Result<bool> {
        Ok(self.entries()?.values().any(|ids| ids.contains_key(id)))
    }
}
