//! Journal entries as files in a directory.

use super::{Journaler, describe, split_entry_name, validate_key};
use crate::error::{Result, SmError};
use crate::fs::{atomic_create, mkdirs};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Stores each entry as `<dir>/<type>_<id>` containing the value.
#[derive(Debug, Clone)]
pub struct FileJournaler {
    dir: PathBuf,
}

impl FileJournaler {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, kind: &str, id: &str) -> PathBuf {
        self.dir.join(format!("{}{}{}", kind, super::SEPARATOR, id))
    }

    /// All `(type, id)` pairs currently on disk. Temporaries (dot-files) and
    /// anything that is not a regular file, such as the per-SR journal
    /// directories, are skipped; any other name that does not split in two
    /// is corrupt.
    fn entries(&self) -> Result<Vec<(String, String)>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SmError::io(
                    format!("failed to read journal directory '{}'", self.dir.display()),
                    e,
                ));
            }
        };

        let mut entries = Vec::new();
        for entry in read_dir.flatten() {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if !entry.file_type().is_ok_and(|kind| kind.is_file()) {
                continue;
            }
            let parts = split_entry_name(&name, 2)?;
            entries.push((parts[0].to_string(), parts[1].to_string()));
        }
        entries.sort();
        Ok(entries)
    }
}

impl Journaler for FileJournaler {
    fn create(&self, kind: &str, id: &str, value: &str) -> Result<()> {
        validate_key(kind, id)?;
        if value.contains('\n') {
            return Err(SmError::InvalidName(format!(
                "journal value for '{}' must be a single line",
                describe(kind, id)
            )));
        }

        if let Some(existing) = self.get(kind, id)? {
            return Err(SmError::AlreadyExists(format!(
                "journal '{}' already exists with value '{}'",
                describe(kind, id),
                existing
            )));
        }

        mkdirs(&self.dir)?;
        atomic_create(self.entry_path(kind, id), value.as_bytes()).map_err(|e| match e {
            SmError::AlreadyExists(_) => {
                SmError::AlreadyExists(format!("journal '{}' already exists", describe(kind, id)))
            }
            other => other,
        })?;

        log::debug!("journal: created {} = '{}'", describe(kind, id), value);
        Ok(())
    }

    fn get(&self, kind: &str, id: &str) -> Result<Option<String>> {
        validate_key(kind, id)?;
        let path = self.entry_path(kind, id);

        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content.lines().next().unwrap_or("").to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SmError::io(
                format!("failed to read journal '{}'", path.display()),
                e,
            )),
        }
    }

    fn remove(&self, kind: &str, id: &str) -> Result<()> {
        validate_key(kind, id)?;
        let path = self.entry_path(kind, id);

        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("journal: removed {}", describe(kind, id));
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SmError::NotFound(format!(
                "journal '{}'",
                describe(kind, id)
            ))),
            Err(e) => Err(SmError::io(
                format!("failed to remove journal '{}'", path.display()),
                e,
            )),
        }
    }

    fn get_all(&self, kind: &str) -> Result<BTreeMap<String, String>> {
        let mut all = BTreeMap::new();
        for (entry_kind, id) in self.entries()? {
            if entry_kind != kind {
                continue;
            }
            // Removed between listing and reading.
            let Some(value) = self.get(&entry_kind, &id)? else {
                continue;
            };
            if !value.is_empty() {
                all.insert(id, value);
            }
        }
        Ok(all)
    }

    fn has_journals(&self, id: &str) -> Result<bool> {
        Ok(self.entries()?.iter().any(|(_, entry_id)| entry_id == id))
    }
}
