//! Directory-backed volume metadata: one JSON record per volume.

use super::store::{VolumeInfo, VolumeStore};
use crate::error::{Result, SmError};
use crate::fs::{atomic_create, atomic_overwrite, mkdirs, validate_component};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const RECORD_SUFFIX: &str = ".vol";

/// Stores `<dir>/<name>.vol` per volume.
#[derive(Debug, Clone)]
pub struct DirVolumeStore {
    dir: PathBuf,
}

impl DirVolumeStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, name: &str) -> Result<PathBuf> {
        validate_component("volume name", name)?;
        Ok(self.dir.join(format!("{}{}", name, RECORD_SUFFIX)))
    }

    fn encode(info: &VolumeInfo) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(info).map_err(|e| {
            SmError::CorruptState(format!("failed to serialize volume '{}': {}", info.name, e))
        })
    }

    fn read_record(&self, name: &str, path: &Path) -> Result<Option<VolumeInfo>> {
        let content = match fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SmError::io(
                    format!("failed to read volume record '{}'", path.display()),
                    e,
                ));
            }
        };

        let mut info: VolumeInfo = serde_json::from_slice(&content).map_err(|e| {
            SmError::CorruptState(format!(
                "failed to parse volume record '{}': {}",
                path.display(),
                e
            ))
        })?;
        info.name = name.to_string();
        Ok(Some(info))
    }
}

impl VolumeStore for DirVolumeStore {
    fn get(&self, name: &str) -> Result<Option<VolumeInfo>> {
        let path = self.record_path(name)?;
        self.read_record(name, &path)
    }

    fn create(&self, info: &VolumeInfo) -> Result<()> {
        let path = self.record_path(&info.name)?;
        mkdirs(&self.dir)?;
        atomic_create(&path, &Self::encode(info)?).map_err(|e| match e {
            SmError::AlreadyExists(_) => {
                SmError::AlreadyExists(format!("volume '{}'", info.name))
            }
            other => other,
        })?;
        log::debug!("volume: created {} ({} bytes)", info.name, info.size);
        Ok(())
    }

    fn update(&self, info: &VolumeInfo) -> Result<()> {
        let path = self.record_path(&info.name)?;
        if !path.exists() {
            return Err(SmError::NotFound(format!("volume '{}'", info.name)));
        }
        atomic_overwrite(&path, &Self::encode(info)?)
    }

    fn remove(&self, name: &str) -> Result<()> {
        let path = self.record_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("volume: removed {}", name);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(SmError::NotFound(format!("volume '{}'", name)))
            }
            Err(e) => Err(SmError::io(
                format!("failed to remove volume record '{}'", path.display()),
                e,
            )),
        }
    }

    /// Link the record under the new name, then drop the old one.
    ///
    /// A crash in between leaves both names present with identical metadata.
    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from_path = self.record_path(from)?;
        let to_path = self.record_path(to)?;

        match fs::hard_link(&from_path, &to_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SmError::NotFound(format!("volume '{}'", from)));
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(SmError::AlreadyExists(format!("volume '{}'", to)));
            }
            Err(e) => {
                return Err(SmError::io(
                    format!("failed to rename volume '{}' to '{}'", from, to),
                    e,
                ));
            }
        }

        fs::remove_file(&from_path).map_err(|e| {
            SmError::io(format!("failed to drop old volume name '{}'", from), e)
        })?;
        log::debug!("volume: renamed {} -> {}", from, to);
        Ok(())
    }

    fn list(&self) -> Result<Vec<VolumeInfo>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SmError::io(
                    format!("failed to read SR directory '{}'", self.dir.display()),
                    e,
                ));
            }
        };

        let mut volumes = Vec::new();
        for entry in entries.flatten() {
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }
            let Some(name) = file_name.strip_suffix(RECORD_SUFFIX) else {
                continue;
            };
            // Removed between listing and reading.
            if let Some(info) = self.read_record(name, &entry.path())? {
                volumes.push(info);
            }
        }
        volumes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(volumes)
    }
}
