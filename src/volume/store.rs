//! Volume metadata and the storage abstraction orchestration runs against.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Metadata of one copy-on-write volume.
///
/// The name is the record's key and is not part of the persisted body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    #[serde(skip)]
    pub name: String,

    /// Virtual size in bytes.
    pub size: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Volume this one is a delta on top of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Internal chain node, not visible as a VDI.
    #[serde(default)]
    pub hidden: bool,

    #[serde(default)]
    pub read_only: bool,

    #[serde(default)]
    pub active: bool,
}

impl VolumeInfo {
    pub fn new(name: &str, size: u64) -> Self {
        Self {
            name: name.to_string(),
            size,
            tag: None,
            parent: None,
            hidden: false,
            read_only: false,
            active: false,
        }
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }
}

/// Volume metadata operations of a storage repository.
///
/// Each call is atomic on its own. Multi-step sequences are made
/// recoverable by the caller through journals.
pub trait VolumeStore: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<VolumeInfo>>;

    /// Fails with `AlreadyExists` if a volume of that name exists.
    fn create(&self, info: &VolumeInfo) -> Result<()>;

    /// Overwrite the metadata of an existing volume (`NotFound` otherwise).
    fn update(&self, info: &VolumeInfo) -> Result<()>;

    /// Fails with `NotFound` if absent.
    fn remove(&self, name: &str) -> Result<()>;

    /// Fails with `NotFound` if `from` is absent, `AlreadyExists` if `to` exists.
    fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Every volume, sorted by name.
    fn list(&self) -> Result<Vec<VolumeInfo>>;

    /// Names of volumes carrying `tag`.
    fn list_tagged(&self, tag: &str) -> Result<Vec<String>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|info| info.tag.as_deref() == Some(tag))
            .map(|info| info.name)
            .collect())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.get(name)?.is_some())
    }
}
