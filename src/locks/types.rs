//! Lock keys, well-known lock names and lock listing information.

use crate::error::Result;
use crate::fs::validate_component;
use std::path::{Path, PathBuf};

/// On-disk directory used for locks created without a namespace.
pub const NIL_NAMESPACE: &str = ".nil";

/// SR-wide lock, one per SR uuid namespace.
pub const LOCK_TYPE_SR: &str = "sr";

/// Garbage-collector running flag. Still just called "running" on disk.
pub const LOCK_TYPE_GC_RUNNING: &str = "running";

/// Serializes iscsiadm invocations on a host.
pub const LOCK_TYPE_ISCSIADM_RUNNING: &str = "isciadm_running";

/// Identifies a lock: `(namespace, name)`.
///
/// The nil namespace is represented as `None` and stored on disk as `.nil`,
/// which can never collide with a caller namespace since those may not start
/// with a dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey {
    namespace: Option<String>,
    name: String,
}

impl LockKey {
    /// Build a key, validating both components.
    pub fn new(name: &str, namespace: Option<&str>) -> Result<Self> {
        validate_component("lock name", name)?;
        if let Some(ns) = namespace {
            validate_component("lock namespace", ns)?;
        }

        Ok(Self {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Directory name used on disk for this key's namespace.
    pub fn namespace_dir(&self) -> &str {
        namespace_dir(self.namespace())
    }

    /// `base/namespace/name`.
    pub fn path_under(&self, base: &Path) -> PathBuf {
        base.join(self.namespace_dir()).join(&self.name)
    }
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace_dir(), self.name)
    }
}

/// On-disk directory for a namespace (`.nil` when absent).
pub fn namespace_dir(namespace: Option<&str>) -> &str {
    namespace.unwrap_or(NIL_NAMESPACE)
}

/// Information about a lock file, as reported by `LockManager::list`.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// The lock key.
    pub key: LockKey,

    /// The lock file path.
    pub path: PathBuf,

    /// PID of the holder, if any.
    pub owner: Option<u32>,
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.owner {
            Some(pid) => write!(f, "{} (held by pid {})", self.key, pid),
            None => write!(f, "{} (unheld)", self.key),
        }
    }
}
