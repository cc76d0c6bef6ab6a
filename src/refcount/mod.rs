//! Persistent reference counts gating volume deactivation.
//!
//! Each `(namespace, object)` has a pair of counters stored as
//! `<base>/<namespace>/<object>` containing `"<normal> <temporary>\n"`.
//! Normal references mean "attached for guest I/O"; temporary references
//! mean "active for internal maintenance". Both must drain before the
//! backing volume may be deactivated, but only the normal count is reported
//! back to callers as the activation signal.
//!
//! Records are created on first reference and removed, together with an
//! empty namespace directory, once both counts return to zero.
//!
//! The counter does no locking of its own: callers hold the object lock
//! around every read-modify-write.


use crate::config::Config;
use crate::error::{Result, SmError};
use crate::fs::{atomic_overwrite, mkdirs, remove_dir_quiet, remove_file_quiet, validate_component};
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

/// The `(normal, temporary)` counter pair of one object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefCounts {
    pub normal: u32,
    pub temporary: u32,
}

impl RefCounts {
    pub fn new(normal: u32, temporary: u32) -> Self {
        Self { normal, temporary }
    }

    pub fn is_zero(&self) -> bool {
        self.normal == 0 && self.temporary == 0
    }

    fn parse(content: &str) -> Option<Self> {
        let mut fields = content.split_whitespace();
        let normal = fields.next()?.parse().ok()?;
        let temporary = fields.next()?.parse().ok()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self { normal, temporary })
    }
}

impl fmt::Display for RefCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.normal, self.temporary)
    }
}

/// File-backed reference counter.
#[derive(Debug, Clone)]
pub struct RefCounter {
    base_dir: PathBuf,
    write_retries: u32,
}

impl RefCounter {
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
            write_retries: 10,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            base_dir: config.refcount_dir.clone(),
            write_retries: config.refcount_write_retries,
        }
    }

    /// Take a reference. Returns the resulting normal count.
    ///
    /// A temporary reference leaves the normal count, and so the return
    /// value, unchanged.
    pub fn get(&self, object: &str, is_temporary: bool, namespace: &str) -> Result<u32> {
        self.adjust(object, namespace, |counts| {
            if is_temporary {
                counts.temporary = counts.temporary.saturating_add(1);
            } else {
                counts.normal = counts.normal.saturating_add(1);
            }
        })
    }

    /// Drop a reference, never going below zero. Returns the resulting
    /// normal count.
    pub fn put(&self, object: &str, is_temporary: bool, namespace: &str) -> Result<u32> {
        self.adjust(object, namespace, |counts| {
            if is_temporary {
                counts.temporary = counts.temporary.saturating_sub(1);
            } else {
                counts.normal = counts.normal.saturating_sub(1);
            }
        })
    }

    /// Current counts without modifying them; absent records read as zero.
    pub fn check(&self, object: &str, namespace: &str) -> Result<RefCounts> {
        self.read(object, namespace)
    }

    /// Overwrite both counts.
    pub fn set(&self, object: &str, counts: RefCounts, namespace: &str) -> Result<()> {
        validate_key(object, namespace)?;
        self.write(object, namespace, counts)
    }

    /// Forget every reference to `object`.
    pub fn reset(&self, object: &str, namespace: &str) -> Result<()> {
        self.set(object, RefCounts::default(), namespace)
    }

    pub fn path(&self, object: &str, namespace: &str) -> PathBuf {
        self.base_dir.join(namespace).join(object)
    }

    fn adjust<F>(&self, object: &str, namespace: &str, change: F) -> Result<u32>
    where
        F: FnOnce(&mut RefCounts),
    {
        let mut counts = self.read(object, namespace)?;
        let before = counts;
        change(&mut counts);

        if counts != before {
            self.write(object, namespace, counts)?;
        }
        Ok(counts.normal)
    }

    fn read(&self, object: &str, namespace: &str) -> Result<RefCounts> {
        validate_key(object, namespace)?;
        let path = self.path(object, namespace);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RefCounts::default()),
            Err(e) => {
                return Err(SmError::io(
                    format!("failed to read refcount '{}'", path.display()),
                    e,
                ));
            }
        };

        RefCounts::parse(&content).ok_or_else(|| {
            SmError::CorruptState(format!(
                "unparsable refcount '{}': {:?}",
                path.display(),
                content
            ))
        })
    }

    fn write(&self, object: &str, namespace: &str, counts: RefCounts) -> Result<()> {
        let ns_dir = self.base_dir.join(namespace);
        let path = ns_dir.join(object);

        if counts.is_zero() {
            remove_file_quiet(&path);
            remove_dir_quiet(&ns_dir);
            return Ok(());
        }

        let content = format!("{}\n", counts);
        let mut retries = self.write_retries;
        loop {
            mkdirs(&ns_dir)?;
            match atomic_overwrite(&path, content.as_bytes()) {
                Ok(()) => return Ok(()),
                // A concurrent release pruned the namespace directory.
                Err(e) if e.is_io_not_found() && retries > 0 => {
                    retries -= 1;
                    log::debug!("refcount: retrying write of {}", path.display());
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn validate_key(object: &str, namespace: &str) -> Result<()> {
    validate_component("refcount object", object)?;
    validate_component("refcount namespace", namespace)
}
