//! Journaled volume operations of one SR.

use super::store::{VolumeInfo, VolumeStore};
use super::validate_volume_id;
use crate::context::SmContext;
use crate::error::{Result, SmError};
use crate::journal::{JRN_CLONE, JRN_COALESCE, JRN_INFLATE, Journaler};
use crate::lock_queue::LockQueue;
use crate::locks::{LOCK_TYPE_SR, LockGuard, LockManager};
use crate::refcount::RefCounter;
use std::sync::Arc;
use uuid::Uuid;

/// What a snapshot leaves behind besides the VDI itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    /// Only a new base under the VDI (a clone point).
    Single,
    /// A base plus a second leaf holding the snapshot.
    Double,
}

/// Ids created by a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotOutcome {
    pub base: String,
    pub snapshot: Option<String>,
}

/// Value of a `clone` journal: `base` or `base.snap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct CloneRecord {
    pub(super) base: String,
    pub(super) snapshot: Option<String>,
}

impl CloneRecord {
    pub(super) fn encode(&self) -> String {
        match &self.snapshot {
            Some(snap) => format!("{}.{}", self.base, snap),
            None => self.base.clone(),
        }
    }

    pub(super) fn parse(value: &str) -> Result<Self> {
        let (base, snapshot) = match value.split_once('.') {
            Some((base, snap)) => (base, Some(snap)),
            None => (value, None),
        };

        let valid = |id: &str| validate_volume_id(id).is_ok();
        if !valid(base) || snapshot.is_some_and(|snap| !valid(snap)) {
            return Err(SmError::CorruptState(format!(
                "bad clone journal value '{}'",
                value
            )));
        }

        Ok(Self {
            base: base.to_string(),
            snapshot: snapshot.map(str::to_string),
        })
    }
}

/// Orchestrates clone/snapshot, resize, coalesce and activation for one SR.
///
/// All metadata changes happen under the SR lock; per-VDI operations also
/// take the VDI's lock (SR lock first). Refcounts use the SR uuid as their
/// namespace.
pub struct VolumeManager {
    pub(super) sr_uuid: String,
    pub(super) store: Arc<dyn VolumeStore>,
    pub(super) journal: Arc<dyn Journaler>,
    pub(super) locks: Arc<LockManager>,
    pub(super) refcounter: RefCounter,
    pub(super) gc_queue: LockQueue,
}

impl VolumeManager {
    pub fn new(
        ctx: &SmContext,
        sr_uuid: &str,
        store: Arc<dyn VolumeStore>,
        journal: Arc<dyn Journaler>,
    ) -> Result<Self> {
        validate_volume_id(sr_uuid)?;
        Ok(Self {
            sr_uuid: sr_uuid.to_string(),
            store,
            journal,
            locks: Arc::clone(ctx.locks()),
            refcounter: ctx.refcounter(),
            gc_queue: ctx.lock_queue(&format!("gc-{}", sr_uuid))?,
        })
    }

    pub fn sr_uuid(&self) -> &str {
        &self.sr_uuid
    }

    pub(super) fn sr_lock(&self) -> Result<LockGuard> {
        self.locks.acquire(LOCK_TYPE_SR, Some(&self.sr_uuid))
    }

    /// VDI locks live in their own namespace so ids never clash with the
    /// SR-wide lock names.
    fn vdi_lock(&self, vdi: &str) -> Result<LockGuard> {
        self.locks.acquire(vdi, Some(&format!("vdi-{}", self.sr_uuid)))
    }

    pub(super) fn require(&self, name: &str) -> Result<VolumeInfo> {
        self.store
            .get(name)?
            .ok_or_else(|| SmError::NotFound(format!("volume '{}' in SR {}", name, self.sr_uuid)))
    }

    pub(super) fn children(&self, name: &str) -> Result<Vec<VolumeInfo>> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter(|info| info.parent.as_deref() == Some(name))
            .collect())
    }

    /// Run `undo` and drop the journal; on failure leave it for recovery.
    fn roll_back<F>(&self, kind: &str, id: &str, undo: F)
    where
        F: FnOnce() -> Result<()>,
    {
        match undo().and_then(|()| self.journal.remove(kind, id)) {
            Ok(()) => log::info!("rolled back {} of {}", kind, id),
            Err(e) => log::warn!(
                "failed to roll back {} of {}: {}; journal left for recovery",
                kind,
                id,
                e
            ),
        }
    }

    /// Create a new, visible, inactive volume.
    pub fn create(&self, vdi: &str, size: u64) -> Result<VolumeInfo> {
        validate_volume_id(vdi)?;
        let _sr = self.sr_lock()?;

        let info = VolumeInfo::new(vdi, size);
        self.store.create(&info)?;
        log::info!("created volume {} ({} bytes) in SR {}", vdi, size, self.sr_uuid);
        Ok(info)
    }

    /// Delete a visible leaf that nobody uses.
    pub fn destroy(&self, vdi: &str) -> Result<()> {
        validate_volume_id(vdi)?;
        let _sr = self.sr_lock()?;
        let _vdi = self.vdi_lock(vdi)?;

        let info = self.require(vdi)?;
        if info.hidden {
            return Err(SmError::InvalidOperation(format!(
                "volume {} is an internal chain node",
                vdi
            )));
        }
        if info.active {
            return Err(SmError::InvalidOperation(format!("volume {} is active", vdi)));
        }
        if !self.children(vdi)?.is_empty() {
            return Err(SmError::InvalidOperation(format!("volume {} has children", vdi)));
        }
        if self.journal.has_journals(vdi)? {
            return Err(SmError::InvalidOperation(format!(
                "volume {} has pending journals",
                vdi
            )));
        }

        self.store.remove(vdi)?;
        self.refcounter.reset(vdi, &self.sr_uuid)?;
        log::info!("destroyed volume {} in SR {}", vdi, self.sr_uuid);
        Ok(())
    }

    /// The chain from `vdi` up to its root, leaf first.
    pub fn chain(&self, vdi: &str) -> Result<Vec<VolumeInfo>> {
        let mut chain: Vec<VolumeInfo> = Vec::new();
        let mut next = Some(vdi.to_string());

        while let Some(name) = next {
            if chain.iter().any(|info| info.name == name) {
                return Err(SmError::CorruptState(format!(
                    "parent cycle through {} in chain of {}",
                    name, vdi
                )));
            }
            let info = match self.store.get(&name)? {
                Some(info) => info,
                None if chain.is_empty() => {
                    return Err(SmError::NotFound(format!(
                        "volume '{}' in SR {}",
                        name, self.sr_uuid
                    )));
                }
                None => {
                    return Err(SmError::CorruptState(format!(
                        "chain of {} references missing parent {}",
                        vdi, name
                    )));
                }
            };
            next = info.parent.clone();
            chain.push(info);
        }

        Ok(chain)
    }

    /// True if `vdi` has an unfinished journaled operation.
    pub fn has_pending_work(&self, vdi: &str) -> Result<bool> {
        self.journal.has_journals(vdi)
    }

    /// Snapshot `vdi`: its current content becomes a hidden base, and the
    /// VDI id continues as a fresh leaf on top of it.
    pub fn snapshot(&self, vdi: &str, kind: SnapshotKind) -> Result<SnapshotOutcome> {
        validate_volume_id(vdi)?;
        let _sr = self.sr_lock()?;
        let _vdi = self.vdi_lock(vdi)?;

        let info = self.require(vdi)?;
        if info.hidden {
            return Err(SmError::InvalidOperation(format!(
                "cannot snapshot internal chain node {}",
                vdi
            )));
        }
        if self.journal.has_journals(vdi)? {
            return Err(SmError::InvalidOperation(format!(
                "volume {} has pending journals",
                vdi
            )));
        }

        let record = CloneRecord {
            base: Uuid::new_v4().to_string(),
            snapshot: match kind {
                SnapshotKind::Single => None,
                SnapshotKind::Double => Some(Uuid::new_v4().to_string()),
            },
        };
        self.journal.create(JRN_CLONE, vdi, &record.encode())?;

        if let Err(e) = self.apply_clone(&info, &record) {
            log::error!("snapshot of {} failed: {}", vdi, e);
            self.roll_back(JRN_CLONE, vdi, || self.undo_clone(vdi, &record));
            return Err(e);
        }

        self.journal.remove(JRN_CLONE, vdi)?;
        log::info!(
            "snapshotted {} onto base {} in SR {}",
            vdi,
            record.base,
            self.sr_uuid
        );
        Ok(SnapshotOutcome {
            base: record.base,
            snapshot: record.snapshot,
        })
    }

    fn apply_clone(&self, info: &VolumeInfo, record: &CloneRecord) -> Result<()> {
        let vdi = info.name.as_str();

        self.store.rename(vdi, &record.base)?;

        let mut base = info.clone();
        base.name = record.base.clone();
        base.hidden = true;
        self.store.update(&base)?;

        // The base backs every consumer of the VDI from now on.
        let counts = self.refcounter.check(vdi, &self.sr_uuid)?;
        if !counts.is_zero() {
            self.refcounter.set(&record.base, counts, &self.sr_uuid)?;
        }

        let mut leaf = VolumeInfo::new(vdi, info.size).with_parent(&record.base);
        leaf.active = info.active;
        self.store.create(&leaf)?;

        if let Some(snap) = &record.snapshot {
            self.store
                .create(&VolumeInfo::new(snap, info.size).with_parent(&record.base))?;
        }
        Ok(())
    }

    /// Grow `vdi` to `new_size` bytes. Returns the resulting size.
    pub fn resize(&self, vdi: &str, new_size: u64) -> Result<u64> {
        validate_volume_id(vdi)?;
        let _sr = self.sr_lock()?;
        let _vdi = self.vdi_lock(vdi)?;

        let mut info = self.require(vdi)?;
        if info.hidden {
            return Err(SmError::InvalidOperation(format!(
                "cannot resize internal chain node {}",
                vdi
            )));
        }
        if new_size < info.size {
            return Err(SmError::InvalidOperation(format!(
                "shrinking {} from {} to {} bytes is not supported",
                vdi, info.size, new_size
            )));
        }
        if new_size == info.size {
            return Ok(new_size);
        }

        let old_size = info.size;
        self.journal.create(JRN_INFLATE, vdi, &old_size.to_string())?;

        info.size = new_size;
        if let Err(e) = self.store.update(&info) {
            log::error!("resize of {} failed: {}", vdi, e);
            self.roll_back(JRN_INFLATE, vdi, || self.undo_inflate(vdi, old_size));
            return Err(e);
        }

        self.journal.remove(JRN_INFLATE, vdi)?;
        log::info!("resized {} from {} to {} bytes", vdi, old_size, new_size);
        Ok(new_size)
    }

    /// Merge hidden node `node` into its parent and drop it from the chain.
    ///
    /// Once journaled, a coalesce is only ever finished, never undone.
    pub fn coalesce(&self, node: &str) -> Result<()> {
        validate_volume_id(node)?;
        let _sr = self.sr_lock()?;

        let info = self.require(node)?;
        let Some(parent) = info.parent.clone() else {
            return Err(SmError::InvalidOperation(format!("volume {} has no parent", node)));
        };
        if !info.hidden {
            return Err(SmError::InvalidOperation(format!(
                "only internal chain nodes are coalesced, {} is visible",
                node
            )));
        }
        if info.active || !self.refcounter.check(node, &self.sr_uuid)?.is_zero() {
            return Err(SmError::InvalidOperation(format!("volume {} is in use", node)));
        }
        let parent_info = self.require(&parent)?;
        if !parent_info.hidden {
            return Err(SmError::InvalidOperation(format!(
                "parent {} of {} is not an internal chain node",
                parent, node
            )));
        }
        let siblings = self.children(&parent)?;
        if siblings.len() != 1 {
            return Err(SmError::InvalidOperation(format!(
                "parent {} of {} has {} children",
                parent,
                node,
                siblings.len()
            )));
        }
        if self.journal.has_journals(node)? {
            return Err(SmError::InvalidOperation(format!(
                "volume {} has pending journals",
                node
            )));
        }

        self.journal.create(JRN_COALESCE, node, &parent)?;
        self.finish_coalesce(node, &parent)?;
        self.journal.remove(JRN_COALESCE, node)?;

        log::info!("coalesced {} into {} in SR {}", node, parent, self.sr_uuid);
        Ok(())
    }

    /// Take a reference on every volume of `vdi`'s chain, activating the
    /// ones that were inactive. Returns the VDI's normal count.
    pub fn activate(&self, vdi: &str, temporary: bool) -> Result<u32> {
        validate_volume_id(vdi)?;
        let _sr = self.sr_lock()?;
        let _vdi = self.vdi_lock(vdi)?;

        let mut leaf_count = 0;
        for (i, mut volume) in self.chain(vdi)?.into_iter().enumerate() {
            let normal = self.refcounter.get(&volume.name, temporary, &self.sr_uuid)?;
            if i == 0 {
                leaf_count = normal;
            }
            if !volume.active {
                volume.active = true;
                self.store.update(&volume)?;
                log::debug!("activated {}", volume.name);
            }
        }
        Ok(leaf_count)
    }

    /// Drop a reference on every volume of `vdi`'s chain, deactivating the
    /// ones left with no references at all. Returns the VDI's normal count.
    pub fn deactivate(&self, vdi: &str, temporary: bool) -> Result<u32> {
        validate_volume_id(vdi)?;
        let _sr = self.sr_lock()?;
        let _vdi = self.vdi_lock(vdi)?;

        let mut leaf_count = 0;
        for (i, mut volume) in self.chain(vdi)?.into_iter().enumerate() {
            let normal = self.refcounter.put(&volume.name, temporary, &self.sr_uuid)?;
            if i == 0 {
                leaf_count = normal;
            }
            if volume.active && self.refcounter.check(&volume.name, &self.sr_uuid)?.is_zero() {
                volume.active = false;
                self.store.update(&volume)?;
                log::debug!("deactivated {}", volume.name);
            }
        }
        Ok(leaf_count)
    }
}
