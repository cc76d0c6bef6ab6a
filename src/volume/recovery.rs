//! Replay of journals left behind by interrupted operations.
//!
//! Every step here inspects the current metadata before changing it, so a
//! crash during recovery is recovered by simply running it again.

use super::manager::{CloneRecord, VolumeManager};
use crate::error::{Result, SmError};
use crate::journal::{JRN_CLONE, JRN_COALESCE, JRN_INFLATE};
use crate::locks::LOCK_TYPE_GC_RUNNING;

/// What a recovery pass did, by journal type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub inflates_undone: Vec<String>,
    pub clones_undone: Vec<String>,
    pub coalesces_finished: Vec<String>,
}

impl RecoveryReport {
    pub fn is_empty(&self) -> bool {
        self.inflates_undone.is_empty()
            && self.clones_undone.is_empty()
            && self.coalesces_finished.is_empty()
    }
}

impl VolumeManager {
    /// Resolve every journal of this SR.
    ///
    /// Interrupted resizes and snapshots are undone; interrupted coalesces
    /// are finished. Runs with the GC excluded and the SR locked.
    pub fn recover(&self) -> Result<RecoveryReport> {
        let _gc = self
            .locks
            .acquire(LOCK_TYPE_GC_RUNNING, Some(&self.sr_uuid))?;
        let _sr = self.sr_lock()?;
        let mut report = RecoveryReport::default();

        for (vdi, value) in self.journal.get_all(JRN_INFLATE)? {
            let old_size: u64 = value.parse().map_err(|_| {
                SmError::CorruptState(format!("bad inflate journal value '{}' for {}", value, vdi))
            })?;
            log::info!("recovery: undoing resize of {} back to {} bytes", vdi, old_size);
            self.undo_inflate(&vdi, old_size)?;
            self.journal.remove(JRN_INFLATE, &vdi)?;
            report.inflates_undone.push(vdi);
        }

        for (vdi, value) in self.journal.get_all(JRN_CLONE)? {
            let record = CloneRecord::parse(&value)?;
            log::info!("recovery: undoing snapshot of {} (base {})", vdi, record.base);
            self.undo_clone(&vdi, &record)?;
            self.journal.remove(JRN_CLONE, &vdi)?;
            report.clones_undone.push(vdi);
        }

        for (node, parent) in self.journal.get_all(JRN_COALESCE)? {
            log::info!("recovery: finishing coalesce of {} into {}", node, parent);
            self.finish_coalesce(&node, &parent)?;
            self.journal.remove(JRN_COALESCE, &node)?;
            report.coalesces_finished.push(node);
        }

        if report.is_empty() {
            log::debug!("recovery: nothing to do in SR {}", self.sr_uuid);
        }
        Ok(report)
    }

    pub(super) fn undo_inflate(&self, vdi: &str, old_size: u64) -> Result<()> {
        match self.store.get(vdi)? {
            Some(mut info) if info.size != old_size => {
                info.size = old_size;
                self.store.update(&info)
            }
            Some(_) => Ok(()),
            None => {
                log::warn!("cannot shrink missing volume {}, dropping its journal", vdi);
                Ok(())
            }
        }
    }

    /// Put the original volume back under its own id.
    ///
    /// The base copy is the original; anything created on top of it is
    /// discarded. If the base was never created the clone never started.
    pub(super) fn undo_clone(&self, vdi: &str, record: &CloneRecord) -> Result<()> {
        let Some(mut base) = self.store.get(&record.base)? else {
            if self.store.exists(vdi)? {
                log::info!("base {} of {} never created, nothing to undo", record.base, vdi);
                return Ok(());
            }
            return Err(SmError::CorruptState(format!(
                "neither {} nor its base copy {} exist",
                vdi, record.base
            )));
        };

        if let Some(snap) = &record.snapshot
            && self.store.exists(snap)?
        {
            self.store.remove(snap)?;
            self.refcounter.reset(snap, &self.sr_uuid)?;
        }
        if self.store.exists(vdi)? {
            self.store.remove(vdi)?;
        }

        self.refcounter.reset(&record.base, &self.sr_uuid)?;
        if base.hidden {
            base.hidden = false;
            self.store.update(&base)?;
        }
        self.store.rename(&record.base, vdi)
    }

    /// Grow the parent, re-point the node's children, delete the node.
    pub(super) fn finish_coalesce(&self, node: &str, parent: &str) -> Result<()> {
        let mut parent_info = self.store.get(parent)?.ok_or_else(|| {
            SmError::CorruptState(format!("coalesce target {} of {} is missing", parent, node))
        })?;

        if let Some(node_info) = self.store.get(node)?
            && node_info.size > parent_info.size
        {
            parent_info.size = node_info.size;
            self.store.update(&parent_info)?;
        }

        for mut child in self.children(node)? {
            child.parent = Some(parent.to_string());
            self.store.update(&child)?;
        }

        if self.store.exists(node)? {
            self.store.remove(node)?;
        }
        self.refcounter.reset(node, &self.sr_uuid)
    }
}
