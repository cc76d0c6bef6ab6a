//! Garbage collection of unused chain nodes.

use super::manager::VolumeManager;
use super::store::VolumeInfo;
use crate::error::Result;
use crate::locks::LOCK_TYPE_GC_RUNNING;

/// Volumes handled by one collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Hidden nodes with no children that were deleted.
    pub removed: Vec<String>,
    /// Hidden nodes merged into their parent.
    pub coalesced: Vec<String>,
    /// True if another collector was already running.
    pub skipped: bool,
}

impl VolumeManager {
    /// Collect garbage until nothing is left to do.
    ///
    /// Hosts wait their turn in the SR's GC queue; a run that finds the
    /// `running` lock taken anyway backs off and reports `skipped`.
    pub fn garbage_collect(&self) -> Result<GcReport> {
        let turn = self.gc_queue.enter()?;
        let running = self
            .locks
            .lock(LOCK_TYPE_GC_RUNNING, Some(&self.sr_uuid))?;

        let Some(running_guard) = running.try_guard()? else {
            log::info!("GC already running in SR {}", self.sr_uuid);
            turn.exit()?;
            return Ok(GcReport {
                skipped: true,
                ..GcReport::default()
            });
        };

        let mut report = GcReport::default();
        while self.collect_one(&mut report)? {}

        running_guard.release()?;
        turn.exit()?;
        log::info!(
            "GC of SR {}: removed {}, coalesced {}",
            self.sr_uuid,
            report.removed.len(),
            report.coalesced.len()
        );
        Ok(report)
    }

    /// Handle a single garbage volume. Returns false once there is none.
    fn collect_one(&self, report: &mut GcReport) -> Result<bool> {
        let _sr = self.sr_lock()?;

        let volumes: Vec<VolumeInfo> = self
            .store
            .list()?
            .into_iter()
            .filter(|info| info.tag.is_none())
            .collect();
        let child_count = |name: &str| {
            volumes
                .iter()
                .filter(|info| info.parent.as_deref() == Some(name))
                .count()
        };

        let mut candidates = Vec::new();
        for info in volumes.iter().filter(|info| info.hidden && !info.active) {
            if !self.refcounter.check(&info.name, &self.sr_uuid)?.is_zero()
                || self.journal.has_journals(&info.name)?
            {
                continue;
            }
            candidates.push(info);
        }

        if let Some(orphan) = candidates.iter().find(|info| child_count(&info.name) == 0) {
            self.store.remove(&orphan.name)?;
            self.refcounter.reset(&orphan.name, &self.sr_uuid)?;
            log::info!("GC: removed unused base {}", orphan.name);
            report.removed.push(orphan.name.clone());
            return Ok(true);
        }

        let mergeable = candidates.iter().find(|info| {
            info.parent.as_deref().is_some_and(|parent| {
                child_count(parent) == 1
                    && volumes
                        .iter()
                        .any(|other| other.name == parent && other.hidden)
            })
        });
        if let Some(node) = mergeable {
            self.coalesce(&node.name)?;
            report.coalesced.push(node.name.clone());
            return Ok(true);
        }

        Ok(false)
    }
}
