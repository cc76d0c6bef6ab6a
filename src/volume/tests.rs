//! Tests for volume orchestration, including simulated crashes.

use super::*;
use crate::config::Config;
use crate::context::SmContext;
use crate::journal::{FileJournaler, JRN_CLONE, JRN_COALESCE, JRN_INFLATE, Journaler};
use crate::refcount::RefCounts;
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tempfile::TempDir;

type TestResult<T> = crate::error::Result<T>;

const SR: &str = "sr-1";
const GIB: u64 = 1024 * 1024 * 1024;

/// Store that fails the mutations numbered `fail_from..fail_to` (0-based).
struct FaultyStore {
    inner: DirVolumeStore,
    mutations: AtomicI64,
    fail_from: i64,
    fail_to: i64,
}

impl FaultyStore {
    fn failing_once(inner: DirVolumeStore, at: i64) -> Self {
        Self {
            inner,
            mutations: AtomicI64::new(0),
            fail_from: at,
            fail_to: at + 1,
        }
    }

    fn failing_from(inner: DirVolumeStore, from: i64) -> Self {
        Self {
            inner,
            mutations: AtomicI64::new(0),
            fail_from: from,
            fail_to: i64::MAX,
        }
    }

    fn mutate(&self) -> TestResult<()> {
        let n = self.mutations.fetch_add(1, Ordering::SeqCst);
        if n >= self.fail_from && n < self.fail_to {
            return Err(SmError::io("injected failure", io::Error::other("disk gone")));
        }
        Ok(())
    }
}

impl VolumeStore for FaultyStore {
    fn get(&self, name: &str) -> TestResult<Option<VolumeInfo>> {
        self.inner.get(name)
    }

    fn create(&self, info: &VolumeInfo) -> TestResult<()> {
        self.mutate()?;
        self.inner.create(info)
    }

    fn update(&self, info: &VolumeInfo) -> TestResult<()> {
        self.mutate()?;
        self.inner.update(info)
    }

    fn remove(&self, name: &str) -> TestResult<()> {
        self.mutate()?;
        self.inner.remove(name)
    }

    fn rename(&self, from: &str, to: &str) -> TestResult<()> {
        self.mutate()?;
        self.inner.rename(from, to)
    }

    fn list(&self) -> TestResult<Vec<VolumeInfo>> {
        self.inner.list()
    }
}

/// Journal that cannot remove entries, as if the process died right after
/// the mutation landed.
struct StickyJournal {
    inner: FileJournaler,
    stuck: AtomicBool,
}

impl Journaler for StickyJournal {
    fn create(&self, kind: &str, id: &str, value: &str) -> TestResult<()> {
        self.inner.create(kind, id, value)
    }

    fn get(&self, kind: &str, id: &str) -> TestResult<Option<String>> {
        self.inner.get(kind, id)
    }

    fn remove(&self, kind: &str, id: &str) -> TestResult<()> {
        if self.stuck.load(Ordering::SeqCst) {
            return Err(SmError::io("injected failure", io::Error::other("crashed")));
        }
        self.inner.remove(kind, id)
    }

    fn get_all(&self, kind: &str) -> TestResult<BTreeMap<String, String>> {
        self.inner.get_all(kind)
    }

    fn has_journals(&self, id: &str) -> TestResult<bool> {
        self.inner.has_journals(id)
    }
}

struct Fixture {
    _temp_dir: TempDir,
    ctx: SmContext,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let ctx = SmContext::new(Config::rooted_at(temp_dir.path()));
        Self {
            _temp_dir: temp_dir,
            ctx,
        }
    }

    fn dir_store(&self) -> DirVolumeStore {
        DirVolumeStore::new(self.ctx.sr_path(SR))
    }

    fn journal(&self) -> FileJournaler {
        self.ctx.journaler(Some(SR))
    }

    fn manager(&self) -> VolumeManager {
        self.ctx.volume_manager(SR).unwrap()
    }

    fn manager_with_store(&self, store: FaultyStore) -> VolumeManager {
        VolumeManager::new(&self.ctx, SR, Arc::new(store), Arc::new(self.journal())).unwrap()
    }

    fn sticky_manager(&self) -> VolumeManager {
        let journal = Arc::new(StickyJournal {
            inner: self.journal(),
            stuck: AtomicBool::new(true),
        });
        VolumeManager::new(&self.ctx, SR, Arc::new(self.dir_store()), journal).unwrap()
    }

    fn volumes(&self) -> Vec<VolumeInfo> {
        self.dir_store().list().unwrap()
    }

    fn volume(&self, name: &str) -> Option<VolumeInfo> {
        self.dir_store().get(name).unwrap()
    }
}

fn names(volumes: &[VolumeInfo]) -> Vec<&str> {
    volumes.iter().map(|info| info.name.as_str()).collect()
}

/// `vdi-1 -> base2 -> base1`, with base2 twice the size of base1.
fn two_level_chain(manager: &VolumeManager) -> (String, String) {
    manager.create("vdi-1", GIB).unwrap();
    let base1 = manager.snapshot("vdi-1", SnapshotKind::Single).unwrap().base;
    manager.resize("vdi-1", 2 * GIB).unwrap();
    let base2 = manager.snapshot("vdi-1", SnapshotKind::Single).unwrap().base;
    (base1, base2)
}

// =============================================================================
// Basic operations
// =============================================================================

#[test]
fn test_create_and_chain() {
    let fixture = Fixture::new();
    let manager = fixture.manager();

    let info = manager.create("vdi-1", GIB).unwrap();

    assert_eq!(info.size, GIB);
    let chain = manager.chain("vdi-1").unwrap();
    assert_eq!(names(&chain), vec!["vdi-1"]);
    assert!(!chain[0].hidden);
}

#[test]
fn test_create_duplicate_fails() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();

    let err = manager.create("vdi-1", GIB).unwrap_err();
    assert!(matches!(err, SmError::AlreadyExists(_)));
}

#[test]
fn test_invalid_volume_ids_rejected() {
    let fixture = Fixture::new();
    let manager = fixture.manager();

    for id in ["", "a_b", "a.b", "a/b"] {
        let err = manager.create(id, GIB).unwrap_err();
        assert!(matches!(err, SmError::InvalidName(_)), "{id:?}");
    }
}

#[test]
fn test_chain_of_missing_volume_is_not_found() {
    let fixture = Fixture::new();
    let manager = fixture.manager();

    let err = manager.chain("nope").unwrap_err();
    assert!(matches!(err, SmError::NotFound(_)));
}

#[test]
fn test_chain_with_missing_parent_is_corrupt() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    fixture
        .dir_store()
        .create(&VolumeInfo::new("leaf", GIB).with_parent("gone"))
        .unwrap();

    let err = manager.chain("leaf").unwrap_err();
    assert!(matches!(err, SmError::CorruptState(_)));
}

#[test]
fn test_chain_cycle_is_corrupt() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    let store = fixture.dir_store();
    store.create(&VolumeInfo::new("a", GIB).with_parent("b")).unwrap();
    store.create(&VolumeInfo::new("b", GIB).with_parent("a")).unwrap();

    let err = manager.chain("a").unwrap_err();
    assert!(matches!(err, SmError::CorruptState(_)));
}

#[test]
fn test_destroy_leaf() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();

    manager.destroy("vdi-1").unwrap();

    assert!(fixture.volume("vdi-1").is_none());
}

#[test]
fn test_destroy_refuses_active_volume() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();
    manager.activate("vdi-1", false).unwrap();

    let err = manager.destroy("vdi-1").unwrap_err();
    assert!(matches!(err, SmError::InvalidOperation(_)));
}

#[test]
fn test_destroy_refuses_internal_node() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();
    let outcome = manager.snapshot("vdi-1", SnapshotKind::Single).unwrap();

    let err = manager.destroy(&outcome.base).unwrap_err();
    assert!(matches!(err, SmError::InvalidOperation(_)));
}

// =============================================================================
// Snapshot
// =============================================================================

#[test]
fn test_single_snapshot_builds_base() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();

    let outcome = manager.snapshot("vdi-1", SnapshotKind::Single).unwrap();

    assert!(outcome.snapshot.is_none());
    let chain = manager.chain("vdi-1").unwrap();
    assert_eq!(names(&chain), vec!["vdi-1", outcome.base.as_str()]);
    assert!(!chain[0].hidden);
    assert!(chain[1].hidden);
    assert_eq!(chain[0].size, GIB);
    assert!(!manager.has_pending_work("vdi-1").unwrap());
}

#[test]
fn test_double_snapshot_adds_snapshot_leaf() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();

    let outcome = manager.snapshot("vdi-1", SnapshotKind::Double).unwrap();

    let snap = outcome.snapshot.unwrap();
    let snap_chain = manager.chain(&snap).unwrap();
    assert_eq!(names(&snap_chain), vec![snap.as_str(), outcome.base.as_str()]);
    assert_eq!(fixture.volumes().len(), 3);
}

#[test]
fn test_snapshot_of_active_vdi_moves_refs_to_base() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();
    manager.activate("vdi-1", false).unwrap();

    let outcome = manager.snapshot("vdi-1", SnapshotKind::Single).unwrap();

    let refcounter = fixture.ctx.refcounter();
    assert_eq!(
        refcounter.check(&outcome.base, SR).unwrap(),
        RefCounts::new(1, 0)
    );
    assert!(fixture.volume("vdi-1").unwrap().active);

    assert_eq!(manager.deactivate("vdi-1", false).unwrap(), 0);
    assert!(!fixture.volume(&outcome.base).unwrap().active);
    assert!(!fixture.volume("vdi-1").unwrap().active);
}

#[test]
fn test_snapshot_rejects_internal_node_and_missing() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();
    let outcome = manager.snapshot("vdi-1", SnapshotKind::Single).unwrap();

    let err = manager
        .snapshot(&outcome.base, SnapshotKind::Single)
        .unwrap_err();
    assert!(matches!(err, SmError::InvalidOperation(_)));

    let err = manager.snapshot("nope", SnapshotKind::Single).unwrap_err();
    assert!(matches!(err, SmError::NotFound(_)));
}

#[test]
fn test_snapshot_refused_while_journal_pending() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();
    fixture.journal().create(JRN_INFLATE, "vdi-1", "1").unwrap();

    let err = manager.snapshot("vdi-1", SnapshotKind::Single).unwrap_err();
    assert!(matches!(err, SmError::InvalidOperation(_)));
}

#[test]
fn test_failed_snapshot_rolls_back_inline() {
    let fixture = Fixture::new();
    fixture.manager().create("vdi-1", GIB).unwrap();
    // Mutation 2 is the new leaf; the rollback's own mutations succeed.
    let manager = fixture.manager_with_store(FaultyStore::failing_once(fixture.dir_store(), 2));

    let err = manager.snapshot("vdi-1", SnapshotKind::Single).unwrap_err();

    assert!(matches!(err, SmError::Io { .. }));
    assert_eq!(names(&fixture.volumes()), vec!["vdi-1"]);
    assert!(!fixture.volume("vdi-1").unwrap().hidden);
    assert!(!manager.has_pending_work("vdi-1").unwrap());
}

// =============================================================================
// Resize
// =============================================================================

#[test]
fn test_resize_grows() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();

    assert_eq!(manager.resize("vdi-1", 2 * GIB).unwrap(), 2 * GIB);

    assert_eq!(fixture.volume("vdi-1").unwrap().size, 2 * GIB);
    assert!(!manager.has_pending_work("vdi-1").unwrap());
}

#[test]
fn test_resize_refuses_shrink_and_skips_same_size() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", 2 * GIB).unwrap();

    let err = manager.resize("vdi-1", GIB).unwrap_err();
    assert!(matches!(err, SmError::InvalidOperation(_)));

    assert_eq!(manager.resize("vdi-1", 2 * GIB).unwrap(), 2 * GIB);
    assert_eq!(fixture.volume("vdi-1").unwrap().size, 2 * GIB);
}

#[test]
fn test_failed_resize_leaves_no_journal() {
    let fixture = Fixture::new();
    fixture.manager().create("vdi-1", GIB).unwrap();
    let manager = fixture.manager_with_store(FaultyStore::failing_from(fixture.dir_store(), 0));

    let err = manager.resize("vdi-1", 2 * GIB).unwrap_err();

    assert!(matches!(err, SmError::Io { .. }));
    assert_eq!(fixture.volume("vdi-1").unwrap().size, GIB);
    assert!(!manager.has_pending_work("vdi-1").unwrap());
}

// =============================================================================
// Coalesce
// =============================================================================

#[test]
fn test_coalesce_merges_node_into_parent() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    let (base1, base2) = two_level_chain(&manager);

    manager.coalesce(&base2).unwrap();

    let chain = manager.chain("vdi-1").unwrap();
    assert_eq!(names(&chain), vec!["vdi-1", base1.as_str()]);
    assert_eq!(chain[1].size, 2 * GIB);
    assert!(fixture.volume(&base2).is_none());
    assert!(!manager.has_pending_work(&base2).unwrap());
}

#[test]
fn test_coalesce_preconditions() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    let (base1, base2) = two_level_chain(&manager);

    // Visible leaf.
    let err = manager.coalesce("vdi-1").unwrap_err();
    assert!(matches!(err, SmError::InvalidOperation(_)));

    // Root has no parent.
    let err = manager.coalesce(&base1).unwrap_err();
    assert!(matches!(err, SmError::InvalidOperation(_)));

    // In use through the leaf.
    manager.activate("vdi-1", true).unwrap();
    let err = manager.coalesce(&base2).unwrap_err();
    assert!(matches!(err, SmError::InvalidOperation(_)));
}

#[test]
fn test_coalesce_refuses_parent_with_siblings() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();
    manager.snapshot("vdi-1", SnapshotKind::Double).unwrap();
    let base2 = manager.snapshot("vdi-1", SnapshotKind::Single).unwrap().base;

    let err = manager.coalesce(&base2).unwrap_err();
    assert!(matches!(err, SmError::InvalidOperation(_)));
}

// =============================================================================
// Activation
// =============================================================================

#[test]
fn test_activate_counts_and_marks_chain() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();
    let base = manager.snapshot("vdi-1", SnapshotKind::Single).unwrap().base;

    assert_eq!(manager.activate("vdi-1", false).unwrap(), 1);
    assert_eq!(manager.activate("vdi-1", true).unwrap(), 1);
    assert_eq!(manager.activate("vdi-1", false).unwrap(), 2);

    assert!(fixture.volume("vdi-1").unwrap().active);
    assert!(fixture.volume(&base).unwrap().active);
    let refcounter = fixture.ctx.refcounter();
    assert_eq!(refcounter.check(&base, SR).unwrap(), RefCounts::new(2, 1));
}

#[test]
fn test_deactivate_waits_for_temporary_refs() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();
    manager.activate("vdi-1", false).unwrap();
    manager.activate("vdi-1", true).unwrap();

    assert_eq!(manager.deactivate("vdi-1", false).unwrap(), 0);
    assert!(fixture.volume("vdi-1").unwrap().active);

    assert_eq!(manager.deactivate("vdi-1", true).unwrap(), 0);
    assert!(!fixture.volume("vdi-1").unwrap().active);

    // Duplicate release is tolerated.
    assert_eq!(manager.deactivate("vdi-1", false).unwrap(), 0);
}

#[test]
fn test_siblings_share_base_activation() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();
    let outcome = manager.snapshot("vdi-1", SnapshotKind::Double).unwrap();
    let snap = outcome.snapshot.unwrap();

    manager.activate("vdi-1", false).unwrap();
    manager.activate(&snap, false).unwrap();
    manager.deactivate("vdi-1", false).unwrap();

    assert!(fixture.volume(&outcome.base).unwrap().active);
    assert!(!fixture.volume("vdi-1").unwrap().active);

    manager.deactivate(&snap, false).unwrap();
    assert!(!fixture.volume(&outcome.base).unwrap().active);
}

// =============================================================================
// Recovery
// =============================================================================

#[test]
fn test_recover_with_no_journals_is_empty() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();

    assert!(manager.recover().unwrap().is_empty());
}

#[test]
fn test_interrupted_snapshot_is_undone_once() {
    let fixture = Fixture::new();
    fixture.manager().create("vdi-1", GIB).unwrap();
    // The new leaf fails and so does every rollback step.
    let crashed = fixture.manager_with_store(FaultyStore::failing_from(fixture.dir_store(), 2));
    crashed.snapshot("vdi-1", SnapshotKind::Double).unwrap_err();
    let value = fixture.journal().get(JRN_CLONE, "vdi-1").unwrap().unwrap();
    assert!(fixture.volume("vdi-1").is_none());

    let manager = fixture.manager();
    let report = manager.recover().unwrap();

    assert_eq!(report.clones_undone, vec!["vdi-1".to_string()]);
    assert_eq!(names(&fixture.volumes()), vec!["vdi-1"]);
    let restored = fixture.volume("vdi-1").unwrap();
    assert!(!restored.hidden);
    assert_eq!(restored.parent, None);

    assert!(manager.recover().unwrap().is_empty());

    // Crash between the undo and the journal removal: replay is a no-op.
    fixture.journal().create(JRN_CLONE, "vdi-1", &value).unwrap();
    manager.recover().unwrap();
    assert_eq!(names(&fixture.volumes()), vec!["vdi-1"]);
    assert_eq!(fixture.volume("vdi-1").unwrap(), restored);
}

#[test]
fn test_snapshot_landed_but_journal_left_is_undone() {
    let fixture = Fixture::new();
    fixture.manager().create("vdi-1", GIB).unwrap();

    let err = fixture
        .sticky_manager()
        .snapshot("vdi-1", SnapshotKind::Single)
        .unwrap_err();
    assert!(matches!(err, SmError::Io { .. }));
    assert_eq!(fixture.volumes().len(), 2);

    let manager = fixture.manager();
    manager.recover().unwrap();

    assert_eq!(names(&fixture.volumes()), vec!["vdi-1"]);
    assert!(!manager.has_pending_work("vdi-1").unwrap());
    assert!(manager.recover().unwrap().is_empty());
}

#[test]
fn test_half_renamed_original_is_restored() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();
    // Crash between linking the base name and unlinking the old one.
    fixture
        .dir_store()
        .create(&VolumeInfo::new("base-1", GIB))
        .unwrap();
    fixture.journal().create(JRN_CLONE, "vdi-1", "base-1").unwrap();

    manager.recover().unwrap();

    assert_eq!(names(&fixture.volumes()), vec!["vdi-1"]);
    assert_eq!(fixture.volume("vdi-1").unwrap().size, GIB);
}

#[test]
fn test_clone_that_never_started_just_drops_journal() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();
    fixture.journal().create(JRN_CLONE, "vdi-1", "base-1").unwrap();

    let report = manager.recover().unwrap();

    assert_eq!(report.clones_undone, vec!["vdi-1".to_string()]);
    assert_eq!(names(&fixture.volumes()), vec!["vdi-1"]);
}

#[test]
fn test_clone_journal_with_nothing_on_disk_is_corrupt() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    fixture.journal().create(JRN_CLONE, "vdi-1", "base-1").unwrap();

    let err = manager.recover().unwrap_err();
    assert!(matches!(err, SmError::CorruptState(_)));
    assert!(manager.has_pending_work("vdi-1").unwrap());
}

#[test]
fn test_bad_journal_values_are_corrupt() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();

    fixture.journal().create(JRN_CLONE, "vdi-1", "a.b.c").unwrap();
    let err = manager.recover().unwrap_err();
    assert!(matches!(err, SmError::CorruptState(_)));
    fixture.journal().remove(JRN_CLONE, "vdi-1").unwrap();

    fixture.journal().create(JRN_INFLATE, "vdi-1", "huge").unwrap();
    let err = manager.recover().unwrap_err();
    assert!(matches!(err, SmError::CorruptState(_)));
}

#[test]
fn test_resize_landed_but_journal_left_is_undone_once() {
    let fixture = Fixture::new();
    fixture.manager().create("vdi-1", GIB).unwrap();
    fixture
        .sticky_manager()
        .resize("vdi-1", 3 * GIB)
        .unwrap_err();
    assert_eq!(fixture.volume("vdi-1").unwrap().size, 3 * GIB);

    let manager = fixture.manager();
    let report = manager.recover().unwrap();

    assert_eq!(report.inflates_undone, vec!["vdi-1".to_string()]);
    assert_eq!(fixture.volume("vdi-1").unwrap().size, GIB);

    fixture
        .journal()
        .create(JRN_INFLATE, "vdi-1", &GIB.to_string())
        .unwrap();
    manager.recover().unwrap();
    assert_eq!(fixture.volume("vdi-1").unwrap().size, GIB);
}

#[test]
fn test_interrupted_coalesce_is_finished_once() {
    let fixture = Fixture::new();
    let (base1, base2) = two_level_chain(&fixture.manager());
    // Parent grows, child is re-pointed, removing the node fails.
    let crashed = fixture.manager_with_store(FaultyStore::failing_from(fixture.dir_store(), 2));
    crashed.coalesce(&base2).unwrap_err();
    let parent = fixture.journal().get(JRN_COALESCE, &base2).unwrap().unwrap();
    assert_eq!(parent, base1);

    let manager = fixture.manager();
    let report = manager.recover().unwrap();

    assert_eq!(report.coalesces_finished, vec![base2.clone()]);
    let chain = manager.chain("vdi-1").unwrap();
    assert_eq!(names(&chain), vec!["vdi-1", base1.as_str()]);
    assert_eq!(chain[1].size, 2 * GIB);
    let before = fixture.volumes();

    fixture.journal().create(JRN_COALESCE, &base2, &parent).unwrap();
    manager.recover().unwrap();
    assert_eq!(fixture.volumes(), before);
}

// =============================================================================
// Garbage collection
// =============================================================================

#[test]
fn test_gc_removes_orphaned_base() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    manager.create("vdi-1", GIB).unwrap();
    let outcome = manager.snapshot("vdi-1", SnapshotKind::Double).unwrap();
    manager.destroy("vdi-1").unwrap();
    manager.destroy(&outcome.snapshot.unwrap()).unwrap();

    let report = manager.garbage_collect().unwrap();

    assert_eq!(report.removed, vec![outcome.base]);
    assert!(fixture.volumes().is_empty());
}

#[test]
fn test_gc_coalesces_single_child_nodes() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    let (base1, base2) = two_level_chain(&manager);

    let report = manager.garbage_collect().unwrap();

    assert_eq!(report.coalesced, vec![base2]);
    assert!(report.removed.is_empty());
    assert!(!report.skipped);
    assert_eq!(names(&manager.chain("vdi-1").unwrap()), vec!["vdi-1", base1.as_str()]);
}

#[test]
fn test_gc_leaves_active_chains_alone() {
    let fixture = Fixture::new();
    let manager = fixture.manager();
    two_level_chain(&manager);
    manager.activate("vdi-1", false).unwrap();

    let report = manager.garbage_collect().unwrap();

    assert!(report.removed.is_empty());
    assert!(report.coalesced.is_empty());
    assert_eq!(fixture.volumes().len(), 3);
}

#[test]
fn test_gc_leaves_queue_empty() {
    let fixture = Fixture::new();
    let manager = fixture.manager();

    manager.garbage_collect().unwrap();

    let queue = fixture.ctx.lock_queue("gc-sr-1").unwrap();
    assert!(queue.waiters().unwrap().is_empty());
}
