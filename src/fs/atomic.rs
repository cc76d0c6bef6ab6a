//! Atomic filesystem operations for smcore.
//!
//! Refcount files, journal entries, queue blobs and volume records must never
//! be observed half-written after a crash.
//!
//! # Implementation Strategy
//!
//! All atomic writes follow this pattern:
//! 1. Write content to a temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Atomically move it into place (`rename()` to replace, `link()` to
//!    create exclusively)
//! 4. Sync the parent directory so the new directory entry is durable
//!
//! # Important Notes
//!
//! - Source and destination are always in the same directory, so the final
//!   step is atomic on POSIX filesystems
//! - On crash, a temporary file may remain (named `.{filename}.{pid}.{seq}.tmp`);
//!   readers skip dot-files
//! - The pid and a per-process sequence number in the temporary name keep
//!   concurrent writers, in other processes or other threads, off each
//!   other's temporaries

use crate::error::{Result, SmError};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Sequence number for temporary file names within this process.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Atomically write bytes to a file, creating the parent directory if needed.
///
/// ```no_run
/// use smcore::fs::atomic_write;
/// use std::path::Path;
///
/// atomic_write(Path::new("/var/run/sm/refcount/sr/vdi"), b"1 0\n")?;
/// # Ok::<(), smcore::error::SmError>(())
/// ```
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        mkdirs(parent)?;
    }

    atomic_overwrite(path, content)
}

/// Atomically write bytes to a file whose parent directory must already exist.
///
/// Fails with an I/O `NotFound` error if the directory is missing (or vanishes
/// between the temporary write and the rename), which lets callers that race
/// with directory pruning retry.
pub fn atomic_overwrite<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let temp_path = generate_temp_path(path)?;

    write_and_sync(&temp_path, content)?;
    atomic_replace(&temp_path, path)
}

/// Atomically create a file that must not already exist.
///
/// The content is fully written and synced before the file becomes visible
/// under its final name, so a reader either sees nothing or the whole content.
/// Returns `SmError::AlreadyExists` if the target is present.
pub fn atomic_create<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        mkdirs(parent)?;
    }

    let temp_path = generate_temp_path(path)?;
    write_and_sync(&temp_path, content)?;

    let linked = fs::hard_link(&temp_path, path);
    let _ = fs::remove_file(&temp_path);

    match linked {
        Ok(()) => {
            sync_parent(path);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(SmError::AlreadyExists(
            format!("'{}'", path.display()),
        )),
        Err(e) => Err(SmError::io(
            format!("failed to create '{}'", path.display()),
            e,
        )),
    }
}

/// Concurrent-safe `mkdir -p`: another process creating the same directory
/// at the same time is not an error.
pub fn mkdirs<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(SmError::io(
            format!("failed to create directory '{}'", path.display()),
            e,
        )),
    }
}

/// Remove a file, tolerating "already gone". Returns whether it was removed.
pub fn remove_file_quiet<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            log::warn!("failed to unlink '{}': {}", path.display(), e);
            false
        }
    }
}

/// Remove an empty directory, tolerating "already gone" and "not empty".
pub fn remove_dir_quiet<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    match fs::remove_dir(path) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("not removing directory '{}': {}", path.display(), e);
            false
        }
    }
}

/// Generate a temporary file path in the same directory as the target.
fn generate_temp_path(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SmError::InvalidName(format!("invalid file path '{}'", target.display())))?;

    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let temp_name = format!(".{}.{}.{}.tmp", filename, std::process::id(), seq);
    Ok(parent.join(temp_name))
}

/// Write content to a file and sync to disk.
fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        SmError::io(
            format!("failed to create temporary file '{}'", path.display()),
            e,
        )
    })?;

    file.write_all(content).map_err(|e| {
        let _ = fs::remove_file(path);
        SmError::io("failed to write to temporary file", e)
    })?;

    file.sync_all().map_err(|e| {
        let _ = fs::remove_file(path);
        SmError::io("failed to sync temporary file to disk", e)
    })?;

    Ok(())
}

/// Atomically replace the target file with the source file.
fn atomic_replace(source: &Path, target: &Path) -> Result<()> {
    fs::rename(source, target).map_err(|e| {
        let _ = fs::remove_file(source);
        SmError::io(
            format!("failed to atomically replace '{}'", target.display()),
            e,
        )
    })?;

    sync_parent(target);
    Ok(())
}

fn sync_parent(target: &Path) {
    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_new_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("count");

        atomic_write(&file_path, b"1 0\n").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "1 0\n");
    }

    #[test]
    fn test_atomic_write_replace_existing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("count");
        fs::write(&file_path, "1 0\n").unwrap();

        atomic_write(&file_path, b"2 1\n").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "2 1\n");
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("ns").join("obj");

        atomic_write(&file_path, b"nested").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "nested");
    }

    #[test]
    fn test_atomic_overwrite_requires_parent() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("missing").join("obj");

        let err = atomic_overwrite(&file_path, b"1 0\n").unwrap_err();
        assert!(err.is_io_not_found());
    }

    #[test]
    fn test_atomic_write_temp_file_cleanup() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("obj");

        atomic_write(&file_path, b"content").unwrap();

        let entries: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["obj".to_string()]);
    }

    #[test]
    fn test_atomic_create_refuses_existing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("clone_1");

        atomic_create(&file_path, b"a").unwrap();
        let err = atomic_create(&file_path, b"b").unwrap_err();

        assert!(matches!(err, SmError::AlreadyExists(_)));
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "a");
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_generate_temp_path() {
        let target = Path::new("/some/path/file");
        let temp = generate_temp_path(target).unwrap();

        assert_eq!(temp.parent().unwrap(), Path::new("/some/path"));
        let name = temp.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(".file."));
        assert!(name.ends_with(".tmp"));
        assert_ne!(generate_temp_path(target).unwrap(), temp);
    }

    #[test]
    fn test_atomic_create_concurrent_same_target() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("clone_vdi-1");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = file_path.clone();
                std::thread::spawn(move || atomic_create(&path, format!("base-{}", i).as_bytes()))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, SmError::AlreadyExists(_)))
        );
        assert!(fs::read_to_string(&file_path).unwrap().starts_with("base-"));
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_quiet_removals_tolerate_missing() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!remove_file_quiet(temp_dir.path().join("nope")));
        assert!(!remove_dir_quiet(temp_dir.path().join("nope")));

        let dir = temp_dir.path().join("ns");
        mkdirs(&dir).unwrap();
        mkdirs(&dir).unwrap();
        fs::write(dir.join("f"), "x").unwrap();
        assert!(!remove_dir_quiet(&dir));
        assert!(remove_file_quiet(dir.join("f")));
        assert!(remove_dir_quiet(&dir));
    }

    #[test]
    fn test_atomic_write_concurrent_safe() {
        let temp_dir = TempDir::new().unwrap();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let path = temp_dir.path().join(format!("obj_{}", i));
                let content = format!("{} 0\n", i);
                std::thread::spawn(move || {
                    atomic_write(&path, content.as_bytes()).unwrap();
                    (path, content)
                })
            })
            .collect();

        for handle in handles {
            let (path, expected_content) = handle.join().unwrap();
            assert_eq!(fs::read_to_string(&path).unwrap(), expected_content);
        }
    }
}
