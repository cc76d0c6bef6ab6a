//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the storage-manager core.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Directories
    // =========================================================================
    /// Base directory for advisory lock files (`<lock_dir>/<namespace>/<name>`).
    #[serde(default = "default_lock_dir")]
    pub lock_dir: PathBuf,

    /// Base directory for refcount files (`<refcount_dir>/<namespace>/<object>`).
    #[serde(default = "default_refcount_dir")]
    pub refcount_dir: PathBuf,

    /// Directory holding flat-file journal entries.
    #[serde(default = "default_journal_dir")]
    pub journal_dir: PathBuf,

    /// Directory holding lock queue waiter lists (`mem-<name>`).
    #[serde(default = "default_queue_dir")]
    pub queue_dir: PathBuf,

    /// Root of directory-backed storage repositories (`<sr_dir>/<sr_uuid>`).
    #[serde(default = "default_sr_dir")]
    pub sr_dir: PathBuf,

    // =========================================================================
    // Lock broker
    // =========================================================================
    /// Directory containing the lock-broker sockets.
    #[serde(default = "default_fairlock_socket_dir")]
    pub fairlock_socket_dir: PathBuf,

    /// Service manager used to start and probe the broker.
    #[serde(default = "default_fairlock_service_manager")]
    pub fairlock_service_manager: String,

    /// How long to wait for the broker service to become active.
    #[serde(default = "default_fairlock_start_timeout_ms")]
    pub fairlock_start_timeout_ms: u64,

    // =========================================================================
    // Tuning
    // =========================================================================
    /// Back-off between lock queue polls.
    #[serde(default = "default_queue_poll_interval_ms")]
    pub queue_poll_interval_ms: u64,

    /// Retries when a lock file's namespace directory vanishes while opening.
    #[serde(default = "default_retries")]
    pub lock_open_retries: u32,

    /// Retries when a refcount namespace directory vanishes while writing.
    #[serde(default = "default_retries")]
    pub refcount_write_retries: u32,

    /// Emit the per-operation lock trace at debug level.
    #[serde(default = "default_true")]
    pub verbose_locks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_dir: default_lock_dir(),
            refcount_dir: default_refcount_dir(),
            journal_dir: default_journal_dir(),
            queue_dir: default_queue_dir(),
            sr_dir: default_sr_dir(),
            fairlock_socket_dir: default_fairlock_socket_dir(),
            fairlock_service_manager: default_fairlock_service_manager(),
            fairlock_start_timeout_ms: default_fairlock_start_timeout_ms(),
            queue_poll_interval_ms: default_queue_poll_interval_ms(),
            lock_open_retries: default_retries(),
            refcount_write_retries: default_retries(),
            verbose_locks: default_true(),
        }
    }
}

impl Config {
    /// Build a config whose every directory lives under `root`.
    ///
    /// Handy for tests and for running several isolated instances on one host.
    pub fn rooted_at<P: Into<PathBuf>>(root: P) -> Self {
        let root = root.into();
        Self {
            lock_dir: root.join("lock"),
            refcount_dir: root.join("refcount"),
            journal_dir: root.join("journal"),
            queue_dir: root.join("queue"),
            sr_dir: root.join("sr"),
            fairlock_socket_dir: root.join("fairlock"),
            ..Self::default()
        }
    }
}
