//! Default value functions used by the Config struct.

use std::path::PathBuf;

pub(crate) fn default_lock_dir() -> PathBuf {
    PathBuf::from("/var/lock/sm")
}
pub(crate) fn default_refcount_dir() -> PathBuf {
    PathBuf::from("/var/run/sm/refcount")
}
pub(crate) fn default_journal_dir() -> PathBuf {
    PathBuf::from("/var/run/sm/journal")
}
pub(crate) fn default_queue_dir() -> PathBuf {
    PathBuf::from("/tmp")
}
pub(crate) fn default_sr_dir() -> PathBuf {
    PathBuf::from("/var/run/sr-mount")
}
pub(crate) fn default_fairlock_socket_dir() -> PathBuf {
    PathBuf::from("/run/fairlock")
}
pub(crate) fn default_fairlock_service_manager() -> String {
    "/usr/bin/systemctl".to_string()
}
pub(crate) fn default_fairlock_start_timeout_ms() -> u64 {
    2000
}
pub(crate) fn default_queue_poll_interval_ms() -> u64 {
    100
}
pub(crate) fn default_retries() -> u32 {
    10
}
pub(crate) fn default_true() -> bool {
    true
}
