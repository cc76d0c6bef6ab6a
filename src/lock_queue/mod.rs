//! FIFO admission to a critical section shared by many processes.
//!
//! A bare advisory lock gives no ordering among waiters, so a busy host can
//! starve the others indefinitely. A `LockQueue` layers two locks:
//!
//! - the *queue lock* (`ql-<name>` namespace), held briefly while reading or
//!   rewriting the persisted waiter list
//! - the *action lock* (`al-<name>` namespace), held for the whole critical
//!   section by whichever waiter reached the front
//!
//! The waiter list is a JSON array in `<queue_dir>/mem-<name>`. Entries
//! whose process has died are pruned by whoever finds them at the front.

mod liveness;


pub use liveness::{ProcStat, ProcessLiveness};

use crate::error::{Result, SmError};
use crate::fs::atomic_write;
use crate::locks::{Lock, LockGuard, LockManager};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Default back-off between polls of the queue front.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One queued process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waiter {
    pub pid: u32,
    pub start_time: u64,
    /// When the entry was queued; informational only.
    pub queued_at: DateTime<Utc>,
}

impl Waiter {
    pub fn new(pid: u32, start_time: u64) -> Self {
        Self {
            pid,
            start_time,
            queued_at: Utc::now(),
        }
    }

    fn is(&self, pid: u32, start_time: u64) -> bool {
        self.pid == pid && self.start_time == start_time
    }
}

/// A named FIFO queue in front of an action lock.
pub struct LockQueue {
    name: String,
    queue_lock: Lock,
    action_lock: Lock,
    mem_path: PathBuf,
    poll_interval: Duration,
    liveness: Arc<dyn ProcessLiveness>,
}

impl LockQueue {
    pub fn new(
        name: &str,
        locks: &LockManager,
        queue_dir: &Path,
        liveness: Arc<dyn ProcessLiveness>,
    ) -> Result<Self> {
        let queue_lock = locks.lock(name, Some(&format!("ql-{}", name)))?;
        let action_lock = locks.lock(name, Some(&format!("al-{}", name)))?;

        Ok(Self {
            name: name.to_string(),
            queue_lock,
            action_lock,
            mem_path: queue_dir.join(format!("mem-{}", name)),
            poll_interval: DEFAULT_POLL_INTERVAL,
            liveness,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mem_path(&self) -> &Path {
        &self.mem_path
    }

    /// Read the persisted waiter list. Callers hold the queue lock.
    pub fn load_queue(&self) -> Result<Vec<Waiter>> {
        let content = match fs::read_to_string(&self.mem_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SmError::io(
                    format!("failed to read lock queue '{}'", self.mem_path.display()),
                    e,
                ));
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            SmError::CorruptState(format!(
                "failed to parse lock queue '{}': {}",
                self.mem_path.display(),
                e
            ))
        })
    }

    /// Persist the waiter list. Callers hold the queue lock.
    pub fn save_queue(&self, queue: &[Waiter]) -> Result<()> {
        let content = serde_json::to_vec(queue).map_err(|e| {
            SmError::CorruptState(format!("failed to serialize lock queue '{}': {}", self.name, e))
        })?;
        atomic_write(&self.mem_path, &content)
    }

    /// Append a waiter at the back of the queue.
    pub fn push(&self, waiter: Waiter) -> Result<()> {
        let _queue = self.queue_lock.guard()?;
        let mut queue = self.load_queue()?;
        log::debug!("lock queue {}: queued pid {}", self.name, waiter.pid);
        queue.push(waiter);
        self.save_queue(&queue)
    }

    /// Append the calling process.
    pub fn push_into_process_queue(&self) -> Result<()> {
        let (pid, start_time) = self.liveness.current()?;
        self.push(Waiter::new(pid, start_time))
    }

    /// Snapshot of the current waiters, front first.
    pub fn waiters(&self) -> Result<Vec<Waiter>> {
        let _queue = self.queue_lock.guard()?;
        self.load_queue()
    }

    /// Queue up and block until this process is admitted.
    ///
    /// The returned guard holds the action lock; dropping it (or calling
    /// [`LockQueueGuard::exit`]) lets the next waiter in.
    pub fn enter(&self) -> Result<LockQueueGuard> {
        let (pid, start_time) = self.liveness.current()?;
        self.push(Waiter::new(pid, start_time))?;

        match self.wait_for_turn(pid, start_time) {
            Ok(action) => Ok(LockQueueGuard { action }),
            Err(e) => {
                if let Err(withdraw_err) = self.withdraw(pid, start_time) {
                    log::warn!(
                        "lock queue {}: failed to withdraw pid {}: {}",
                        self.name,
                        pid,
                        withdraw_err
                    );
                }
                Err(e)
            }
        }
    }

    fn wait_for_turn(&self, pid: u32, start_time: u64) -> Result<LockGuard> {
        loop {
            let queue_guard = self.queue_lock.guard()?;
            let mut queue = self.load_queue()?;

            if queue.is_empty() {
                log::warn!(
                    "lock queue {}: own entry vanished, requeueing pid {}",
                    self.name,
                    pid
                );
                queue.push(Waiter::new(pid, start_time));
                self.save_queue(&queue)?;
                continue;
            }

            let front = queue.remove(0);

            if front.is(pid, start_time) {
                let action = self.action_lock.guard()?;
                self.save_queue(&queue)?;
                queue_guard.release()?;
                log::debug!("lock queue {}: pid {} admitted", self.name, pid);
                return Ok(action);
            }

            if !self.liveness.is_alive(front.pid, front.start_time)? {
                log::debug!(
                    "lock queue {}: removing dead waiter pid {} (start {})",
                    self.name,
                    front.pid,
                    front.start_time
                );
                self.save_queue(&queue)?;
                continue;
            }

            queue_guard.release()?;
            thread::sleep(self.poll_interval);
        }
    }

    fn withdraw(&self, pid: u32, start_time: u64) -> Result<()> {
        let _queue = self.queue_lock.guard()?;
        let mut queue = self.load_queue()?;
        queue.retain(|waiter| !waiter.is(pid, start_time));
        self.save_queue(&queue)
    }
}

/// Admission to a [`LockQueue`]'s critical section.
#[must_use = "the critical section ends when the guard is dropped"]
pub struct LockQueueGuard {
    action: LockGuard,
}

impl LockQueueGuard {
    /// Leave the critical section, reporting a failed release.
    pub fn exit(self) -> Result<()> {
        self.action.release()
    }
}
