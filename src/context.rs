//! Resolved runtime context for smcore.
//!
//! `SmContext` owns the resolved [`Config`], the process-wide
//! [`LockManager`] and the fairlock registry, and builds every other
//! subsystem from them. Building all
//! subsystems through one context keeps a single lock registry per process,
//! which is what makes lock reentrancy work across subsystems.

use crate::config::Config;
use crate::error::Result;
use crate::fairlock::Fairlock;
use crate::journal::FileJournaler;
use crate::lock_queue::{LockQueue, ProcStat};
use crate::locks::LockManager;
use crate::refcount::RefCounter;
use crate::volume::{DirVolumeStore, VolumeManager};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Configuration plus the shared lock and fairlock registries.
#[derive(Debug, Clone)]
pub struct SmContext {
    config: Config,
    locks: Arc<LockManager>,
    fairlocks: Arc<Mutex<HashMap<String, Arc<Fairlock>>>>,
}

impl SmContext {
    pub fn new(config: Config) -> Self {
        let locks = Arc::new(LockManager::from_config(&config));
        Self {
            config,
            locks,
            fairlocks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolve the configuration (see [`Config::resolve`]) and build a context.
    pub fn resolve(explicit_config: Option<&Path>) -> Result<Self> {
        Ok(Self::new(Config::resolve(explicit_config)?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn locks(&self) -> &Arc<LockManager> {
        &self.locks
    }

    pub fn refcounter(&self) -> RefCounter {
        RefCounter::from_config(&self.config)
    }

    /// Flat-file journal of one SR, or the host-wide one for `None`.
    pub fn journaler(&self, sr_uuid: Option<&str>) -> FileJournaler {
        match sr_uuid {
            Some(sr) => FileJournaler::new(self.config.journal_dir.join(sr)),
            None => FileJournaler::new(&self.config.journal_dir),
        }
    }

    /// A lock queue using `/proc` for waiter liveness.
    pub fn lock_queue(&self, name: &str) -> Result<LockQueue> {
        Ok(LockQueue::new(name, &self.locks, &self.config.queue_dir, Arc::new(ProcStat))?
            .with_poll_interval(self.config.queue_poll_interval()))
    }

    /// The process-wide fairlock for `name`, created on first use.
    pub fn fairlock(&self, name: &str) -> Result<Arc<Fairlock>> {
        let mut fairlocks = self
            .fairlocks
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        if let Some(lock) = fairlocks.get(name) {
            return Ok(Arc::clone(lock));
        }

        let lock = Arc::new(Fairlock::new(name, &self.config)?);
        fairlocks.insert(name.to_string(), Arc::clone(&lock));
        Ok(lock)
    }

    /// Metadata directory of a directory-backed SR.
    pub fn sr_path(&self, sr_uuid: &str) -> PathBuf {
        self.config.sr_dir.join(sr_uuid)
    }

    /// Volume manager for a directory-backed SR with a flat-file journal.
    pub fn volume_manager(&self, sr_uuid: &str) -> Result<VolumeManager> {
        let store = Arc::new(DirVolumeStore::new(self.sr_path(sr_uuid)));
        let journal = Arc::new(self.journaler(Some(sr_uuid)));
        VolumeManager::new(self, sr_uuid, store, journal)
    }
}
