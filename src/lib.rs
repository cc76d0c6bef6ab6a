//! smcore: the storage-manager core of a virtual-disk backend.
//!
//! Crash-safe coordination primitives for volumes on shared storage:
//!
//! - [`locks`]: fcntl advisory locks, reentrant and singleton per key
//! - [`journal`]: intent journals for multi-step operations
//! - [`refcount`]: persistent activation refcounts
//! - [`lock_queue`]: FIFO admission on top of advisory locks
//! - [`fairlock`]: client for the lock broker daemon
//! - [`volume`]: journaled snapshot, resize, coalesce, recovery and GC
//!
//! Everything is built from a [`context::SmContext`], which owns the
//! configuration and the process-wide lock registry.

pub mod config;
pub mod context;
pub mod error;
pub mod exit_codes;
pub mod fairlock;
pub mod fs;
pub mod journal;
pub mod lock_queue;
pub mod locks;
pub mod refcount;
pub mod volume;
