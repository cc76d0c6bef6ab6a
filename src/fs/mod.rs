//! Filesystem utilities for smcore.
//!
//! Safe filesystem operations, particularly atomic writes and race-tolerant
//! directory management shared by locks, journals, refcounts and queues.

pub mod atomic;
mod names;

pub use atomic::{
    atomic_create, atomic_overwrite, atomic_write, mkdirs, remove_dir_quiet, remove_file_quiet,
};
pub use names::validate_component;
