//! Command implementations for smcore.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, one module per command group.

mod journal;
mod lock;
mod queue;
mod refcount;
mod sr;

use crate::cli::Command;
use smcore::context::SmContext;
use smcore::error::Result;

/// Dispatch a command to its implementation.
pub fn dispatch(ctx: &SmContext, command: Command) -> Result<()> {
    match command {
        Command::Lock(cmd) => lock::dispatch(ctx, cmd),
        Command::Journal(cmd) => journal::dispatch(ctx, cmd),
        Command::Refcount(cmd) => refcount::dispatch(ctx, cmd),
        Command::Queue(cmd) => queue::dispatch(ctx, cmd),
        Command::Sr(cmd) => sr::dispatch(ctx, cmd),
    }
}
