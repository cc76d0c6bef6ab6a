//! CLI argument parsing for smcore.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// smcore: administration of storage-manager locks, journals and refcounts.
///
/// Inspects and repairs the host-local state the storage manager keeps:
/// - advisory lock files under the lock directory
/// - intent journals of in-flight volume operations
/// - activation refcounts and lock queues
#[derive(Parser, Debug)]
#[command(name = "smcore")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to $SMCORE_CONFIG, then /etc/smcore/config.yaml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Available commands for smcore.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect, hold or clean up advisory locks.
    #[command(subcommand)]
    Lock(LockCommand),

    /// Inspect or discard journal entries.
    #[command(subcommand)]
    Journal(JournalCommand),

    /// Inspect or reset refcounts.
    #[command(subcommand)]
    Refcount(RefcountCommand),

    /// Inspect lock queues.
    #[command(subcommand)]
    Queue(QueueCommand),

    /// Storage repository maintenance.
    #[command(subcommand)]
    Sr(SrCommand),
}

/// Lock subcommands.
#[derive(Subcommand, Debug)]
pub enum LockCommand {
    /// Print the pid holding a lock, or "unheld".
    Test(LockArgs),

    /// Acquire a lock and hold it, printing "acquired <pid>" once held.
    ///
    /// Holds until stdin closes, or for --seconds if given.
    Hold(LockHoldArgs),

    /// Remove a lock file.
    Cleanup(LockArgs),

    /// Remove every lock file of a namespace.
    CleanupAll(NamespaceArgs),

    /// List the locks of a namespace and their holders.
    List(NamespaceArgs),
}

/// A lock name and optional namespace.
#[derive(Parser, Debug)]
pub struct LockArgs {
    /// Lock name (e.g. "sr", "running").
    pub name: String,

    /// Lock namespace; the nil namespace if omitted.
    #[arg(short, long)]
    pub namespace: Option<String>,
}

/// Arguments for `lock hold`.
#[derive(Parser, Debug)]
pub struct LockHoldArgs {
    #[command(flatten)]
    pub lock: LockArgs,

    /// Release after this many seconds instead of waiting for stdin to close.
    #[arg(long)]
    pub seconds: Option<u64>,

    /// Fail instead of waiting if another process holds the lock.
    #[arg(long)]
    pub no_wait: bool,
}

/// An optional namespace.
#[derive(Parser, Debug)]
pub struct NamespaceArgs {
    /// Lock namespace; the nil namespace if omitted.
    #[arg(short, long)]
    pub namespace: Option<String>,
}

/// Journal subcommands.
#[derive(Subcommand, Debug)]
pub enum JournalCommand {
    /// List entries of one type.
    List(JournalListArgs),

    /// Print one entry's value.
    Get(JournalKeyArgs),

    /// Remove one entry.
    Remove(JournalKeyArgs),
}

/// Arguments for `journal list`.
#[derive(Parser, Debug)]
pub struct JournalListArgs {
    /// Journal type (e.g. "clone", "inflate", "coalesce").
    pub kind: String,

    /// SR whose journal to read; the host-wide journal if omitted.
    #[arg(long)]
    pub sr: Option<String>,
}

/// A journal `(type, id)` key.
#[derive(Parser, Debug)]
pub struct JournalKeyArgs {
    /// Journal type.
    pub kind: String,

    /// Object id.
    pub id: String,

    /// SR whose journal to use; the host-wide journal if omitted.
    #[arg(long)]
    pub sr: Option<String>,
}

/// Refcount subcommands.
#[derive(Subcommand, Debug)]
pub enum RefcountCommand {
    /// Print "<normal> <temporary>" for an object.
    Show(RefcountArgs),

    /// Drop every reference to an object.
    Reset(RefcountArgs),
}

/// An object and its namespace.
#[derive(Parser, Debug)]
pub struct RefcountArgs {
    /// Object id.
    pub object: String,

    /// Refcount namespace (usually the SR uuid).
    #[arg(short, long)]
    pub namespace: String,
}

/// Lock queue subcommands.
#[derive(Subcommand, Debug)]
pub enum QueueCommand {
    /// List waiters, front first.
    Show(QueueArgs),
}

/// Arguments for `queue show`.
#[derive(Parser, Debug)]
pub struct QueueArgs {
    /// Queue name.
    pub name: String,
}

/// SR subcommands.
#[derive(Subcommand, Debug)]
pub enum SrCommand {
    /// Undo or finish every interrupted operation.
    Recover(SrArgs),

    /// Remove and coalesce unused chain nodes.
    Gc(SrArgs),

    /// Print a VDI's chain, leaf first.
    Chain(SrChainArgs),
}

/// An SR uuid.
#[derive(Parser, Debug)]
pub struct SrArgs {
    pub sr: String,
}

/// Arguments for `sr chain`.
#[derive(Parser, Debug)]
pub struct SrChainArgs {
    pub sr: String,

    pub vdi: String,
}
