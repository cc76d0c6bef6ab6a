//! Exit code constants for the smcore admin binary.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid name, bad config)
//! - 2: Journal/state failure (exists, missing, corrupt, precondition)
//! - 3: Lock failure (held, reentrancy, broker unavailable)
//! - 4: I/O failure

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid names or configuration.
pub const USER_ERROR: i32 = 1;

/// Journal or persisted-state failure.
pub const STATE_FAILURE: i32 = 2;

/// Lock acquisition or usage failure.
pub const LOCK_FAILURE: i32 = 3;

/// Underlying I/O failure.
pub const IO_FAILURE: i32 = 4;
