//! Error types for smcore.
//!
//! Uses thiserror for derive macros. Primitive-level errors are never swallowed
//! inside the primitives; they propagate to the orchestration layer, which
//! decides whether to roll forward, roll back or surface them.

use crate::exit_codes;
use std::io;
use thiserror::Error;

/// Main error type for smcore operations.
#[derive(Error, Debug)]
pub enum SmError {
    /// A journal entry already exists for the (type, id) pair.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The requested entry does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A persisted record is malformed (bad journal key, unparsable count).
    #[error("corrupt state: {0}")]
    CorruptState(String),

    /// The lock is held by another process.
    #[error("lock held by another process: {0}")]
    LockHeldByOther(String),

    /// Programming error: releasing a lock not held, or re-entering a
    /// non-reentrant lock.
    #[error("reentrancy violation: {0}")]
    ReentrancyViolation(String),

    /// A backing service did not become ready in time.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A lock, journal or refcount key violates the naming rules.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// An orchestration precondition does not hold.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Configuration could not be parsed or validated.
    #[error("config error: {0}")]
    Config(String),

    /// Underlying I/O failure.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl SmError {
    /// Wrap an I/O error with a short description of what was being done.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        SmError::Io {
            context: context.into(),
            source,
        }
    }

    /// True for I/O errors whose kind is `NotFound`.
    ///
    /// Used to retry transient races where a concurrent releaser pruned a
    /// namespace directory between our mkdir and our write.
    pub fn is_io_not_found(&self) -> bool {
        matches!(self, SmError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SmError::InvalidName(_) | SmError::Config(_) => exit_codes::USER_ERROR,
            SmError::AlreadyExists(_)
            | SmError::NotFound(_)
            | SmError::CorruptState(_)
            | SmError::InvalidOperation(_) => exit_codes::STATE_FAILURE,
            SmError::LockHeldByOther(_)
            | SmError::ReentrancyViolation(_)
            | SmError::ServiceUnavailable(_) => exit_codes::LOCK_FAILURE,
            SmError::Io { .. } => exit_codes::IO_FAILURE,
        }
    }
}

/// Result type alias for smcore operations.
pub type Result<T> = std::result::Result<T, SmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_errors_map_to_state_failure() {
        assert_eq!(
            SmError::AlreadyExists("clone:1".into()).exit_code(),
            exit_codes::STATE_FAILURE
        );
        assert_eq!(
            SmError::NotFound("clone:1".into()).exit_code(),
            exit_codes::STATE_FAILURE
        );
        assert_eq!(
            SmError::CorruptState("bad".into()).exit_code(),
            exit_codes::STATE_FAILURE
        );
    }

    #[test]
    fn lock_errors_map_to_lock_failure() {
        assert_eq!(
            SmError::ReentrancyViolation("x".into()).exit_code(),
            exit_codes::LOCK_FAILURE
        );
        assert_eq!(
            SmError::ServiceUnavailable("x".into()).exit_code(),
            exit_codes::LOCK_FAILURE
        );
    }

    #[test]
    fn io_not_found_is_detected() {
        let err = SmError::io(
            "failed to open",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_io_not_found());
        assert_eq!(err.exit_code(), exit_codes::IO_FAILURE);

        let err = SmError::io(
            "failed to open",
            io::Error::new(io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(!err.is_io_not_found());
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = SmError::AlreadyExists("journal 'clone:1': a".to_string());
        assert_eq!(err.to_string(), "already exists: journal 'clone:1': a");

        let err = SmError::io("failed to read", io::Error::other("boom"));
        assert_eq!(err.to_string(), "failed to read: boom");
    }
}
