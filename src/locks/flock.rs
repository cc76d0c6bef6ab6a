//! Fcntl-based advisory record locks with a proper try-lock and owner test.
//!
//! `fcntl(2)` lets a process re-lock a region it already holds as often as it
//! likes. That is surprising, so this primitive keeps one bit of its own
//! bookkeeping: locking while `held()` is a `ReentrancyViolation`, and so is
//! unlocking while not held. Reentrant counting lives one level up in
//! [`Lock`](super::Lock).

use crate::error::{Result, SmError};
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, fcntl};
use nix::libc;
use std::fs::File;
use std::os::fd::AsRawFd;

/// Whether the record lock is shared (reader) or exclusive (writer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    /// Shared lock; compatible with other readers.
    Read,
    /// Exclusive lock.
    Write,
}

impl LockKind {
    fn l_type(self) -> libc::c_short {
        match self {
            LockKind::Read => libc::F_RDLCK as libc::c_short,
            LockKind::Write => libc::F_WRLCK as libc::c_short,
        }
    }
}

/// Build a whole-file `struct flock` of the given type.
fn whole_file(l_type: libc::c_short) -> libc::flock {
    // SAFETY: `flock` is a plain C struct for which all-zero is a valid value
    // (offset 0, length 0 meaning "to end of file", pid 0).
    let mut fl: libc::flock = unsafe { std::mem::zeroed() };
    fl.l_type = l_type;
    fl.l_whence = libc::SEEK_SET as libc::c_short;
    fl
}

/// An advisory whole-file lock on an open file.
#[derive(Debug)]
pub struct FcntlLock {
    file: File,
    kind: LockKind,
    held: bool,
}

impl FcntlLock {
    /// Wrap an open file in a new, unheld lock.
    pub fn new(file: File, kind: LockKind) -> Self {
        Self {
            file,
            kind,
            held: false,
        }
    }

    /// Exclusive (writer) lock on `file`.
    pub fn write(file: File) -> Self {
        Self::new(file, LockKind::Write)
    }

    /// Shared (reader) lock on `file`.
    pub fn read(file: File) -> Self {
        Self::new(file, LockKind::Read)
    }

    pub fn kind(&self) -> LockKind {
        self.kind
    }

    /// Blocking acquisition.
    pub fn lock(&mut self) -> Result<()> {
        if self.held {
            return Err(SmError::ReentrancyViolation(
                "attempt to acquire lock held".to_string(),
            ));
        }

        let fl = whole_file(self.kind.l_type());
        loop {
            match fcntl(self.file.as_raw_fd(), FcntlArg::F_SETLKW(&fl)) {
                Ok(_) => break,
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(SmError::io("fcntl(F_SETLKW) failed", errno.into())),
            }
        }

        self.held = true;
        Ok(())
    }

    /// Non-blocking acquisition. Returns `false` if another process holds a
    /// conflicting lock, or if this lock is already held.
    pub fn try_lock(&mut self) -> Result<bool> {
        if self.held {
            return Ok(false);
        }

        let fl = whole_file(self.kind.l_type());
        match fcntl(self.file.as_raw_fd(), FcntlArg::F_SETLK(&fl)) {
            Ok(_) => {
                self.held = true;
                Ok(true)
            }
            Err(Errno::EACCES) | Err(Errno::EAGAIN) => Ok(false),
            Err(errno) => Err(SmError::io("fcntl(F_SETLK) failed", errno.into())),
        }
    }

    /// True if this object holds the lock. Local state, not a kernel query.
    pub fn held(&self) -> bool {
        self.held
    }

    /// Release a previously acquired lock.
    pub fn unlock(&mut self) -> Result<()> {
        if !self.held {
            return Err(SmError::ReentrancyViolation(
                "attempt to unlock lock not held".to_string(),
            ));
        }

        let fl = whole_file(libc::F_UNLCK as libc::c_short);
        fcntl(self.file.as_raw_fd(), FcntlArg::F_SETLK(&fl))
            .map_err(|errno| SmError::io("fcntl(F_SETLK, F_UNLCK) failed", errno.into()))?;

        self.held = false;
        Ok(())
    }

    /// PID of the process holding a conflicting lock, or `None` if unheld.
    ///
    /// When this object holds the lock the answer is our own PID, without a
    /// kernel round-trip (the kernel never reports a process's own locks).
    pub fn test(&self) -> Result<Option<u32>> {
        if self.held {
            return Ok(Some(std::process::id()));
        }

        let mut fl = whole_file(self.kind.l_type());
        fcntl(self.file.as_raw_fd(), FcntlArg::F_GETLK(&mut fl))
            .map_err(|errno| SmError::io("fcntl(F_GETLK) failed", errno.into()))?;

        if fl.l_type == libc::F_UNLCK as libc::c_short {
            Ok(None)
        } else {
            Ok(Some(fl.l_pid as u32))
        }
    }
}
